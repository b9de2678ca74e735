//! Encoder and decoder for ST's DfuSe firmware container.
//!
//! A DfuSe file holds one or more targets, one per USB alternate setting,
//! each holding one or more images placed at absolute addresses. The file
//! ends with the standard DFU suffix and its CRC.
//!
//! ```
//! use dfuse_core::{Container, DEFAULT_ADDRESS};
//!
//! let container = Container::from_binary(DEFAULT_ADDRESS, vec![0xde, 0xad, 0xbe, 0xef]);
//! let bytes = container.encode().unwrap();
//! assert_eq!(Container::decode(&bytes).unwrap(), container);
//! ```

use thiserror::Error;

pub use container::{
    Container, DEFAULT_ADDRESS, DEFAULT_TARGET_NAME, DEFAULT_VENDOR_ID, Image, Target,
};
pub use decode::{ParsedContainer, StoredTarget, decode, parse};
pub use encode::encode;

pub mod checksum;
pub mod container;
pub mod decode;
pub mod encode;
pub mod layout;
pub mod size;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DfuSeError {
    #[error("Malformed {field} at offset {offset:#x}: expected {expected}, found {found}")]
    MalformedHeader {
        field: &'static str,
        offset: usize,
        expected: String,
        found: String,
    },
    #[error(
        "Input ends inside {field} at offset {offset:#x}: {needed} bytes needed, {available} available"
    )]
    TruncatedInput {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Checksum mismatch: file says {stored:#010x}, contents give {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("Cannot encode container: {0}")]
    InvalidStructure(#[from] StructureError),
}

/// Reasons a [`Container`] cannot be encoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("A DfuSe file needs at least one target")]
    NoTargets,
    #[error("{0} targets do not fit the 8 bit target count")]
    TooManyTargets(usize),
    #[error("Target {alternate_setting} has no images")]
    EmptyTarget { alternate_setting: u8 },
    #[error("Name of target {alternate_setting} is {length} bytes, at most 255 fit")]
    NameTooLong { alternate_setting: u8, length: usize },
    #[error("Name of target {alternate_setting} contains a NUL byte")]
    NameContainsNul { alternate_setting: u8 },
    #[error("Target {alternate_setting} has {images} images, more than a 32 bit count holds")]
    TooManyImages { alternate_setting: u8, images: usize },
    #[error("Image at {address:#010x} is {length} bytes, more than a 32 bit length holds")]
    PayloadTooLarge { address: u32, length: usize },
    #[error("Images of target {alternate_setting} exceed a 32 bit size")]
    TargetTooLarge { alternate_setting: u8 },
    #[error("File exceeds a 32 bit size")]
    FileTooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &[u8] = include_bytes!("../tests/fixtures/single.dfu");
    const MULTI: &[u8] = include_bytes!("../tests/fixtures/multi.dfu");

    fn multi() -> Container {
        Container::new(vec![
            Target::named(
                0,
                "ST...",
                vec![
                    Image::new(0x0800_0000, (0..16).collect::<Vec<u8>>()),
                    Image::new(0x0801_0000, Vec::new()),
                ],
            ),
            Target::unnamed(1, vec![Image::new(0x9000_0000, b"32blit".to_vec())]),
        ])
        .with_device_version(0x0100)
        .with_product_id(0xdf11)
    }

    #[test]
    pub fn single_matches_fixture() {
        let container = Container::from_binary(DEFAULT_ADDRESS, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(encode(&container).unwrap(), SINGLE);
    }

    #[test]
    pub fn single_fixture_fields() {
        let parsed = parse(SINGLE).unwrap();

        assert_eq!(parsed.file_size, 297);
        assert_eq!(parsed.target_count, 1);
        assert_eq!(
            parsed.stored_targets,
            vec![StoredTarget {
                size: 12,
                image_count: 1
            }]
        );
        assert_eq!(parsed.checksum, 0x8f80_24aa);
        assert_eq!(
            parsed.checksum,
            checksum::dfu_crc(&SINGLE[..SINGLE.len() - 4])
        );

        let container = parsed.into_container();
        assert_eq!(container.vendor_id(), 0x0483);
        assert_eq!(container.product_id(), 0);
        assert_eq!(container.device_version(), 0);

        let target = &container.targets()[0];
        assert_eq!(target.alternate_setting(), 0);
        assert_eq!(target.display_name(), Some("ST..."));
        assert_eq!(target.images(), &[Image::new(0x0800_0000, vec![0xde, 0xad, 0xbe, 0xef])]);
    }

    #[test]
    pub fn multi_matches_fixture() {
        assert_eq!(encode(&multi()).unwrap(), MULTI);
        assert_eq!(decode(MULTI).unwrap(), multi());
    }

    #[test]
    pub fn decode_then_encode_is_byte_exact() {
        for fixture in [SINGLE, MULTI] {
            let container = decode(fixture).unwrap();
            assert_eq!(container.encode().unwrap(), fixture);
        }
    }

    #[test]
    pub fn target_order_is_kept() {
        let container = Container::new(
            [5u8, 0, 3]
                .into_iter()
                .map(|alt| Target::unnamed(alt, vec![Image::new(alt.into(), vec![alt])]))
                .collect(),
        );

        let decoded = decode(&encode(&container).unwrap()).unwrap();
        let alts: Vec<u8> = decoded
            .targets()
            .iter()
            .map(Target::alternate_setting)
            .collect();
        assert_eq!(alts, [5, 0, 3]);
    }

    #[test]
    pub fn error_messages() {
        assert_eq!(
            DfuSeError::ChecksumMismatch {
                stored: 1,
                computed: 0xffff_ffff
            }
            .to_string(),
            "Checksum mismatch: file says 0x00000001, contents give 0xffffffff"
        );
        assert_eq!(
            DfuSeError::TruncatedInput {
                field: "DFU suffix",
                offset: 0x135,
                needed: 16,
                available: 15
            }
            .to_string(),
            "Input ends inside DFU suffix at offset 0x135: 16 bytes needed, 15 available"
        );
    }
}
