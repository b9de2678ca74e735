//! On-disk structures of a DfuSe file.
//!
//! A file is laid out as one [`DfuSePrefix`], then for each target a
//! [`TargetPrefix`] followed by its [`ImageElement`]s (each immediately
//! followed by its payload), and finally one [`DfuSuffix`]. Every integer is
//! little-endian.
//!
//! See STMicroelectronics UM0391 for the format description.

use std::mem::{self, offset_of};

use static_assertions::const_assert_eq;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::little_endian::{U16, U32},
};

use crate::DfuSeError;

pub const DFUSE_SIGNATURE: [u8; 5] = *b"DfuSe";
pub const DFUSE_VERSION: u8 = 0x01;

pub const TARGET_SIGNATURE: [u8; 6] = *b"Target";
pub const TARGET_NAME_LEN: usize = 255;

/// bcdDFU of the DfuSe extension.
pub const DFU_SPEC_NUMBER: u16 = 0x011a;
/// The suffix signature 0x444655 ("DFU") stored least significant byte first.
pub const DFU_SUFFIX_SIGNATURE: [u8; 3] = *b"UFD";
pub const DFU_SUFFIX_LENGTH: u8 = 16;

pub const PREFIX_SIZE: usize = mem::size_of::<DfuSePrefix>();
pub const TARGET_PREFIX_SIZE: usize = mem::size_of::<TargetPrefix>();
pub const IMAGE_ELEMENT_SIZE: usize = mem::size_of::<ImageElement>();
pub const SUFFIX_SIZE: usize = mem::size_of::<DfuSuffix>();

/// Offset of the checksum inside the suffix. The checksum covers every byte
/// of the file before it.
pub const SUFFIX_CRC_OFFSET: usize = offset_of!(DfuSuffix, crc);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DfuSePrefix {
    pub signature: [u8; 5],
    pub version: u8,
    /// Everything except the suffix
    pub file_size: U32,
    pub targets: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct TargetPrefix {
    pub signature: [u8; 6],
    pub alternate_setting: u8,
    pub target_named: u8,
    pub padding: [u8; 3],
    pub target_name: [u8; TARGET_NAME_LEN],
    pub target_size: U32,
    pub num_elements: U32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct ImageElement {
    pub address: U32,
    pub size: U32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct DfuSuffix {
    pub device_version: U16,
    pub product_id: U16,
    pub vendor_id: U16,
    pub dfu_spec: U16,
    pub signature: [u8; 3],
    pub length: u8,
    pub crc: U32,
}

const_assert_eq!(PREFIX_SIZE, 11);
const_assert_eq!(TARGET_PREFIX_SIZE, 274);
const_assert_eq!(IMAGE_ELEMENT_SIZE, 8);
const_assert_eq!(SUFFIX_SIZE, DFU_SUFFIX_LENGTH as usize);

impl DfuSePrefix {
    pub fn new(file_size: u32, targets: u8) -> Self {
        Self {
            signature: DFUSE_SIGNATURE,
            version: DFUSE_VERSION,
            file_size: U32::new(file_size),
            targets,
        }
    }

    /// Validates the constant fields of a prefix read at `offset`.
    pub fn check(&self, offset: usize) -> Result<(), DfuSeError> {
        expect_bytes(
            "DfuSe signature",
            offset + offset_of!(Self, signature),
            &DFUSE_SIGNATURE,
            &self.signature,
        )?;
        expect_value(
            "DfuSe version",
            offset + offset_of!(Self, version),
            DFUSE_VERSION,
            self.version,
        )
    }
}

impl TargetPrefix {
    /// `name` must already be known to fit in the name field.
    pub fn new(
        alternate_setting: u8,
        named: bool,
        name: &str,
        target_size: u32,
        num_elements: u32,
    ) -> Self {
        let mut target_name = [0; TARGET_NAME_LEN];
        target_name[..name.len()].copy_from_slice(name.as_bytes());

        Self {
            signature: TARGET_SIGNATURE,
            alternate_setting,
            target_named: named.into(),
            padding: [0; 3],
            target_name,
            target_size: U32::new(target_size),
            num_elements: U32::new(num_elements),
        }
    }

    pub fn check(&self, offset: usize) -> Result<(), DfuSeError> {
        expect_bytes(
            "target signature",
            offset + offset_of!(Self, signature),
            &TARGET_SIGNATURE,
            &self.signature,
        )
    }

    pub fn is_named(&self) -> bool {
        self.target_named != 0
    }

    /// The name up to its first NUL byte.
    pub fn name(&self, offset: usize) -> Result<&str, DfuSeError> {
        let end = self
            .target_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(TARGET_NAME_LEN);

        std::str::from_utf8(&self.target_name[..end]).map_err(|err| {
            let bad = err.valid_up_to();
            DfuSeError::MalformedHeader {
                field: "target name",
                offset: offset + offset_of!(Self, target_name) + bad,
                expected: "UTF-8 text".to_string(),
                found: format!("byte {:#04x}", self.target_name[bad]),
            }
        })
    }
}

impl ImageElement {
    pub fn new(address: u32, size: u32) -> Self {
        Self {
            address: U32::new(address),
            size: U32::new(size),
        }
    }
}

impl DfuSuffix {
    /// A suffix with its checksum still zeroed.
    pub fn new(device_version: u16, product_id: u16, vendor_id: u16) -> Self {
        Self {
            device_version: U16::new(device_version),
            product_id: U16::new(product_id),
            vendor_id: U16::new(vendor_id),
            dfu_spec: U16::new(DFU_SPEC_NUMBER),
            signature: DFU_SUFFIX_SIGNATURE,
            length: DFU_SUFFIX_LENGTH,
            crc: U32::new(0),
        }
    }

    pub fn check(&self, offset: usize) -> Result<(), DfuSeError> {
        expect_value(
            "DFU spec number",
            offset + offset_of!(Self, dfu_spec),
            DFU_SPEC_NUMBER,
            self.dfu_spec.get(),
        )?;
        expect_bytes(
            "DFU suffix signature",
            offset + offset_of!(Self, signature),
            &DFU_SUFFIX_SIGNATURE,
            &self.signature,
        )?;
        expect_value(
            "DFU suffix length",
            offset + offset_of!(Self, length),
            DFU_SUFFIX_LENGTH,
            self.length,
        )
    }
}

fn expect_bytes(
    field: &'static str,
    offset: usize,
    expected: &[u8],
    found: &[u8],
) -> Result<(), DfuSeError> {
    if expected == found {
        return Ok(());
    }

    Err(DfuSeError::MalformedHeader {
        field,
        offset,
        expected: format!("\"{}\"", expected.escape_ascii()),
        found: format!("\"{}\"", found.escape_ascii()),
    })
}

fn expect_value<T>(field: &'static str, offset: usize, expected: T, found: T) -> Result<(), DfuSeError>
where
    T: PartialEq + std::fmt::LowerHex,
{
    if expected == found {
        return Ok(());
    }

    Err(DfuSeError::MalformedHeader {
        field,
        offset,
        expected: format!("{:#x}", expected),
        found: format!("{:#x}", found),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_layout() {
        let prefix = DfuSePrefix::new(0x129, 1);
        assert_eq!(
            prefix.as_bytes(),
            &[0x44, 0x66, 0x75, 0x53, 0x65, 0x01, 0x29, 0x01, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn target_prefix_pads_name() {
        let prefix = TargetPrefix::new(2, true, "ST...", 12, 1);
        let bytes = prefix.as_bytes();

        assert_eq!(&bytes[..6], b"Target");
        assert_eq!(bytes[6], 2);
        assert_eq!(bytes[7], 1);
        assert_eq!(&bytes[8..11], &[0, 0, 0]);
        assert_eq!(&bytes[11..16], b"ST...");
        assert!(bytes[16..266].iter().all(|&b| b == 0));
        assert_eq!(&bytes[266..270], &[12, 0, 0, 0]);
        assert_eq!(&bytes[270..274], &[1, 0, 0, 0]);
    }

    #[test]
    fn suffix_layout() {
        let suffix = DfuSuffix::new(0x0100, 0xdf11, 0x0483);
        assert_eq!(
            suffix.as_bytes(),
            &[
                0x00, 0x01, 0x11, 0xdf, 0x83, 0x04, 0x1a, 0x01, 0x55, 0x46, 0x44, 0x10, 0, 0, 0, 0
            ]
        );
        assert_eq!(SUFFIX_CRC_OFFSET, 12);
    }

    #[test]
    fn bad_signature_names_field_and_offset() {
        let mut prefix = DfuSePrefix::new(0, 0);
        prefix.signature[0] = b'X';

        let err = prefix.check(0).unwrap_err();
        assert_eq!(
            err,
            DfuSeError::MalformedHeader {
                field: "DfuSe signature",
                offset: 0,
                expected: "\"DfuSe\"".to_string(),
                found: "\"XfuSe\"".to_string(),
            }
        );
    }

    #[test]
    fn bad_suffix_length_is_reported_at_its_offset() {
        let mut suffix = DfuSuffix::new(0, 0, 0x0483);
        suffix.length = 15;

        match suffix.check(100) {
            Err(DfuSeError::MalformedHeader { field, offset, .. }) => {
                assert_eq!(field, "DFU suffix length");
                assert_eq!(offset, 111);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn name_stops_at_nul_and_rejects_invalid_utf8() {
        let prefix = TargetPrefix::new(0, true, "flash", 0, 0);
        assert_eq!(prefix.name(0).unwrap(), "flash");

        let mut full = TargetPrefix::new(0, true, "", 0, 0);
        full.target_name = [b'a'; TARGET_NAME_LEN];
        assert_eq!(full.name(0).unwrap().len(), TARGET_NAME_LEN);

        let mut broken = TargetPrefix::new(0, true, "ab", 0, 0);
        broken.target_name[1] = 0xff;
        match broken.name(0) {
            Err(DfuSeError::MalformedHeader { field, offset, .. }) => {
                assert_eq!(field, "target name");
                assert_eq!(offset, 12);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
