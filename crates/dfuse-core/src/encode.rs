use assert_into::AssertInto;
use log::debug;
use zerocopy::IntoBytes;

use crate::{
    DfuSeError, StructureError, checksum,
    container::{Container, Target},
    layout::{
        DfuSePrefix, DfuSuffix, ImageElement, PREFIX_SIZE, SUFFIX_CRC_OFFSET, SUFFIX_SIZE,
        TARGET_NAME_LEN, TARGET_PREFIX_SIZE, TargetPrefix,
    },
    size,
};

/// Serializes `container`.
///
/// Prefixes are reserved as zeroes, the images are written, and the prefixes
/// are then patched with the sizes and counts of what was written. The
/// checksum is appended last.
pub fn encode(container: &Container) -> Result<Vec<u8>, DfuSeError> {
    let target_count = check_container(container)?;
    let file_size = narrow(size::file_size(container), StructureError::FileTooLarge)?;

    let capacity: usize = file_size.assert_into();
    let mut out = Vec::with_capacity(capacity + SUFFIX_SIZE);
    out.resize(PREFIX_SIZE, 0);

    for target in container.targets() {
        write_target(&mut out, target)?;
    }

    debug_assert_eq!(out.len(), file_size as usize);
    out[..PREFIX_SIZE].copy_from_slice(DfuSePrefix::new(file_size, target_count).as_bytes());

    let suffix = DfuSuffix::new(
        container.device_version(),
        container.product_id(),
        container.vendor_id(),
    );
    out.extend_from_slice(&suffix.as_bytes()[..SUFFIX_CRC_OFFSET]);

    let crc = checksum::dfu_crc(&out);
    out.extend_from_slice(&crc.to_le_bytes());

    debug!(
        "Encoded {} target(s), {} bytes, crc {:#010x}",
        target_count,
        out.len(),
        crc
    );

    Ok(out)
}

fn write_target(out: &mut Vec<u8>, target: &Target) -> Result<(), DfuSeError> {
    let image_count = check_target(target)?;
    let target_size = narrow(
        size::target_size(target),
        StructureError::TargetTooLarge {
            alternate_setting: target.alternate_setting(),
        },
    )?;

    let prefix_at = out.len();
    out.resize(prefix_at + TARGET_PREFIX_SIZE, 0);

    for image in target.images() {
        let length = narrow(
            image.data().len() as u64,
            StructureError::PayloadTooLarge {
                address: image.address(),
                length: image.data().len(),
            },
        )?;

        debug!(
            "Image {:#010x}..{:#010x} ({} bytes)",
            image.address(),
            image.end_address(),
            length
        );

        out.extend_from_slice(ImageElement::new(image.address(), length).as_bytes());
        out.extend_from_slice(image.data());
    }

    debug_assert_eq!(
        out.len() - prefix_at - TARGET_PREFIX_SIZE,
        target_size as usize
    );

    let prefix = TargetPrefix::new(
        target.alternate_setting(),
        target.is_named(),
        target.name(),
        target_size,
        image_count,
    );
    out[prefix_at..prefix_at + TARGET_PREFIX_SIZE].copy_from_slice(prefix.as_bytes());

    debug!(
        "Target {} {:?}: {} image(s), {} bytes",
        target.alternate_setting(),
        target.display_name().unwrap_or_default(),
        image_count,
        target_size
    );

    Ok(())
}

fn check_container(container: &Container) -> Result<u8, DfuSeError> {
    let targets = container.targets().len();
    if targets == 0 {
        return Err(StructureError::NoTargets.into());
    }

    u8::try_from(targets).map_err(|_| StructureError::TooManyTargets(targets).into())
}

fn check_target(target: &Target) -> Result<u32, DfuSeError> {
    let alternate_setting = target.alternate_setting();

    if target.images().is_empty() {
        return Err(StructureError::EmptyTarget { alternate_setting }.into());
    }

    let name = target.name();
    if name.len() > TARGET_NAME_LEN {
        return Err(StructureError::NameTooLong {
            alternate_setting,
            length: name.len(),
        }
        .into());
    }
    if name.contains('\0') {
        return Err(StructureError::NameContainsNul { alternate_setting }.into());
    }

    let images = target.images().len();
    u32::try_from(images).map_err(|_| {
        StructureError::TooManyImages {
            alternate_setting,
            images,
        }
        .into()
    })
}

fn narrow(value: u64, overflow: StructureError) -> Result<u32, DfuSeError> {
    u32::try_from(value).map_err(|_| overflow.into())
}
