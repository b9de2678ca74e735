use std::mem::{self, offset_of};

use assert_into::AssertInto;
use log::{debug, warn};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::{
    DfuSeError, checksum,
    container::{Container, Image, Target},
    layout::{
        DfuSePrefix, DfuSuffix, IMAGE_ELEMENT_SIZE, ImageElement, SUFFIX_CRC_OFFSET, SUFFIX_SIZE,
        TargetPrefix,
    },
};

/// Sizes and counts as they were stored in a target prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredTarget {
    pub size: u32,
    pub image_count: u32,
}

/// A decoded container together with the derived fields read from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContainer {
    pub container: Container,
    pub file_size: u32,
    pub target_count: u8,
    /// One entry per target, in the same order as the container's targets.
    pub stored_targets: Vec<StoredTarget>,
    pub checksum: u32,
}

impl ParsedContainer {
    pub fn into_container(self) -> Container {
        self.container
    }
}

/// Decodes `bytes` into a [`Container`].
pub fn decode(bytes: &[u8]) -> Result<Container, DfuSeError> {
    parse(bytes).map(ParsedContainer::into_container)
}

/// Decodes `bytes`, keeping the stored sizes, counts and checksum.
///
/// Stored sizes bound the traversal: images are read until their target's
/// size is used up, and targets are read until only the suffix is left. The
/// stored counts are not needed for this and are only compared against what
/// was found. The checksum is verified after everything else parsed.
pub fn parse(bytes: &[u8]) -> Result<ParsedContainer, DfuSeError> {
    let mut reader = Reader::new(bytes);

    let prefix_at = reader.position();
    let prefix: &DfuSePrefix = reader.read("DfuSe prefix")?;
    prefix.check(prefix_at)?;

    let file_size = prefix.file_size.get();
    let target_count = prefix.targets;
    debug!(
        "DfuSe file of {} bytes with {} target(s)",
        file_size, target_count
    );

    let mut raw_targets = Vec::new();
    while reader.remaining() > SUFFIX_SIZE {
        raw_targets.push(parse_target(&mut reader)?);
    }

    if raw_targets.len() != target_count as usize {
        warn!(
            "Header declares {} target(s) but {} were found",
            target_count,
            raw_targets.len()
        );
    }

    let suffix_at = reader.position();
    let suffix: &DfuSuffix = reader.read("DFU suffix")?;
    suffix.check(suffix_at)?;

    let stored = suffix.crc.get();
    let computed = checksum::dfu_crc(&bytes[..suffix_at + SUFFIX_CRC_OFFSET]);
    if stored != computed {
        return Err(DfuSeError::ChecksumMismatch { stored, computed });
    }

    // Names are only interpreted once the bytes are known to be intact
    let stored_targets = raw_targets.iter().map(|raw| raw.stored).collect();
    let targets = raw_targets
        .into_iter()
        .map(RawTarget::into_target)
        .collect::<Result<Vec<_>, _>>()?;

    let container = Container::new(targets)
        .with_device_version(suffix.device_version.get())
        .with_product_id(suffix.product_id.get())
        .with_vendor_id(suffix.vendor_id.get());

    Ok(ParsedContainer {
        container,
        file_size,
        target_count,
        stored_targets,
        checksum: stored,
    })
}

/// A target whose name field has not been decoded yet.
struct RawTarget<'a> {
    prefix_at: usize,
    prefix: &'a TargetPrefix,
    stored: StoredTarget,
    images: Vec<Image>,
}

impl RawTarget<'_> {
    fn into_target(self) -> Result<Target, DfuSeError> {
        let name = self.prefix.name(self.prefix_at)?;

        Ok(Target::with_name_field(
            self.prefix.alternate_setting,
            self.prefix.is_named(),
            name,
            self.images,
        ))
    }
}

fn parse_target<'a>(reader: &mut Reader<'a>) -> Result<RawTarget<'a>, DfuSeError> {
    let prefix_at = reader.position();
    let prefix: &TargetPrefix = reader.read("target prefix")?;
    prefix.check(prefix_at)?;

    let stored = StoredTarget {
        size: prefix.target_size.get(),
        image_count: prefix.num_elements.get(),
    };

    debug!(
        "Target {} at {:#x}: {} bytes",
        prefix.alternate_setting, prefix_at, stored.size
    );

    let mut images = Vec::new();
    let mut remaining: usize = stored.size.assert_into();
    while remaining > 0 {
        let element_at = reader.position();
        let element: &ImageElement = reader.read("image element")?;
        let length: usize = element.size.get().assert_into();

        let consumed = IMAGE_ELEMENT_SIZE.saturating_add(length);
        if consumed > remaining {
            return Err(DfuSeError::MalformedHeader {
                field: "image size",
                offset: element_at + offset_of!(ImageElement, size),
                expected: format!(
                    "at most {} bytes left in target",
                    remaining.saturating_sub(IMAGE_ELEMENT_SIZE)
                ),
                found: length.to_string(),
            });
        }

        let data = reader.take(length, "image payload")?;
        remaining -= consumed;

        debug!(
            "Image {:#010x} ({} bytes)",
            element.address.get(),
            data.len()
        );
        images.push(Image::new(element.address.get(), data));
    }

    if images.len() != stored.image_count as usize {
        warn!(
            "Target {} declares {} image(s) but {} were found",
            prefix.alternate_setting,
            stored.image_count,
            images.len()
        );
    }

    Ok(RawTarget {
        prefix_at,
        prefix,
        stored,
        images,
    })
}

/// A cursor over the input that reports how far it got when it runs out.
struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], DfuSeError> {
        if len > self.remaining() {
            return Err(self.truncated(field, len));
        }

        let bytes: &'a [u8] = self.bytes;
        let taken = &bytes[self.position..self.position + len];
        self.position += len;
        Ok(taken)
    }

    fn read<T>(&mut self, field: &'static str) -> Result<&'a T, DfuSeError>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let bytes = self.take(mem::size_of::<T>(), field)?;
        T::ref_from_bytes(bytes).map_err(|_| DfuSeError::TruncatedInput {
            field,
            offset: self.position - bytes.len(),
            needed: mem::size_of::<T>(),
            available: bytes.len(),
        })
    }

    fn truncated(&self, field: &'static str, needed: usize) -> DfuSeError {
        DfuSeError::TruncatedInput {
            field,
            offset: self.position,
            needed,
            available: self.remaining(),
        }
    }
}
