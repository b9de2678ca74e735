//! Sizes of the derived length fields.
//!
//! All sizes are computed as `u64` so that an oversized structure can be
//! reported instead of wrapping; the encoder narrows them to the stored width.

use crate::{
    container::{Container, Image, Target},
    layout::{IMAGE_ELEMENT_SIZE, PREFIX_SIZE, TARGET_PREFIX_SIZE},
};

/// Address, length and payload of one image.
pub fn image_size(image: &Image) -> u64 {
    IMAGE_ELEMENT_SIZE as u64 + image.data().len() as u64
}

/// The stored target size: its images, not its own prefix.
pub fn target_size(target: &Target) -> u64 {
    target.images().iter().map(image_size).sum()
}

/// The stored file size. The suffix is not included, matching files produced
/// by ST's DfuSe tools.
pub fn file_size(container: &Container) -> u64 {
    PREFIX_SIZE as u64
        + container
            .targets()
            .iter()
            .map(|t| TARGET_PREFIX_SIZE as u64 + target_size(t))
            .sum::<u64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_counts_element_header() {
        assert_eq!(image_size(&Image::new(0, Vec::new())), 8);
        assert_eq!(image_size(&Image::new(0, vec![0xde, 0xad, 0xbe, 0xef])), 12);
    }

    #[test]
    fn target_size_sums_images() {
        let target = Target::named(
            0,
            "ST...",
            vec![
                Image::new(0x0800_0000, vec![0; 16]),
                Image::new(0x0801_0000, Vec::new()),
                Image::new(0x0802_0000, vec![0; 3]),
            ],
        );
        assert_eq!(target_size(&target), 24 + 8 + 11);
        assert_eq!(
            target_size(&target),
            target.images().iter().map(image_size).sum::<u64>()
        );
    }

    #[test]
    fn file_size_excludes_suffix() {
        assert_eq!(file_size(&Container::default()), 11);

        let container = Container::new(vec![
            Target::named(0, "a", vec![Image::new(0, vec![0; 4])]),
            Target::unnamed(1, vec![Image::new(0, vec![0; 6])]),
        ]);
        assert_eq!(file_size(&container), 11 + (274 + 12) + (274 + 14));
    }
}
