use std::{
    collections::HashSet,
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use dfuse_core::{Container, Image, decode};
use log::info;

use crate::output::{check_input, check_output, write_output};

pub fn dump(input: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    check_input(input)?;

    let bytes = fs::read(input)?;
    let container = decode(&bytes)?;

    let images = image_paths(input, &container)?;

    // Refuse before anything is written
    for (path, _) in &images {
        check_output(path, force)?;
    }

    for (path, image) in images {
        info!(
            "Writing {} bytes for {:#010x} to {}",
            image.data().len(),
            image.address(),
            path.display()
        );
        write_output(&path, image.data())?;
    }

    Ok(())
}

/// The output path of every image, refusing images that would share a file.
pub fn image_paths<'a>(
    input: &Path,
    container: &'a Container,
) -> Result<Vec<(PathBuf, &'a Image)>, Box<dyn Error>> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for target in container.targets() {
        for image in target.images() {
            let path = image_path(input, target.alternate_setting(), image.address());
            if !seen.insert(path.clone()) {
                return Err(format!(
                    "More than one image of target {} starts at {:#010x}, {} would be overwritten",
                    target.alternate_setting(),
                    image.address(),
                    path.display()
                )
                .into());
            }
            images.push((path, image));
        }
    }

    Ok(images)
}

/// `<dir>/<stem>-<alt setting>-<address>.bin` next to the input.
pub fn image_path(input: &Path, alternate_setting: u8, address: u32) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();

    input.with_file_name(format!(
        "{}-{}-{:#010x}.bin",
        stem, alternate_setting, address
    ))
}
