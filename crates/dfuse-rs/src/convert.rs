use std::{error::Error, fs, path::Path};

use dfuse_core::{Container, Image, Target};
use log::info;

use crate::output::{check_input, check_output, write_output};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub address: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: u16,
    pub name: String,
    pub alt_setting: u8,
}

impl BuildOptions {
    /// One named target holding `data` as its only image.
    pub fn container(&self, data: Vec<u8>) -> Container {
        Container::new(vec![Target::named(
            self.alt_setting,
            self.name.as_str(),
            vec![Image::new(self.address, data)],
        )])
        .with_vendor_id(self.vendor_id)
        .with_product_id(self.product_id)
        .with_device_version(self.device_version)
    }
}

pub fn convert(
    input: &Path,
    output: &Path,
    options: &BuildOptions,
    force: bool,
) -> Result<(), Box<dyn Error>> {
    check_input(input)?;
    check_output(output, force)?;

    let data = fs::read(input)?;
    info!(
        "Packing {} bytes at {:#010x} for {:04x}:{:04x}",
        data.len(),
        options.address,
        options.vendor_id,
        options.product_id
    );

    let bytes = options.container(data).encode()?;

    info!("Writing {}", output.display());
    write_output(output, &bytes)
}
