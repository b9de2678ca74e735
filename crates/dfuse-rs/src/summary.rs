use std::{
    error::Error,
    fmt::{self, Write},
    fs,
    path::Path,
};

use dfuse_core::{ParsedContainer, layout::DFU_SPEC_NUMBER, parse};

use crate::output::check_input;

pub fn read(input: &Path) -> Result<(), Box<dyn Error>> {
    check_input(input)?;

    let bytes = fs::read(input)?;
    let parsed = parse(&bytes)?;

    print!("{}", summary(&parsed, bytes.len())?);

    Ok(())
}

/// Human readable listing of a parsed file of `file_len` bytes.
pub fn summary(parsed: &ParsedContainer, file_len: usize) -> Result<String, fmt::Error> {
    let container = &parsed.container;
    let mut out = String::new();

    writeln!(
        out,
        "DfuSe v1, {} bytes ({} without suffix), {} target(s)",
        file_len, parsed.file_size, parsed.target_count
    )?;

    for (target, stored) in container.targets().iter().zip(&parsed.stored_targets) {
        write!(out, "Target {}", target.alternate_setting())?;
        if let Some(name) = target.display_name() {
            write!(out, " {:?}", name)?;
        }
        writeln!(
            out,
            ": {} image(s), {} bytes",
            stored.image_count, stored.size
        )?;

        for image in target.images() {
            writeln!(
                out,
                "  {:#010x}..{:#010x} ({} bytes)",
                image.address(),
                image.end_address(),
                image.data().len()
            )?;
        }
    }

    writeln!(
        out,
        "Device {:#06x}, product {:#06x}, vendor {:#06x}, DFU {:#06x}",
        container.device_version(),
        container.product_id(),
        container.vendor_id(),
        DFU_SPEC_NUMBER
    )?;
    writeln!(out, "CRC {:#010x}", parsed.checksum)?;

    Ok(out)
}
