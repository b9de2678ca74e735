use std::{
    error::Error,
    fs::{self, File},
    io::{BufWriter, Stdout, Write},
    path::Path,
};

use log::{LevelFilter, debug};
use pbr::{ProgressBar, Units};

pub fn check_input(path: &Path) -> Result<(), Box<dyn Error>> {
    if !path.is_file() {
        return Err(format!("Input {} is not a file", path.display()).into());
    }
    Ok(())
}

pub fn check_output(path: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    if path.exists() && !force {
        return Err(format!(
            "Output {} already exists, use --force to overwrite it",
            path.display()
        )
        .into());
    }
    Ok(())
}

/// Writes `bytes` to `path`, removing the file again if the write fails.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    let writer = BufWriter::new(File::create(path)?);
    let should_print_progress = log::max_level() >= LevelFilter::Info;

    let result = if should_print_progress {
        let mut reporter = ProgressBarReporter::new(bytes.len() as u64, writer);
        let result = reporter.write_all(bytes).and_then(|_| reporter.flush());
        reporter.finish();
        result
    } else {
        let mut writer = writer;
        writer.write_all(bytes).and_then(|_| writer.flush())
    };

    if let Err(err) = result {
        fs::remove_file(path)?;
        return Err(Box::new(err));
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());

    Ok(())
}

struct ProgressBarReporter<T> {
    pb: ProgressBar<Stdout>,
    inner: T,
}

impl<T: Write> ProgressBarReporter<T> {
    fn new(total_bytes: u64, inner: T) -> Self {
        let mut pb = ProgressBar::new(total_bytes);
        pb.set_units(Units::Bytes);

        Self { pb, inner }
    }

    fn finish(&mut self) {
        self.pb.finish_println("");
    }
}

impl<T: Write> Write for ProgressBarReporter<T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.pb.add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
