use std::{io::Write, path::PathBuf};

use clap::{Parser, ValueEnum};
use dfuse_core::DEFAULT_TARGET_NAME;
use env_logger::Env;
use log::*;

use crate::{
    convert::{BuildOptions, convert},
    dump::dump,
    summary::read,
};

mod convert;
mod dump;
mod output;
mod summary;

#[derive(Parser, Debug)]
enum Command {
    /// Pack a raw binary into a DfuSe file
    #[command(arg_required_else_help = true)]
    Build {
        /// Input binary
        input: PathBuf,

        /// Output DfuSe file
        output: PathBuf,

        /// Address the binary is written to
        #[clap(short, long, value_parser = parse_number::<u32>, default_value = "0x08000000")]
        address: u32,

        /// USB vendor id stored in the suffix
        #[clap(long, value_parser = parse_number::<u16>, default_value = "0x0483")]
        vendor_id: u16,

        /// USB product id stored in the suffix
        #[clap(long, value_parser = parse_number::<u16>, default_value = "0")]
        product_id: u16,

        /// Device firmware version stored in the suffix
        #[clap(long, value_parser = parse_number::<u16>, default_value = "0")]
        device_version: u16,

        /// Target name
        #[clap(long, default_value = DEFAULT_TARGET_NAME)]
        name: String,

        /// USB alternate setting of the target
        #[clap(long, value_parser = parse_number::<u8>, default_value = "0")]
        alt_setting: u8,

        /// Replace the output if it exists
        #[clap(short, long)]
        force: bool,
    },
    /// Print the contents of a DfuSe file
    #[command(arg_required_else_help = true)]
    Read {
        /// Input DfuSe file
        input: PathBuf,
    },
    /// Write every image of a DfuSe file to its own binary
    #[command(arg_required_else_help = true)]
    Dump {
        /// Input DfuSe file
        input: PathBuf,

        /// Replace existing image files
        #[clap(short, long)]
        force: bool,
    },
}

/// Accepts decimal or `0x` prefixed hex, with optional `_` separators.
fn parse_number<T: TryFrom<u64>>(s: &str) -> Result<T, String> {
    let digits = s.trim().replace('_', "");

    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|err| format!("'{}' is not a number: {}", s, err))?;

    T::try_from(value).map_err(|_| {
        format!(
            "{} does not fit in {} bits",
            s,
            std::mem::size_of::<T>() * 8
        )
    })
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, global = true, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    match command {
        Command::Build {
            input,
            output,
            address,
            vendor_id,
            product_id,
            device_version,
            name,
            alt_setting,
            force,
        } => {
            let options = BuildOptions {
                address,
                vendor_id,
                product_id,
                device_version,
                name,
                alt_setting,
            };

            convert(&input, &output, &options, force)
        }
        Command::Read { input } => read(&input),
        Command::Dump { input, force } => dump(&input, force),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_number::<u32>("0x08000000"), Ok(0x0800_0000));
        assert_eq!(parse_number::<u32>("0X0800_0000"), Ok(0x0800_0000));
        assert_eq!(parse_number::<u32>("134217728"), Ok(0x0800_0000));
        assert_eq!(parse_number::<u16>(" 0x0483 "), Ok(0x0483));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(parse_number::<u32>("0x").is_err());
        assert!(parse_number::<u32>("flash").is_err());
        assert_eq!(
            parse_number::<u8>("256"),
            Err("256 does not fit in 8 bits".to_string())
        );
    }

    #[test]
    fn build_defaults() {
        let cli = Cli::parse_from(["dfuse-rs", "build", "game.bin", "game.dfu"]);

        match cli.command {
            Some(Command::Build {
                address,
                vendor_id,
                product_id,
                device_version,
                name,
                alt_setting,
                force,
                ..
            }) => {
                assert_eq!(address, 0x0800_0000);
                assert_eq!(vendor_id, 0x0483);
                assert_eq!(product_id, 0);
                assert_eq!(device_version, 0);
                assert_eq!(name, "ST...");
                assert_eq!(alt_setting, 0);
                assert!(!force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
