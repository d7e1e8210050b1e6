#[macro_use]
extern crate tracing;

use crate::error::Error;
use clap::{Parser, Subcommand, ValueHint};
use libfwchk::{ihex, writeback, ChecksumValue};
use std::{
    borrow::Cow,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod config;
mod error;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
struct EmbedOpts {
    /// Checksum configuration file (eg: `chksum.toml`)
    #[clap(value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Intel HEX firmware image (eg: `app.hex`)
    #[clap(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// File to write the patched image to.
    ///
    /// Defaults to `{stem}_chksum.{extension}` next to the input file. The
    /// file is only replaced once the whole image has been processed.
    #[clap(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct VerifyOpts {
    /// Checksum configuration file (eg: `chksum.toml`)
    #[clap(value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Intel HEX firmware image with an embedded checksum
    #[clap(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Opt {
    /// Compute a checksum and write it into a copy of the image
    Embed(EmbedOpts),

    /// Check the checksum stored in an image
    Verify(VerifyOpts),
}

/// Computes the 32-bit software checksum of an Intel HEX firmware image.
///
/// The checksum is printed as `* 32-bit SW-Chksum:     XXXXXXXX *`.
#[derive(Debug, Parser)]
#[clap(verbatim_doc_comment)]
struct CliParser {
    #[clap(subcommand)]
    opt: Opt,
}

fn report(value: ChecksumValue) {
    println!("* 32-bit SW-Chksum:     {value} *");
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input
        .extension()
        .map_or(Cow::Borrowed("hex"), |e| e.to_string_lossy());
    input.with_file_name(format!("{stem}_chksum.{ext}"))
}

/// Writes to a temporary file next to `path`, then renames it over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut f = NamedTempFile::new_in(dir)?;
    f.write_all(contents.as_bytes())?;
    f.flush()?;
    f.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn embed_checksum(o: EmbedOpts) -> Result<()> {
    let config = config::load(&o.config)?;
    info!("Computing checksum of {:?}...", o.input);
    let text = fs::read_to_string(&o.input)?;
    let (value, image) = libfwchk::embed(&text, &config)?;
    let patched = ihex::serialize(&image)?;

    let output = o.output.unwrap_or_else(|| default_output(&o.input));
    info!("Writing patched image to {output:?}...");
    write_atomic(&output, &patched)?;
    report(value);
    info!("OK!");
    Ok(())
}

fn verify_checksum(o: VerifyOpts) -> Result<()> {
    let config = config::load(&o.config)?;
    info!("Verifying checksum of {:?}...", o.input);
    let image = ihex::load(&fs::read_to_string(&o.input)?)?;
    let computed = libfwchk::checksum_of(&image, &config)?;

    let stored = writeback::stored(&image, &config)
        .ok_or(Error::NotEmbedded(config.destination()))?;
    if stored != computed {
        return Err(Error::VerifyMismatch { stored, computed });
    }
    report(computed);
    info!("OK!");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
    let opts = CliParser::parse();

    match opts.opt {
        Opt::Embed(o) => {
            embed_checksum(o)?;
        }
        Opt::Verify(o) => {
            verify_checksum(o)?;
        }
    }

    Ok(())
}
