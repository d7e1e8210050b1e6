//! Checksum configuration files.
//!
//! ```toml
//! [checksum]
//! destination = 0x0800_fffc
//! word_width = 32         # 8, 16 or 32 (default 32)
//! byte_order = "little"   # "little"/"le" or "big"/"be" (default little)
//! seed = 0                # default 0
//! fill = 0xff             # optional: value of unpopulated bytes
//!
//! [[range]]
//! name = "application"    # optional
//! start = 0x0800_0000     # inclusive
//! end = 0x0800_fffc       # exclusive
//! ```
//!
//! Ranges are summed in the order they appear in the file.

use crate::Result;
use libfwchk::{ByteOrder, ChecksumConfig, SourceRange, WordWidth};
use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one [[range]] is required")]
    NoRanges,

    #[error("word_width must be 8, 16 or 32, not {0}")]
    WordWidth(u32),

    #[error("byte_order must be \"little\" or \"big\", not {0:?}")]
    ByteOrder(String),

    #[error("range {name:?} ends at {end:#x}, before it starts at {start:#x}")]
    EmptyRange { name: String, start: u32, end: u32 },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    checksum: ChecksumSection,
    #[serde(default, rename = "range")]
    ranges: Vec<RangeSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChecksumSection {
    destination: u32,
    word_width: Option<u32>,
    byte_order: Option<String>,
    seed: Option<u32>,
    fill: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeSection {
    name: Option<String>,
    start: u32,
    end: u32,
}

fn parse_byte_order(s: &str) -> std::result::Result<ByteOrder, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "little" | "le" => Ok(ByteOrder::Little),
        "big" | "be" => Ok(ByteOrder::Big),
        _ => Err(ConfigError::ByteOrder(s.to_string())),
    }
}

impl TryFrom<ConfigFile> for ChecksumConfig {
    type Error = ConfigError;

    fn try_from(f: ConfigFile) -> std::result::Result<Self, Self::Error> {
        if f.ranges.is_empty() {
            return Err(ConfigError::NoRanges);
        }
        let ranges = f
            .ranges
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let name = r.name.unwrap_or_else(|| format!("range{i}"));
                if r.start >= r.end {
                    return Err(ConfigError::EmptyRange {
                        name,
                        start: r.start,
                        end: r.end,
                    });
                }
                Ok(SourceRange::new(name, r.start, r.end))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let c = f.checksum;
        let word_width = match c.word_width {
            Some(bits) => WordWidth::try_from(bits).map_err(ConfigError::WordWidth)?,
            None => WordWidth::default(),
        };
        let byte_order = match c.byte_order {
            Some(s) => parse_byte_order(&s)?,
            None => ByteOrder::default(),
        };

        Ok(ChecksumConfig::new(ranges, c.destination)
            .with_word_width(word_width)
            .with_byte_order(byte_order)
            .with_seed(c.seed.unwrap_or(0))
            .with_fill(c.fill))
    }
}

pub fn parse(text: &str) -> Result<ChecksumConfig> {
    let file: ConfigFile = toml::from_str(text)?;
    Ok(ChecksumConfig::try_from(file)?)
}

pub fn load(path: &Path) -> Result<ChecksumConfig> {
    let config = parse(&fs::read_to_string(path)?)?;
    debug!(?config, "loaded {path:?}");
    Ok(config)
}
