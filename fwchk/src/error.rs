use crate::config::ConfigError;
use libfwchk::ChecksumValue;
use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IoError(#[from] IoError),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    LibFwchkError(#[from] libfwchk::Error),

    #[error("stored checksum {stored} does not match computed {computed}")]
    VerifyMismatch {
        stored: ChecksumValue,
        computed: ChecksumValue,
    },

    #[error("no checksum stored at {0:#010x}")]
    NotEmbedded(u32),
}
