//! Subsystem error enums. These are internal to each component's
//! implementation; public operations collapse them to a logged event plus a
//! `bool`/`Option`, per the propagation policy every component follows.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
pub enum OutputFileError {
    #[snafu(display("creating directory {}: {}", path.display(), source))]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[snafu(display("opening {}: {}", path.display(), source))]
    Open { path: PathBuf, source: std::io::Error },
    #[snafu(display("writing {}: {}", path.display(), source))]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Snafu)]
pub enum LockError {
    #[snafu(display("creating lock directory {}: {}", path.display(), source))]
    CreateLockDir { path: PathBuf, source: std::io::Error },
    #[snafu(display("opening lock file {}: {}", path.display(), source))]
    OpenLock { path: PathBuf, source: std::io::Error },
    #[snafu(display("another instance already holds the lock at {}", path.display()))]
    AlreadyLocked { path: PathBuf },
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("reading {}: {}", path.display(), source))]
    Read { path: PathBuf, source: std::io::Error },
    #[snafu(display("parsing {}: {}", path.display(), source))]
    Parse { path: PathBuf, source: Box<toml::de::Error> },
}

#[derive(Debug, Snafu)]
pub enum TransportError {
    #[snafu(display("request to {}: {}", url, source))]
    Request { url: String, source: reqwest::Error },
    #[snafu(display("building url {}: {}", url, source))]
    InvalidUrl { url: String, source: url::ParseError },
}
