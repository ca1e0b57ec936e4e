//! Library half of the daemon: every module below is exercised directly by
//! unit tests and by the integration tests in `tests/`. `src/main.rs` is a
//! thin binary wrapper around [`controller::Controller`].

pub mod applock;
pub mod config;
pub mod controller;
pub mod error;
pub mod http_client;
pub mod log_writer;
pub mod output_file;
pub mod parser;
pub mod record;
pub mod translator;
pub mod tsdb_client;
