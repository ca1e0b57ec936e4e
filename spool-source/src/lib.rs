//! Presents a directory of spooled record files as a lazy sequence of
//! sanitised lines, deleting each underlying file once it has been fully
//! consumed. See [`SpoolCollector`] for the refill protocol.

mod collector;
mod string_blocks;
mod timer;

pub use collector::SpoolCollector;
pub use string_blocks::{
    clean_printable, find_first_unescaped, first_non_numeric_position, is_digits_only,
    is_number, DelimitedBlocks,
};
pub use timer::ThreadTimer;

/// Narrow logging seam the collector calls into, so that this crate does not
/// need to depend on the daemon's log-writer implementation. Mirrors the
/// annotated-message convention of the daemon's own logging contract:
/// `"<process> (<item>): <error>"`.
pub trait SpoolLog {
    fn debug(&self, message: &str);
    fn debug_annotated(&self, process: &str, item: &str);
    fn warn_annotated(&self, process: &str, item: &str);
    fn error_annotated(&self, process: &str, item: &str, error: &str);
}
