//! Parses tab-delimited spool lines into [`PerformanceRecord`]s.

use crate::log_writer::LogWriter;
use crate::record::{PerformanceDatum, PerformanceRecord};
use spool_source::{find_first_unescaped, first_non_numeric_position, is_digits_only, DelimitedBlocks};

pub struct Parser<'a> {
    log: &'a LogWriter,
}

impl<'a> Parser<'a> {
    pub fn new(log: &'a LogWriter) -> Self {
        Parser { log }
    }

    /// Parses one spool line. Returns `None` if the timestamp field is not
    /// all-digit, after logging the failure and forwarding the raw line to
    /// the upload-error queue.
    pub fn parse(&self, line: &str) -> Option<PerformanceRecord> {
        let mut fields = DelimitedBlocks::new(line, b'\t');
        let timestamp = fields.next().unwrap_or("");
        let host = fields.next().unwrap_or("");
        let service = fields.next().unwrap_or("");
        let perfdata = fields.next().unwrap_or("");
        if fields.next().is_some() {
            self.log.warn_annotated("Parsing record", "extraneous fields discarded");
        }

        if !is_digits_only(timestamp) {
            self.log.error_annotated("Parsing record", line, "timestamp is not all-digit");
            self.log.write_upload_error(line);
            return None;
        }

        let data = DelimitedBlocks::new(perfdata, b' ')
            .filter(|item| !item.is_empty())
            .map(parse_item)
            .collect();

        Some(PerformanceRecord {
            timestamp: timestamp.to_string(),
            host: host.to_string(),
            service: service.to_string(),
            data,
        })
    }
}

fn parse_item(item: &str) -> PerformanceDatum {
    let mut datum = PerformanceDatum::default();
    let mut blocks = DelimitedBlocks::new(item, b';');
    while let Some(block) = blocks.next() {
        match blocks.blocks_returned() {
            1 => parse_value_triple(block, &mut datum),
            2 => datum.warn = block.to_string(),
            3 => datum.crit = block.to_string(),
            4 => datum.min = block.to_string(),
            5 => datum.max = block.to_string(),
            _ => {}
        }
    }
    datum
}

fn parse_value_triple(block: &str, datum: &mut PerformanceDatum) {
    match find_first_unescaped(block, b'=') {
        Some(eq) => {
            datum.label = block[..eq].to_string();
            let rest = &block[eq + 1..];
            let numeric_end = first_non_numeric_position(rest);
            if numeric_end == 0 {
                // No numeric prefix at all: the whole remainder is a
                // non-numeric value (e.g. `state=ok`), not a zero-length
                // number followed by a bogus unit.
                datum.value = rest.to_string();
            } else {
                datum.value = rest[..numeric_end].to_string();
                datum.unit = rest[numeric_end..].to_string();
            }
        }
        None => datum.label = block.to_string(),
    }
}
