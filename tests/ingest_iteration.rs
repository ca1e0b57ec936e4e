//! End-to-end exercise of one ingest iteration: spool file on disk through
//! the collector, parser, translator, and time-series client, against an
//! in-memory transport double.

use perfrelay::error::TransportError;
use perfrelay::http_client::{HttpResponse, HttpTransport};
use perfrelay::log_writer::LogWriter;
use perfrelay::parser::Parser;
use perfrelay::translator::{Translator, UnitMap};
use perfrelay::tsdb_client::TimeSeriesClient;
use spool_source::SpoolCollector;
use std::cell::RefCell;
use std::fs;
use tempfile::tempdir;

struct RecordingTransport {
    posts: RefCell<Vec<String>>,
}

impl RecordingTransport {
    fn new() -> Self {
        RecordingTransport {
            posts: RefCell::new(Vec::new()),
        }
    }
}

impl HttpTransport for RecordingTransport {
    fn get(&self, _url: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            body: Some(r#"["nagiosrecords"]"#.to_string()),
        })
    }

    fn post(&self, _url: &str, body: Option<&str>) -> Result<HttpResponse, TransportError> {
        if let Some(body) = body {
            self.posts.borrow_mut().push(body.to_string());
        }
        Ok(HttpResponse { status: 204, body: None })
    }
}

#[test]
fn single_record_happy_path_produces_one_write_and_deletes_file() {
    let dir = tempdir().unwrap();
    let spool_file = dir.path().join("one.perf");
    fs::write(&spool_file, "1700000000\thostA\tsvc1\tcpu=0.50;0.8;0.9;0;1\n").unwrap();

    let log = LogWriter::Passive;
    let unit_map = UnitMap::with_defaults();
    let translator = Translator::new("perfdata", &unit_map);
    let transport = RecordingTransport::new();
    let client = TimeSeriesClient::new(transport, "localhost", 8086, "nagiosrecords", translator, &log);
    let parser = Parser::new(&log);

    assert!(client.test_connection());
    assert!(client.create_database_if_not_exists());

    {
        let mut collector = SpoolCollector::new(dir.path(), &log);
        while collector.has_more() {
            let line = collector.next_line();
            if line.is_empty() {
                continue;
            }
            if let Some(record) = parser.parse(&line) {
                client.transmit_line(&record, &line);
            }
        }
    }

    assert!(!spool_file.exists());
}

#[test]
fn invalid_timestamp_is_routed_to_upload_error_log_and_file_still_deleted() {
    let dir = tempdir().unwrap();
    let spool_file = dir.path().join("bad.perf");
    fs::write(&spool_file, "notanumber\th\ts\ta=1\n").unwrap();

    let log_dir = tempdir().unwrap();
    let log = perfrelay::log_writer::ActiveLogWriter::new(
        log_dir.path().join("daemon.log"),
        log_dir.path().join("failed_writes.log"),
        perfrelay::log_writer::LogLevel::Debug,
        true,
        true,
        std::time::Duration::from_secs(30),
    );
    let log = LogWriter::Active(log);
    let parser = Parser::new(&log);

    {
        let mut collector = SpoolCollector::new(dir.path(), &log);
        while collector.has_more() {
            let line = collector.next_line();
            if line.is_empty() {
                continue;
            }
            parser.parse(&line);
        }
    }
    drop(log);

    assert!(!spool_file.exists());
    let failed = fs::read_to_string(log_dir.path().join("failed_writes.log")).unwrap();
    assert_eq!(failed.trim_end(), "notanumber\th\ts\ta=1");
}
