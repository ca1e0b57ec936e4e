//! Connects a translated record stream to the target time-series database:
//! health probe, idempotent database provisioning, per-line transmission.

use crate::http_client::{HttpTransport, RequestBuilder};
use crate::log_writer::LogWriter;
use crate::record::PerformanceRecord;
use crate::translator::Translator;

pub struct TimeSeriesClient<'a, T: HttpTransport> {
    transport: T,
    base_url: String,
    database: String,
    translator: Translator<'a>,
    log: &'a LogWriter,
}

impl<'a, T: HttpTransport> TimeSeriesClient<'a, T> {
    pub fn new(
        transport: T,
        host: &str,
        port: u16,
        database: impl Into<String>,
        translator: Translator<'a>,
        log: &'a LogWriter,
    ) -> Self {
        TimeSeriesClient {
            transport,
            base_url: format!("http://{host}:{port}"),
            database: database.into(),
            translator,
            log,
        }
    }

    /// `GET /ping`. Returns `false` on any non-2xx or transport error.
    pub fn test_connection(&self) -> bool {
        match RequestBuilder::new(&self.base_url, "/ping").get(&self.transport) {
            Ok(response) if response.is_ok() => true,
            Ok(response) => {
                self.log
                    .error_annotated("Testing connection", &self.base_url, &format!("status {}", response.status));
                false
            }
            Err(err) => {
                self.log.error_annotated("Testing connection", &self.base_url, &err.to_string());
                false
            }
        }
    }

    /// `GET /query?q=SHOW DATABASES`; creates the database if it is not
    /// already listed in the response body.
    pub fn create_database_if_not_exists(&self) -> bool {
        let response = RequestBuilder::new(&self.base_url, "/query")
            .query_param("q", "SHOW DATABASES")
            .get(&self.transport);

        match response {
            Ok(response) if response.is_ok() => {
                let marker = format!("[\"{}\"]", self.database);
                let present = response.body.as_deref().map(|body| body.contains(&marker)).unwrap_or(false);
                if present {
                    true
                } else {
                    self.create_database()
                }
            }
            Ok(response) => {
                self.log
                    .error_annotated("Checking database", &self.database, &format!("status {}", response.status));
                false
            }
            Err(err) => {
                self.log.error_annotated("Checking database", &self.database, &err.to_string());
                false
            }
        }
    }

    fn create_database(&self) -> bool {
        let query = format!("CREATE DATABASE \"{}\"", self.database);
        match RequestBuilder::new(&self.base_url, "/query").query_param("q", &query).post(&self.transport) {
            Ok(response) if response.is_ok() => true,
            Ok(response) => {
                self.log
                    .error_annotated("Creating database", &self.database, &format!("status {}", response.status));
                false
            }
            Err(err) => {
                self.log.error_annotated("Creating database", &self.database, &err.to_string());
                false
            }
        }
    }

    /// Posts one `/write` per translated line. Stops at the first line whose
    /// response is not "ok", forwarding `source_line` to the upload-error
    /// queue and skipping the record's remaining lines.
    pub fn transmit_line(&self, record: &PerformanceRecord, source_line: &str) {
        for line in self.translator.translate(record) {
            let response = RequestBuilder::new(&self.base_url, "/write")
                .query_param("db", &self.database)
                .query_param("precision", "s")
                .body(line)
                .post(&self.transport);

            match response {
                Ok(response) if response.is_ok() => {}
                Ok(response) => {
                    self.log
                        .error_annotated("Writing point", source_line, &format!("status {}", response.status));
                    self.log.write_upload_error(source_line);
                    return;
                }
                Err(err) => {
                    self.log.error_annotated("Writing point", source_line, &err.to_string());
                    self.log.write_upload_error(source_line);
                    return;
                }
            }
        }
    }
}
