//! Level-filtered, queued logger with a background-drained main log and an
//! optional upload-error sidecar, falling back to syslog when the main log
//! cannot be written.

use crate::output_file::OutputFile;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "fatal" => Some(LogLevel::Fatal),
            _ => None,
        }
    }
}

/// Either discards everything (`Passive`) or drains to disk on a background
/// thread (`Active`). Selected once at configuration time.
pub enum LogWriter {
    Active(ActiveLogWriter),
    Passive,
}

impl LogWriter {
    pub fn should_write(&self, level: LogLevel) -> bool {
        match self {
            LogWriter::Active(active) => active.should_write(level),
            LogWriter::Passive => false,
        }
    }

    pub fn write_entry(&self, level: LogLevel, message: &str) {
        if let LogWriter::Active(active) = self {
            active.write_entry(level, message);
        }
    }

    pub fn write_upload_error(&self, line: &str) {
        if let LogWriter::Active(active) = self {
            active.write_upload_error(line);
        }
    }

    pub fn debug(&self, message: &str) {
        self.write_entry(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.write_entry(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.write_entry(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.write_entry(LogLevel::Error, message);
    }

    pub fn debug_annotated(&self, process: &str, item: &str) {
        self.debug(&format!("{process} ({item})"));
    }

    pub fn warn_annotated(&self, process: &str, item: &str) {
        self.warn(&format!("{process} ({item})"));
    }

    pub fn error_annotated(&self, process: &str, item: &str, error: &str) {
        self.error(&format!("{process} ({item}): {error}"));
    }
}

/// Narrow trait implemented for [`LogWriter`] so other crates (the spool
/// collector) can log without depending on this crate's concrete type.
impl spool_source::SpoolLog for LogWriter {
    fn debug(&self, message: &str) {
        LogWriter::debug(self, message);
    }
    fn debug_annotated(&self, process: &str, item: &str) {
        LogWriter::debug_annotated(self, process, item);
    }
    fn warn_annotated(&self, process: &str, item: &str) {
        LogWriter::warn_annotated(self, process, item);
    }
    fn error_annotated(&self, process: &str, item: &str, error: &str) {
        LogWriter::error_annotated(self, process, item, error);
    }
}

pub struct ActiveLogWriter {
    min_level: LogLevel,
    save_failed_writes: bool,
    main_queue: Arc<Mutex<VecDeque<String>>>,
    upload_queue: Arc<Mutex<VecDeque<String>>>,
    idle_mutex: Arc<Mutex<()>>,
    wake: Arc<Condvar>,
    stop: Arc<AtomicBool>,
    drain: Option<JoinHandle<()>>,
}

impl ActiveLogWriter {
    pub fn new(
        main_log_path: impl Into<PathBuf>,
        failed_writes_path: impl Into<PathBuf>,
        min_level: LogLevel,
        save_failed_writes: bool,
        failed_writes_fallback: bool,
        idle_timeout: Duration,
    ) -> Self {
        let main_queue = Arc::new(Mutex::new(VecDeque::new()));
        let upload_queue = Arc::new(Mutex::new(VecDeque::new()));
        let idle_mutex = Arc::new(Mutex::new(()));
        let wake = Arc::new(Condvar::new());
        let stop = Arc::new(AtomicBool::new(false));

        let main_log = OutputFile::new(main_log_path, idle_timeout);
        let failed_writes = save_failed_writes.then(|| OutputFile::new(failed_writes_path, idle_timeout));

        let drain = {
            let main_queue = Arc::clone(&main_queue);
            let upload_queue = Arc::clone(&upload_queue);
            let idle_mutex = Arc::clone(&idle_mutex);
            let wake = Arc::clone(&wake);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("log-drain".to_string())
                .spawn(move || {
                    drain_loop(
                        main_log,
                        failed_writes,
                        failed_writes_fallback,
                        main_queue,
                        upload_queue,
                        idle_mutex,
                        wake,
                        stop,
                    )
                })
                .expect("spawning log drain thread")
        };

        ActiveLogWriter {
            min_level,
            save_failed_writes,
            main_queue,
            upload_queue,
            idle_mutex,
            wake,
            stop,
            drain: Some(drain),
        }
    }

    pub fn should_write(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn write_entry(&self, level: LogLevel, message: &str) {
        if !self.should_write(level) {
            return;
        }
        let formatted = format!("[{level}] {message}");
        self.main_queue.lock().unwrap().push_back(formatted);
        self.wake.notify_one();
    }

    pub fn write_upload_error(&self, line: &str) {
        if !self.save_failed_writes {
            return;
        }
        self.upload_queue.lock().unwrap().push_back(line.to_string());
        self.wake.notify_one();
    }
}

impl Drop for ActiveLogWriter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_all();
        if let Some(handle) = self.drain.take() {
            let _ = handle.join();
        }
    }
}

fn drain_loop(
    main_log: OutputFile,
    failed_writes: Option<OutputFile>,
    failed_writes_fallback: bool,
    main_queue: Arc<Mutex<VecDeque<String>>>,
    upload_queue: Arc<Mutex<VecDeque<String>>>,
    idle_mutex: Arc<Mutex<()>>,
    wake: Arc<Condvar>,
    stop: Arc<AtomicBool>,
) {
    let syslog_fallback = AtomicBool::new(false);
    let mut syslog_writer = open_syslog();

    loop {
        {
            let guard = idle_mutex.lock().unwrap();
            let _ = wake.wait_timeout(guard, DRAIN_POLL_INTERVAL).unwrap();
        }

        drain_once(
            &main_log,
            failed_writes.as_ref(),
            failed_writes_fallback,
            &main_queue,
            &upload_queue,
            &syslog_fallback,
            &mut syslog_writer,
        );

        if stop.load(Ordering::SeqCst) {
            return;
        }
    }
}

fn drain_once(
    main_log: &OutputFile,
    failed_writes: Option<&OutputFile>,
    failed_writes_fallback: bool,
    main_queue: &Arc<Mutex<VecDeque<String>>>,
    upload_queue: &Arc<Mutex<VecDeque<String>>>,
    syslog_fallback: &AtomicBool,
    syslog_writer: &mut Option<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>>,
) {
    let mut main_batch = {
        let mut queue = main_queue.lock().unwrap();
        std::mem::take(&mut *queue)
    };

    while let Some(line) = main_batch.pop_front() {
        if syslog_fallback.load(Ordering::SeqCst) {
            emit_syslog(syslog_writer, &line);
            continue;
        }
        if let Err(err) = main_log.write(&line, true) {
            emit_syslog(syslog_writer, &format!("main log write failed, falling back to syslog: {err}"));
            syslog_fallback.store(true, Ordering::SeqCst);
            main_batch.push_front(line);
            let mut queue = main_queue.lock().unwrap();
            for remaining in main_batch.drain(..).rev() {
                queue.push_front(remaining);
            }
            break;
        }
    }

    let upload_batch = {
        let mut queue = upload_queue.lock().unwrap();
        std::mem::take(&mut *queue)
    };

    if let Some(failed_writes) = failed_writes {
        for line in upload_batch {
            if let Err(err) = failed_writes.write(&line, false) {
                if failed_writes_fallback {
                    emit_syslog(syslog_writer, &format!("upload-error write failed: {err}: {line}"));
                }
            }
        }
    }
}

fn open_syslog() -> Option<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>> {
    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: env!("CARGO_PKG_NAME").to_string(),
        pid: std::process::id(),
    };
    match syslog::unix(formatter) {
        Ok(logger) => Some(logger),
        Err(err) => {
            tracing::warn!("could not open syslog fallback: {err}");
            None
        }
    }
}

fn emit_syslog(
    writer: &mut Option<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>>,
    message: &str,
) {
    if let Some(logger) = writer.as_mut() {
        let _ = logger.err(message);
    } else {
        tracing::error!("{message}");
    }
}
