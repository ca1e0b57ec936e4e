//! Append-only file with a lazily-opened handle and a background thread that
//! closes it after an idle period. Concurrent writes are serialised by the
//! same mutex the idle closer takes before closing, so a write in flight
//! blocks the closer and vice versa.

use crate::error::{CreateDirSnafu, OpenSnafu, OutputFileError, WriteSnafu};
use chrono::Local;
use snafu::ResultExt;
use spool_source::ThreadTimer;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Inner {
    handle: Option<File>,
    timer: ThreadTimer,
}

/// An append-only log file that opens itself on first write and closes
/// itself after `idle_timeout` of inactivity.
pub struct OutputFile {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
    idle_cv: Arc<Condvar>,
    stop: Arc<AtomicBool>,
    closer: Option<JoinHandle<()>>,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        let path = path.into();
        let inner = Arc::new(Mutex::new(Inner {
            handle: None,
            timer: ThreadTimer::new(idle_timeout),
        }));
        let idle_cv = Arc::new(Condvar::new());
        let stop = Arc::new(AtomicBool::new(false));

        let closer = {
            let inner = Arc::clone(&inner);
            let idle_cv = Arc::clone(&idle_cv);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("outfile-closer:{}", path.display()))
                .spawn(move || idle_closer_loop(inner, idle_cv, stop))
                .expect("spawning idle closer thread")
        };

        OutputFile {
            path,
            inner,
            idle_cv,
            stop,
            closer: Some(closer),
        }
    }

    /// Writes `message` followed by a newline, opening the file first if its
    /// handle is currently closed. `with_stamp` prefixes `[YYYY-MM-DD
    /// HH:MM:SS]: ` to the message.
    pub fn write(&self, message: &str, with_stamp: bool) -> Result<(), OutputFileError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.handle.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).context(CreateDirSnafu {
                    path: parent.to_path_buf(),
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .context(OpenSnafu {
                    path: self.path.clone(),
                })?;
            inner.handle = Some(file);
        }

        let line = if with_stamp {
            format!("[{}]: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
        } else {
            format!("{message}\n")
        };

        let result = inner
            .handle
            .as_mut()
            .expect("handle opened above")
            .write_all(line.as_bytes())
            .context(WriteSnafu {
                path: self.path.clone(),
            });

        if result.is_ok() {
            inner.timer.reset();
        }
        result
    }
}

fn idle_closer_loop(inner: Arc<Mutex<Inner>>, idle_cv: Arc<Condvar>, stop: Arc<AtomicBool>) {
    loop {
        let guard = inner.lock().unwrap();
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let timeout = guard.timer.timeout();
        let (mut guard, wait_result) = idle_cv.wait_timeout(guard, timeout).unwrap();
        if stop.load(Ordering::SeqCst) {
            return;
        }
        if wait_result.timed_out() && guard.timer.expired() {
            guard.handle = None;
        }
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.idle_cv.notify_all();
        if let Some(handle) = self.closer.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_creates_file_and_appends_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("out.log");
        let file = OutputFile::new(&path, Duration::from_secs(60));
        file.write("hello", false).unwrap();
        file.write("world", false).unwrap();
        drop(file);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[test]
    fn stamped_write_includes_timestamp_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = OutputFile::new(&path, Duration::from_secs(60));
        file.write("hello", true).unwrap();
        drop(file);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with('['));
        assert!(contents.trim_end().ends_with("]: hello"));
    }

    #[test]
    fn idle_closer_closes_handle_after_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = OutputFile::new(&path, Duration::from_millis(20));
        file.write("first", false).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(file.inner.lock().unwrap().handle.is_none());
        file.write("second", false).unwrap();
        drop(file);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }
}
