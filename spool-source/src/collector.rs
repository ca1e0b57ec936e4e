use crate::string_blocks::{clean_printable, DelimitedBlocks};
use crate::SpoolLog;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Lines surfaced per refill attempt before the collector yields control
/// back to the caller.
const MAX_BLOCK_SIZE: usize = 1024;

/// Assumed upper bound on a single spool line's length, used only to size
/// the per-refill byte budget below.
const MAX_FILE_LINE_LENGTH: usize = 4096;

/// Bytes read from disk per refill attempt, across all files it touches.
const MAX_READ_CHUNK: usize = MAX_FILE_LINE_LENGTH * MAX_BLOCK_SIZE;

struct PendingFile {
    path: PathBuf,
    size: u64,
    offset: u64,
}

/// Presents a spool directory as a lazy sequence of sanitised lines.
/// Construction enumerates the directory once; each file is streamed in
/// bounded chunks and unlinked only once it has been read to completion.
/// Files that cannot be read to completion (I/O error, or content with no
/// terminating newline within a chunk) are dropped from consideration for
/// this collector's lifetime but left untouched on disk — a fresh
/// `SpoolCollector` built on the next ingest iteration will reconsider them.
pub struct SpoolCollector<'log, L: SpoolLog> {
    log: &'log L,
    pending: VecDeque<PendingFile>,
    completed: VecDeque<PathBuf>,
    unprocessed: VecDeque<String>,
}

impl<'log, L: SpoolLog> SpoolCollector<'log, L> {
    pub fn new(spool_directory: &Path, log: &'log L) -> Self {
        let mut pending = VecDeque::new();
        let mut completed = VecDeque::new();

        match fs::read_dir(spool_directory) {
            Ok(entries) => {
                for entry in entries {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            log.error_annotated(
                                "Locating spool directory",
                                &spool_directory.display().to_string(),
                                &err.to_string(),
                            );
                            continue;
                        }
                    };
                    classify_entry(&entry, &mut pending, &mut completed, log);
                }
            }
            Err(err) => {
                log.error_annotated(
                    "Locating spool directory",
                    &spool_directory.display().to_string(),
                    &err.to_string(),
                );
            }
        }

        SpoolCollector {
            log,
            pending,
            completed,
            unprocessed: VecDeque::new(),
        }
    }

    /// True while any unprocessed line remains or any pending file remains.
    pub fn has_more(&self) -> bool {
        !self.pending.is_empty() || !self.unprocessed.is_empty()
    }

    /// Returns the next sanitised line, or the empty string when none
    /// remain. Refills from disk first if the unprocessed queue is empty.
    pub fn next_line(&mut self) -> String {
        if self.unprocessed.is_empty() {
            self.log.debug("Getting next data block from disk");
            self.refill();
        }
        match self.unprocessed.pop_front() {
            Some(line) => line,
            None => {
                self.log.debug("No more lines to process");
                String::new()
            }
        }
    }

    fn refill(&mut self) {
        let mut buffer = vec![0u8; MAX_FILE_LINE_LENGTH];
        let mut bytes_so_far = 0usize;

        while !self.pending.is_empty()
            && self.unprocessed.len() < MAX_BLOCK_SIZE
            && bytes_so_far < MAX_READ_CHUNK
        {
            let (file_name, offset, want) = {
                let head = self.pending.front().expect("checked non-empty above");
                let remaining_in_file = head.size - head.offset;
                let remaining_in_chunk = (MAX_READ_CHUNK - bytes_so_far) as u64;
                let want = remaining_in_file.min(remaining_in_chunk) as usize;
                (head.path.display().to_string(), head.offset, want)
            };

            if want == 0 {
                self.complete_head();
                continue;
            }
            if buffer.len() < want {
                buffer.resize(want, 0);
            }

            let path = self.pending.front().unwrap().path.clone();
            let mut file = match File::open(&path) {
                Ok(file) => file,
                Err(err) => {
                    self.log.error_annotated("Open file", &file_name, &err.to_string());
                    self.pending.pop_front();
                    continue;
                }
            };
            if let Err(err) = file.seek(SeekFrom::Start(offset)) {
                self.log.error_annotated("Seek file", &file_name, &err.to_string());
                self.pending.pop_front();
                continue;
            }
            let read_result = file.read(&mut buffer[..want]);
            bytes_so_far += want;

            match read_result {
                Ok(0) => {
                    // EOF at the expected offset: nothing left to read.
                    self.complete_head();
                }
                Ok(read) => {
                    if !self.ingest_chunk(&file_name, &buffer[..read]) {
                        break;
                    }
                }
                Err(err) => {
                    self.log.error_annotated("Read file", &file_name, &err.to_string());
                    self.pending.pop_front();
                }
            }
        }
    }

    /// Processes one read chunk for the current pending-queue head. Returns
    /// `false` if the caller should stop refilling this round (the chunk
    /// was unusable and the file was dropped from pending).
    fn ingest_chunk(&mut self, file_name: &str, chunk: &[u8]) -> bool {
        let last_newline = chunk.iter().rposition(|&b| b == b'\n');
        let usable_len = match last_newline {
            Some(idx) => idx + 1,
            None => {
                self.log.warn_annotated("Indecipherable content", file_name);
                self.pending.pop_front();
                return false;
            }
        };

        let text = clean_printable(&chunk[..usable_len]);
        for block in DelimitedBlocks::new(&text, b'\n') {
            if block.is_empty() {
                continue;
            }
            self.log.debug_annotated("Extracted cleaned line", block);
            self.unprocessed.push_back(block.to_string());
        }

        let head = self.pending.front_mut().expect("head present while ingesting its chunk");
        head.offset += usable_len as u64;
        if head.offset >= head.size {
            self.complete_head();
        }
        true
    }

    fn complete_head(&mut self) {
        if let Some(done) = self.pending.pop_front() {
            self.completed.push_back(done.path);
        }
    }
}

fn classify_entry<L: SpoolLog>(
    entry: &fs::DirEntry,
    pending: &mut VecDeque<PendingFile>,
    completed: &mut VecDeque<PathBuf>,
    log: &L,
) {
    let path = entry.path();
    let metadata = match entry.metadata() {
        Ok(metadata) => metadata,
        Err(err) => {
            log.error_annotated("Locating spool directory", &path.display().to_string(), &err.to_string());
            return;
        }
    };
    if !metadata.is_file() {
        return;
    }
    if metadata.len() == 0 {
        log.debug_annotated("Skipped empty file", &path.display().to_string());
        completed.push_back(path);
    } else {
        log.debug_annotated("Added file for perfdata processing", &path.display().to_string());
        pending.push_back(PendingFile {
            path,
            size: metadata.len(),
            offset: 0,
        });
    }
}

impl<'log, L: SpoolLog> Drop for SpoolCollector<'log, L> {
    fn drop(&mut self) {
        while let Some(path) = self.completed.pop_front() {
            if let Err(err) = fs::remove_file(&path) {
                self.log
                    .error_annotated("Delete file", &path.display().to_string(), &err.to_string());
            }
        }
    }
}
