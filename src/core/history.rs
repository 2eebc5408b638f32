use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::artifact::write_atomic;
use crate::error::{Error, Result};
use crate::models::RunRecord;

/// Append-only run history, one JSON record per line.
///
/// Appends go to the end of the file and are serialized through an async
/// mutex, so concurrent callers in one process never lose records. A record
/// missing its terminating newline is kept when it still parses, and gets its
/// newline on the next append; an unterminated tail that does not parse is a
/// torn write, skipped on read and cut off on the next append.
///
/// Logs written as a single JSON array by earlier deployments are still
/// readable and are rewritten into the line format on their first append.
/// Several processes sharing one log file are not supported.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    /// Record count, known after the first append.
    write_lock: Mutex<Option<usize>>,
}

/// On-disk layout found by inspecting the first and last bytes of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Missing,
    Lines { torn_tail: bool },
    LegacyArray,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in append order. A missing log is an empty history.
    pub async fn read_all(&self) -> Result<Vec<RunRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => parse_log(&self.path, &bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::persistence(&self.path, e)),
        }
    }

    /// Append one record and return the new log length.
    pub async fn append(&self, record: RunRecord) -> Result<usize> {
        let mut known = self.write_lock.lock().await;

        let mut line =
            serde_json::to_vec(&record).map_err(|e| Error::persistence(&self.path, e))?;
        line.push(b'\n');

        let path = self.path.clone();
        let cached = *known;
        let len =
            tokio::task::spawn_blocking(move || append_line(&path, &line, cached)).await??;
        *known = Some(len);

        debug!(path = ?self.path, records = len, "history log appended");
        Ok(len)
    }
}

/// Parsed log content plus whether an unparseable unterminated tail was dropped.
struct Parsed {
    records: Vec<RunRecord>,
    torn: bool,
}

fn parse_log(path: &Path, bytes: &[u8]) -> Result<Vec<RunRecord>> {
    parse_lines(path, bytes).map(|parsed| parsed.records)
}

fn parse_lines(path: &Path, bytes: &[u8]) -> Result<Parsed> {
    let corrupt = |e: serde_json::Error| Error::persistence(path, format!("corrupt log: {}", e));

    if first_non_blank(bytes) == Some(b'[') {
        let records = serde_json::from_slice(bytes).map_err(corrupt)?;
        return Ok(Parsed {
            records,
            torn: false,
        });
    }

    let mut records = Vec::new();
    let mut torn = false;
    let mut rest = bytes;
    while !rest.is_empty() {
        let (line, terminated) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let line = &rest[..end];
                rest = &rest[end + 1..];
                (line, true)
            }
            None => (std::mem::take(&mut rest), false),
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(record) => records.push(record),
            Err(e) if terminated => return Err(corrupt(e)),
            Err(_) => {
                warn!(?path, bytes = line.len(), "ignoring torn last history line");
                torn = true;
            }
        }
    }
    Ok(Parsed { records, torn })
}

fn first_non_blank(bytes: &[u8]) -> Option<u8> {
    bytes.iter().copied().find(|b| !b.is_ascii_whitespace())
}

fn inspect(file: &mut File) -> std::io::Result<Layout> {
    let size = file.metadata()?.len();
    if size == 0 {
        return Ok(Layout::Lines { torn_tail: false });
    }

    let mut head = [0u8; 64];
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(&mut head)?;
    if first_non_blank(&head[..n]) == Some(b'[') {
        return Ok(Layout::LegacyArray);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(Layout::Lines {
        torn_tail: last[0] != b'\n',
    })
}

/// Blocking part of an append; the caller holds the store's write lock.
///
/// `known` is the record count from the previous append, if any.
fn append_line(path: &Path, line: &[u8], known: Option<usize>) -> Result<usize> {
    let fail = |e: std::io::Error| Error::persistence(path, e);

    let layout = match File::open(path) {
        Ok(mut file) => inspect(&mut file).map_err(fail)?,
        Err(e) if e.kind() == ErrorKind::NotFound => Layout::Missing,
        Err(e) => return Err(fail(e)),
    };

    match layout {
        Layout::Missing => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(fail)?;
            }
            append_bytes(path, line).map_err(fail)?;
            Ok(1)
        }
        Layout::Lines { torn_tail: false } => {
            let before = match known {
                Some(n) => n,
                None => parse_log(path, &std::fs::read(path).map_err(fail)?)?.len(),
            };
            append_bytes(path, line).map_err(fail)?;
            Ok(before + 1)
        }
        // Rare paths: rebuild the whole log once, atomically.
        Layout::LegacyArray | Layout::Lines { torn_tail: true } => {
            let bytes = std::fs::read(path).map_err(fail)?;
            let parsed = parse_lines(path, &bytes)?;
            match layout {
                Layout::LegacyArray => {
                    info!(?path, records = parsed.records.len(), "converting array history log to lines")
                }
                _ if parsed.torn => warn!(?path, "dropping torn history line before append"),
                _ => debug!(?path, "terminating last history line before append"),
            }
            let mut out = Vec::with_capacity(bytes.len() + line.len() + 1);
            for record in &parsed.records {
                serde_json::to_writer(&mut out, record).map_err(|e| Error::persistence(path, e))?;
                out.push(b'\n');
            }
            out.extend_from_slice(line);
            write_atomic(path, &out).map_err(fail)?;
            Ok(parsed.records.len() + 1)
        }
    }
}

fn append_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_data()
}
