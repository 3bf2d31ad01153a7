//! WAL (Write-Ahead Log) file operations
//!
//! The WAL is the only durable record of HNSW graph topology. Every
//! structural mutation is appended as a [`WalRecord`] before it is applied in
//! memory, and the whole log is replayed on open.
//!
//! ## File Format
//!
//! A single append-only file containing a sequence of framed entries
//! (see [`crate::encoding`]). Records are numbered from 1 in append order;
//! the number is implicit in position and never stored.
//!
//! ## File Operations
//!
//! - `Wal::open()` - Open existing WAL or create new one, repairing a torn tail
//! - `Wal::append()` - Write encoded record to end of file
//! - `Wal::read_from()` - Iterate records starting at a sequence number
//! - `Wal::flush()` - Flush buffered writes
//! - `Wal::fsync()` - Force sync to disk
//! - `Wal::size()` - Get current file size
//!
//! ## Durability Modes
//!
//! - `Strict` - fsync after every record (slow, maximum durability)
//! - `Batched` - fsync every N records OR T ms (DEFAULT, good balance)
//! - `Async` - background thread fsyncs periodically (fast, may lose recent writes)

use crate::encoding::{decode_entry, encode_entry};
use crate::record::WalRecord;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vectory_core::error::{Error, Result};

// ============================================================================
// Durability Modes
// ============================================================================

/// Durability mode configuration
///
/// Controls when fsync is called to ensure data reaches disk.
///
/// # Default
///
/// The default mode is `Batched { interval_ms: 100, batch_size: 1000 }`,
/// which fsyncs every 100ms or every 1000 records, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync after every record (slow, maximum durability)
    Strict,

    /// fsync every N records OR every T milliseconds
    ///
    /// May lose up to batch_size records or interval_ms of data on crash.
    Batched {
        /// Maximum time between fsyncs in milliseconds
        interval_ms: u64,
        /// Maximum records between fsyncs
        batch_size: usize,
    },

    /// Background thread fsyncs periodically
    ///
    /// May lose up to interval_ms of records on crash.
    Async {
        /// Time between fsyncs in milliseconds
        interval_ms: u64,
    },
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

// ============================================================================
// WAL File Operations
// ============================================================================

/// Write-Ahead Log with configurable durability
///
/// # Example
///
/// ```ignore
/// use vectory_durability::{DurabilityMode, Wal, WalRecord};
///
/// let mut wal = Wal::open("data/index.wal", DurabilityMode::default())?;
/// wal.append(&WalRecord::DeleteVertex { id: 7 })?;
///
/// for item in wal.read_from(1)? {
///     let (seq, record) = item?;
/// }
/// ```
pub struct Wal {
    /// File path
    path: PathBuf,

    /// Buffered writer, shared with the async fsync thread
    writer: Arc<Mutex<BufWriter<File>>>,

    /// Offset of the next write
    current_offset: u64,

    /// Sequence number the next appended record receives
    next_seq: u64,

    /// Durability mode
    durability_mode: DurabilityMode,

    /// Last fsync time (for batched mode)
    last_fsync: Instant,

    /// Records since last fsync (for batched mode)
    writes_since_fsync: usize,

    /// Background fsync thread handle (for async mode)
    fsync_thread: Option<JoinHandle<()>>,

    /// Shutdown flag for async thread
    shutdown: Arc<AtomicBool>,

    /// Set when a failed append could not be rolled back
    poisoned: bool,

    #[cfg(any(test, feature = "fault-injection"))]
    fail_next_sync: bool,
}

impl Wal {
    /// Open existing WAL or create new one with specified durability mode
    ///
    /// Creates parent directories if they don't exist. The existing log is
    /// scanned to find the next sequence number. A torn final record is
    /// cut off so that later appends remain readable.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, and on corruption that is not a torn tail
    /// (mid-file checksum failure, unknown opcode, malformed payload).
    pub fn open<P: AsRef<Path>>(path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let existing = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut scan = WalIter::new(existing, 1);
        let mut records = 0u64;
        for item in scan.by_ref() {
            item?;
            records += 1;
        }
        let valid_end = scan.valid_end();
        let file_len = scan.buf.len() as u64;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        if valid_end < file_len {
            warn!(
                path = %path.display(),
                valid_end,
                file_len,
                "Truncating torn WAL tail"
            );
            file.set_len(valid_end)?;
            file.sync_all()?;
        }

        debug!(
            path = %path.display(),
            size = valid_end,
            next_seq = records + 1,
            "Opened WAL"
        );

        let writer = Arc::new(Mutex::new(BufWriter::new(file)));
        let shutdown = Arc::new(AtomicBool::new(false));

        // Spawn background fsync thread for async mode
        let fsync_thread = if let DurabilityMode::Async { interval_ms } = durability_mode {
            let writer = Arc::clone(&writer);
            let shutdown = Arc::clone(&shutdown);
            let interval = Duration::from_millis(interval_ms);

            Some(thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(interval);

                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }

                    let mut w = writer.lock();
                    if let Err(e) = w.flush().and_then(|_| w.get_ref().sync_all()) {
                        warn!(error = %e, "Background WAL fsync failed");
                    }
                }
            }))
        } else {
            None
        };

        Ok(Self {
            path,
            writer,
            current_offset: valid_end,
            next_seq: records + 1,
            durability_mode,
            last_fsync: Instant::now(),
            writes_since_fsync: 0,
            fsync_thread,
            shutdown,
            poisoned: false,
            #[cfg(any(test, feature = "fault-injection"))]
            fail_next_sync: false,
        })
    }

    /// Append a record with durability mode handling
    ///
    /// - Strict: fsync after every write
    /// - Batched: fsync after batch_size writes OR interval_ms elapsed
    /// - Async: just flush, background thread handles fsync
    ///
    /// Returns the sequence number assigned to the record.
    ///
    /// # Errors
    ///
    /// On failure the record is not in the log: buffered bytes are dropped and
    /// the file is cut back to [`Wal::size`], so a retry appends it exactly
    /// once. If that cut itself fails the WAL refuses further appends until
    /// it is reopened.
    pub fn append(&mut self, record: &WalRecord) -> Result<u64> {
        if self.poisoned {
            return Err(Error::Io(io::Error::new(
                ErrorKind::Other,
                "WAL rollback failed; reopen to repair the log",
            )));
        }

        let encoded = encode_entry(record)?;

        // Earlier records must reach the file first so that a failure below
        // only ever leaves bytes of this record behind
        self.writer.lock().flush()?;

        if let Err(e) = self.write_frame(&encoded) {
            self.rollback();
            return Err(e);
        }

        self.current_offset += encoded.len() as u64;
        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(seq)
    }

    fn write_frame(&mut self, encoded: &[u8]) -> Result<()> {
        self.writer.lock().write_all(encoded)?;
        self.check_injected_failure()?;

        match self.durability_mode {
            DurabilityMode::Strict => self.fsync(),
            DurabilityMode::Batched {
                interval_ms,
                batch_size,
            } => {
                let elapsed = self.last_fsync.elapsed().as_millis() as u64;
                if elapsed >= interval_ms || self.writes_since_fsync + 1 >= batch_size {
                    self.fsync()
                } else {
                    self.writes_since_fsync += 1;
                    Ok(())
                }
            }
            DurabilityMode::Async { .. } => {
                // Background thread handles fsync
                self.writer.lock().flush()?;
                Ok(())
            }
        }
    }

    /// Drop whatever part of a failed record was buffered or written
    fn rollback(&mut self) {
        let result = {
            let mut writer = self.writer.lock();
            writer.get_ref().try_clone().and_then(|file| {
                // `into_parts` hands back the file without flushing the buffer
                let (file, _) = std::mem::replace(&mut *writer, BufWriter::new(file)).into_parts();
                file.set_len(self.current_offset)?;
                file.sync_all()
            })
        };

        if let Err(e) = result {
            warn!(
                path = %self.path.display(),
                size = self.current_offset,
                error = %e,
                "WAL rollback failed; refusing further appends"
            );
            self.poisoned = true;
        }
    }

    /// Make the next append fail after its bytes reach the file but before
    /// they are synced
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }

    #[cfg(any(test, feature = "fault-injection"))]
    fn check_injected_failure(&mut self) -> Result<()> {
        if !std::mem::take(&mut self.fail_next_sync) {
            return Ok(());
        }
        self.writer.lock().flush()?;
        Err(Error::Io(io::Error::new(
            ErrorKind::Other,
            "injected WAL sync failure",
        )))
    }

    #[cfg(not(any(test, feature = "fault-injection")))]
    fn check_injected_failure(&mut self) -> Result<()> {
        Ok(())
    }

    /// Flush buffered writes to OS buffers
    ///
    /// Note: This flushes to OS buffers, not necessarily to disk.
    /// For true durability, use fsync().
    pub fn flush(&mut self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    /// Force sync to disk (flush + fsync)
    pub fn fsync(&mut self) -> Result<()> {
        {
            let mut writer = self.writer.lock();
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        self.writes_since_fsync = 0;
        self.last_fsync = Instant::now();
        Ok(())
    }

    /// Iterate records with sequence number `>= start_seq`
    ///
    /// Buffered writes are flushed first so the iterator sees every appended
    /// record. The iterator ends (`None`) at end of log, including at a torn
    /// final record; it yields `Some(Err(..))` for corruption.
    pub fn read_from(&mut self, start_seq: u64) -> Result<WalIter> {
        self.flush()?;
        let buf = std::fs::read(&self.path)?;
        Ok(WalIter::new(buf, start_seq))
    }

    /// Sequence number the next appended record will receive
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Get current file size (offset for next write)
    pub fn size(&self) -> u64 {
        self.current_offset
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(handle) = self.fsync_thread.take() {
            let _ = handle.join();
        }

        // Final fsync to ensure all data is durable
        if self.poisoned {
            return;
        }
        if let Err(e) = self.fsync() {
            warn!(path = %self.path.display(), error = %e, "Final WAL fsync failed");
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Sequential reader over a WAL image
///
/// Yields `(sequence number, record)` pairs in append order.
pub struct WalIter {
    buf: Vec<u8>,
    pos: usize,
    seq: u64,
    start_seq: u64,
    done: bool,
}

impl WalIter {
    fn new(buf: Vec<u8>, start_seq: u64) -> Self {
        WalIter {
            buf,
            pos: 0,
            seq: 1,
            start_seq,
            done: false,
        }
    }

    /// Byte offset just past the last complete record read so far
    pub fn valid_end(&self) -> u64 {
        self.pos as u64
    }

    /// True if a failed decode at `pos` is a torn final write rather than corruption
    fn is_torn_tail(&self, err: &Error) -> bool {
        if err.is_incomplete() {
            return true;
        }
        match err {
            // A bad checksum is only a torn write when nothing follows the entry
            Error::ChecksumMismatch { .. } => {
                let rest = &self.buf[self.pos..];
                let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                rest.len() == 4 + len
            }
            _ => false,
        }
    }
}

impl Iterator for WalIter {
    type Item = Result<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.pos < self.buf.len() {
            match decode_entry(&self.buf[self.pos..], self.pos as u64) {
                Ok((record, consumed)) => {
                    self.pos += consumed;
                    let seq = self.seq;
                    self.seq += 1;
                    if seq >= self.start_seq {
                        return Some(Ok((seq, record)));
                    }
                }
                Err(e) => {
                    self.done = true;
                    if self.is_torn_tail(&e) {
                        return None;
                    }
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
