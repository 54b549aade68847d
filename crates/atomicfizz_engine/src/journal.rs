//! # Player Journal
//!
//! **Crash-Safe Player Persistence**
//!
//! Every committed player state is appended to a journal file before the
//! store publishes it. On restart the journal is replayed and the newest
//! snapshot per wallet wins.
//!
//! ## Guarantees
//!
//! 1. **Durability**: once `persist()` returns, the record is synced to disk
//! 2. **Integrity**: each record carries a CRC32; a torn or corrupt tail is
//!    truncated during recovery instead of poisoning the whole file
//! 3. **Clean boundaries**: a record that fails to append is cut back off
//!    before the error is returned, so a rejected snapshot never reaches a
//!    later replay. If the cut itself fails the journal refuses further
//!    appends until it is reopened
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "AFJL"]
//! [4 bytes: version]
//!
//! Record format:
//! [4 bytes: payload length]
//! [N bytes: payload (JSON player snapshot)]
//! [4 bytes: CRC32 of payload]
//! ```
//!
//! ## Compaction
//!
//! `compact()` writes the newest snapshot per wallet to a sibling file and
//! renames it over the journal. A crash before the rename leaves the old
//! journal untouched.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use atomicfizz_shared::Player;
use parking_lot::{Mutex, RwLock};

use crate::error::{EngineError, EngineResult};
use crate::store::PlayerRepository;

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"AFJL";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

/// Bytes before the first record.
const HEADER_LEN: u64 = 8;

/// Upper bound on a single record; anything larger is treated as corruption.
const MAX_RECORD_LEN: u32 = 16 * 1024 * 1024;

fn storage(context: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Storage(format!("{context}: {e}"))
}

fn header() -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(JOURNAL_MAGIC);
    bytes[4..].copy_from_slice(&JOURNAL_VERSION.to_le_bytes());
    bytes
}

/// Frames one player snapshot as a complete record.
fn encode_record(player: &Player) -> EngineResult<Vec<u8>> {
    let payload = serde_json::to_vec(player).map_err(|e| storage("failed to encode player", e))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_RECORD_LEN)
        .ok_or_else(|| EngineError::Storage(format!("player record too large: {} bytes", payload.len())))?;

    let mut record = Vec::with_capacity(payload.len() + 8);
    record.extend_from_slice(&len.to_le_bytes());
    record.extend_from_slice(&payload);
    record.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(record)
}

/// Where journal bytes land.
trait RecordSink {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
    /// Drops everything past `len` and continues writing there.
    fn cut(&mut self, len: u64) -> io::Result<()>;
}

impl RecordSink for File {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn cut(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len)).map(|_| ())
    }
}

/// Write side of the journal.
struct Appender<S> {
    sink: S,
    /// Offset just past the last complete record.
    end: u64,
    /// Cleared when a failed append could not be cut back off.
    healthy: bool,
}

impl<S: RecordSink> Appender<S> {
    const fn new(sink: S, end: u64) -> Self {
        Self {
            sink,
            end,
            healthy: true,
        }
    }

    fn append(&mut self, record: &[u8]) -> EngineResult<()> {
        if !self.healthy {
            return Err(EngineError::Storage(
                "journal holds an unremoved partial record; reopen it to recover".into(),
            ));
        }
        match self.sink.append(record).and_then(|()| self.sink.sync()) {
            Ok(()) => {
                self.end += record.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(cut) = self.sink.cut(self.end) {
                    tracing::error!("Journal could not drop a partial record at offset {}: {cut}", self.end);
                    self.healthy = false;
                }
                Err(storage("failed to append journal record", e))
            }
        }
    }
}

/// Append-only, CRC-checked journal of player snapshots.
pub struct JournalRepository {
    /// Path to the journal file.
    path: PathBuf,
    /// Write side. Held across the matching `latest` update so compaction
    /// always sees every appended record.
    appender: Mutex<Appender<File>>,
    /// Newest snapshot per wallet.
    latest: RwLock<HashMap<String, Player>>,
    /// Valid records in the file.
    records: AtomicU64,
}

impl JournalRepository {
    /// Opens or creates a journal, replaying any existing records.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file cannot be opened or is not a journal.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| storage("failed to open journal", e))?;

        let len = file.metadata().map_err(|e| storage("failed to stat journal", e))?.len();

        if len == 0 {
            file.write_all(&header()).map_err(|e| storage("failed to write header", e))?;
            file.sync_all().map_err(|e| storage("failed to sync header", e))?;
        }

        let (latest, records, valid_end) = Self::recover(&mut file)?;

        if valid_end < file.metadata().map_err(|e| storage("failed to stat journal", e))?.len() {
            tracing::warn!(
                "Journal {} has a torn tail; truncating to {} bytes after {} records",
                path.display(),
                valid_end,
                records
            );
        }
        file.cut(valid_end).map_err(|e| storage("failed to truncate journal", e))?;

        tracing::info!(
            "Journal {} recovered: {} records, {} wallets",
            path.display(),
            records,
            latest.len()
        );

        Ok(Self {
            path,
            appender: Mutex::new(Appender::new(file, valid_end)),
            latest: RwLock::new(latest),
            records: AtomicU64::new(records),
        })
    }

    /// Replays the file. Returns the newest snapshot per wallet, the number of
    /// valid records, and the offset just past the last valid record.
    fn recover(file: &mut File) -> EngineResult<(HashMap<String, Player>, u64, u64)> {
        file.seek(SeekFrom::Start(0)).map_err(|e| storage("failed to seek journal", e))?;
        let mut reader = BufReader::new(&*file);

        let mut header = [0u8; 8];
        reader
            .read_exact(&mut header)
            .map_err(|e| storage("failed to read journal header", e))?;
        if &header[0..4] != JOURNAL_MAGIC {
            return Err(EngineError::Storage("not a player journal (bad magic)".into()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != JOURNAL_VERSION {
            return Err(EngineError::Storage(format!("unsupported journal version {version}")));
        }

        let mut latest = HashMap::new();
        let mut records = 0u64;
        let mut offset = HEADER_LEN;

        loop {
            let mut len_bytes = [0u8; 4];
            if reader.read_exact(&mut len_bytes).is_err() {
                break;
            }
            let len = u32::from_le_bytes(len_bytes);
            if len > MAX_RECORD_LEN {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            let mut crc_bytes = [0u8; 4];
            if reader.read_exact(&mut payload).is_err() || reader.read_exact(&mut crc_bytes).is_err() {
                break;
            }
            if crc32fast::hash(&payload) != u32::from_le_bytes(crc_bytes) {
                break;
            }
            let Ok(player) = serde_json::from_slice::<Player>(&payload) else {
                break;
            };

            latest.insert(player.wallet.clone(), player);
            records += 1;
            offset += 4 + u64::from(len) + 4;
        }

        Ok((latest, records, offset))
    }

    /// Path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of valid records in the journal.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.records.load(Ordering::Acquire)
    }

    /// Number of distinct wallets recorded.
    #[must_use]
    pub fn wallet_count(&self) -> usize {
        self.latest.read().len()
    }

    /// Rewrites the journal keeping only the newest snapshot per wallet.
    ///
    /// Returns the number of records dropped.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the compacted copy cannot be written or swapped
    /// in. A failure before the rename leaves the journal as it was.
    pub fn compact(&self) -> EngineResult<u64> {
        let mut appender = self.appender.lock();
        let latest = self.latest.read();

        let mut players: Vec<&Player> = latest.values().collect();
        players.sort_by(|a, b| a.wallet.cmp(&b.wallet));

        let mut bytes = header().to_vec();
        for player in &players {
            bytes.extend_from_slice(&encode_record(player)?);
        }

        let staging = self.path.with_extension("afjl.compact");
        {
            let mut out = File::create(&staging).map_err(|e| storage("failed to create compacted journal", e))?;
            out.write_all(&bytes)
                .and_then(|()| out.sync_all())
                .map_err(|e| storage("failed to write compacted journal", e))?;
        }
        std::fs::rename(&staging, &self.path).map_err(|e| storage("failed to swap in compacted journal", e))?;

        let end = bytes.len() as u64;
        let reopened = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .and_then(|mut file| file.seek(SeekFrom::Start(end)).map(|_| file));
        match reopened {
            Ok(file) => *appender = Appender::new(file, end),
            Err(e) => {
                // The old handle now points at an unlinked file.
                appender.healthy = false;
                return Err(storage("failed to reopen compacted journal", e));
            }
        }

        let kept = players.len() as u64;
        let before = self.records.swap(kept, Ordering::AcqRel);
        let dropped = before.saturating_sub(kept);
        tracing::info!(
            "Journal {} compacted: {} records dropped, {} kept",
            self.path.display(),
            dropped,
            kept
        );
        Ok(dropped)
    }
}

impl PlayerRepository for JournalRepository {
    fn load(&self, wallet: &str) -> Option<Player> {
        self.latest.read().get(wallet).cloned()
    }

    fn persist(&self, player: &Player) -> EngineResult<()> {
        let record = encode_record(player)?;

        let mut appender = self.appender.lock();
        appender.append(&record)?;
        self.latest.write().insert(player.wallet.clone(), player.clone());
        self.records.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn players(&self) -> Vec<Player> {
        self.latest.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for JournalRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalRepository")
            .field("path", &self.path)
            .field("records", &self.record_count())
            .finish_non_exhaustive()
    }
}
