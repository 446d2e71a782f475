use crate::batch;
use async_trait::async_trait;
use burrow_core::repository::Result;
use burrow_core::{
    OwnerId, ReadRepository, Repository, SaveOutcome, ShortId, StorageError, UrlRecord,
};
use jiff::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

/// Flush strategy for journal appends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Hand the bytes to the OS and let it decide when to write them out.
    #[default]
    OsDefault,
}

/// Options for opening a [`FileRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct JournalOptions {
    /// Location of the journal file. Created, with its parent directories,
    /// if missing.
    #[builder(setter(into))]
    pub path: PathBuf,
    #[builder(default)]
    pub sync: SyncMode,
    /// Re-scan the journal file when `get` misses the in-memory map.
    #[builder(default = true)]
    pub scan_on_miss: bool,
}

/// One line of the journal.
///
/// `uuid` and `short_url` both hold the short ID; readers key on
/// `short_url`. Lines written before `created_at` existed read back with the
/// Unix epoch.
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    uuid: String,
    short_url: String,
    original_url: String,
    #[serde(default)]
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Timestamp>,
}

impl From<&UrlRecord> for JournalEntry {
    fn from(record: &UrlRecord) -> Self {
        Self {
            uuid: record.short_id.to_string(),
            short_url: record.short_id.to_string(),
            original_url: record.original_url.clone(),
            user_id: record.owner_id.to_string(),
            created_at: Some(record.created_at),
        }
    }
}

impl From<JournalEntry> for UrlRecord {
    fn from(entry: JournalEntry) -> Self {
        UrlRecord {
            short_id: ShortId::new(entry.short_url),
            original_url: entry.original_url,
            owner_id: OwnerId::new(entry.user_id),
            created_at: entry.created_at.unwrap_or(Timestamp::UNIX_EPOCH),
        }
    }
}

fn encode(records: &[UrlRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, &JournalEntry::from(record))
            .map_err(|e| StorageError::InvalidData(format!("cannot encode journal entry: {e}")))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Reads the journal front to back, handing every well-formed entry to
/// `visit` in write order. Malformed lines, including a torn final line left
/// by a crash, are logged and skipped. A missing file reads as empty.
fn scan(path: &Path, mut visit: impl FnMut(UrlRecord)) -> io::Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;

        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_slice::<JournalEntry>(trimmed) {
            Ok(entry) => visit(entry.into()),
            Err(err) => {
                warn!(path = %path.display(), line = line_no, error = %err, "skipping malformed journal entry");
            }
        }
    }

    Ok(())
}

/// Returns `true` when the file is non-empty and its last byte is not a
/// newline, i.e. the previous process died halfway through an append.
fn has_torn_tail(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[derive(Debug)]
struct JournalWriter {
    file: File,
    len: u64,
    sync: SyncMode,
}

impl JournalWriter {
    /// Appends `buf` in a single write. On failure the file is cut back to
    /// its previous length so that later appends start on a clean line.
    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        let written = self.file.write_all(buf).and_then(|()| match self.sync {
            SyncMode::EveryWrite => self.file.sync_data(),
            SyncMode::OsDefault => Ok(()),
        });

        if let Err(err) = written {
            if let Err(truncate_err) = self.file.set_len(self.len) {
                warn!(error = %truncate_err, "failed to roll back partial journal append");
            }
            return Err(err);
        }

        self.len += buf.len() as u64;
        Ok(())
    }
}

#[derive(Debug)]
struct State {
    records: HashMap<ShortId, UrlRecord>,
    by_url: HashMap<String, ShortId>,
    writer: JournalWriter,
}

impl State {
    fn apply(&mut self, record: UrlRecord) {
        index(&mut self.records, &mut self.by_url, record);
    }
}

/// Inserts `record`, replacing any earlier record with the same short ID.
/// The replaced record's URL leaves the URL index unless it has since been
/// claimed by another ID.
fn index(
    records: &mut HashMap<ShortId, UrlRecord>,
    by_url: &mut HashMap<String, ShortId>,
    record: UrlRecord,
) {
    if let Some(previous) = records.get(&record.short_id) {
        if previous.original_url != record.original_url
            && by_url.get(&previous.original_url) == Some(&record.short_id)
        {
            by_url.remove(&previous.original_url);
        }
    }
    by_url.insert(record.original_url.clone(), record.short_id.clone());
    records.insert(record.short_id.clone(), record);
}

/// Runs a journal scan on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StorageError::Unavailable(format!("journal scan task failed: {e}")))?
}

/// Record store backed by an append-only JSON Lines journal.
///
/// The journal is replayed into memory when the repository is opened and
/// every save appends to it before updating memory. One
/// [`parking_lot::RwLock`] guards the maps and the writer: saves hold it
/// exclusively for the whole append, reads share it, so a reader sees a
/// save either completely or not at all. Full journal scans run on tokio's
/// blocking pool and hold the read lock there.
///
/// The file must be owned by a single process. Nothing coordinates two
/// processes appending to the same journal.
#[derive(Debug)]
pub struct FileRepository {
    options: JournalOptions,
    state: Arc<RwLock<State>>,
}

impl FileRepository {
    /// Opens the journal at `options.path`, replaying it into memory.
    ///
    /// Replay keeps the last entry written for a short ID; it does not
    /// deduplicate. Malformed entries are skipped.
    pub fn open(options: JournalOptions) -> Result<Self> {
        let path = options.path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (records, by_url) = replay(path)?;

        if has_torn_tail(&mut file)? {
            warn!(path = %path.display(), "journal ends with a partial entry; isolating it");
            file.write_all(b"\n")?;
        }
        let len = file.metadata()?.len();

        info!(
            path = %path.display(),
            records = records.len(),
            bytes = len,
            "journal replayed"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(State {
                records,
                by_url,
                writer: JournalWriter {
                    file,
                    len,
                    sync: options.sync,
                },
            })),
            options,
        })
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.options.path
    }

    /// Number of records held in memory.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Maps = (HashMap<ShortId, UrlRecord>, HashMap<String, ShortId>);

fn replay(path: &Path) -> io::Result<Maps> {
    let mut records = HashMap::new();
    let mut by_url = HashMap::new();
    scan(path, |record| index(&mut records, &mut by_url, record))?;
    Ok((records, by_url))
}

#[async_trait]
impl ReadRepository for FileRepository {
    /// Looks the ID up in memory, then, if enabled, re-scans the whole
    /// journal. The fallback is O(file size).
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        if let Some(record) = self.state.read().records.get(id) {
            return Ok(Some(record.clone()));
        }
        if !self.options.scan_on_miss {
            return Ok(None);
        }

        trace!(short_id = %id, "memory miss, scanning journal");
        let state = Arc::clone(&self.state);
        let path = self.options.path.clone();
        let id = id.clone();
        run_blocking(move || {
            let state = state.read();
            if let Some(record) = state.records.get(&id) {
                return Ok(Some(record.clone()));
            }

            let mut found = None;
            scan(&path, |record| {
                if record.short_id == id {
                    found = Some(record);
                }
            })?;
            Ok(found)
        })
        .await
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<ShortId>> {
        Ok(self.state.read().by_url.get(original_url).cloned())
    }

    /// Merges the owner's records held in memory with a full journal scan.
    /// When both have an entry for the same short ID the in-memory one wins.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        let state = Arc::clone(&self.state);
        let path = self.options.path.clone();
        let wanted = owner.clone();

        let merged = run_blocking(move || {
            let state = state.read();

            let mut merged: BTreeMap<ShortId, UrlRecord> = BTreeMap::new();
            scan(&path, |record| {
                if record.owner_id == wanted {
                    merged.insert(record.short_id.clone(), record);
                }
            })?;
            for record in state.records.values().filter(|r| r.owner_id == wanted) {
                merged.insert(record.short_id.clone(), record.clone());
            }
            Ok(merged)
        })
        .await?;

        let mut records: Vec<UrlRecord> = merged.into_values().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.short_id.cmp(&b.short_id))
        });
        debug!(owner = %owner, count = records.len(), "listed owner records");
        Ok(records)
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        let mut state = self.state.write();

        if state.by_url.contains_key(&record.original_url) {
            return Err(StorageError::Conflict(record.original_url));
        }
        if state.records.contains_key(&record.short_id) {
            return Err(StorageError::DuplicateId(record.short_id.to_string()));
        }

        let line = encode(std::slice::from_ref(&record))?;
        state.writer.append(&line)?;
        trace!(short_id = %record.short_id, "appended journal entry");

        state.apply(record);
        Ok(())
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<SaveOutcome>> {
        let mut state = self.state.write();

        let plan = batch::plan(
            records,
            |url| state.by_url.get(url).cloned(),
            |id| state.records.contains_key(id),
        )?;

        if !plan.accepted.is_empty() {
            let lines = encode(&plan.accepted)?;
            state.writer.append(&lines)?;
            trace!(count = plan.accepted.len(), "appended journal batch");
        }

        for record in plan.accepted {
            state.apply(record);
        }
        Ok(plan.outcomes)
    }
}
