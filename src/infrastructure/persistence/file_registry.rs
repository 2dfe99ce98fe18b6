//! Append-only file registry implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::dedup_index::DedupIndex;
use super::log_record::LogRecord;
use crate::domain::entities::{RegistryCounts, ShortenedUrl};
use crate::domain::repositories::UrlRegistry;
use crate::error::RegistryError;

/// Registry that mirrors the memory registry and appends every change to a
/// JSON-lines log.
///
/// The log is replayed in full by [`FileRegistry::open`] before the registry is
/// handed out, so no request is ever served from a partially rebuilt index.
/// Each store appends its record before the entry becomes visible.
pub struct FileRegistry {
    path: PathBuf,
    state: RwLock<FileState>,
}

struct FileState {
    index: DedupIndex,
    /// `None` once the registry is closed.
    file: Option<File>,
    sequence: u64,
}

impl FileState {
    /// Appends `records` as one write.
    ///
    /// On a failed write the file is truncated back to its previous length so a
    /// torn line never precedes the next record. If that truncation fails too,
    /// the log is detached and every later write fails with `Closed`.
    async fn append(&mut self, records: &[LogRecord]) -> Result<(), RegistryError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&record.to_line().map_err(std::io::Error::other)?);
        }

        let file = self.file.as_mut().ok_or(RegistryError::Closed)?;
        let committed = file.metadata().await?.len();

        let written = match file.write_all(buf.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(committed, "Storage log write failed, rolling back: {}", e);
            if let Err(rollback) = file.set_len(committed).await {
                error!("Failed to roll back storage log, refusing further writes: {}", rollback);
                self.file = None;
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn append_entry(&mut self, url: ShortenedUrl) -> Result<(), RegistryError> {
        let sequence = self.sequence + 1;
        self.append(&[LogRecord::new(sequence, &url)]).await?;
        self.sequence = sequence;
        self.index.insert(url);
        Ok(())
    }
}

impl FileRegistry {
    /// Opens the log at `path`, creating it if absent, and replays it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CorruptLog`] if a line cannot be decoded, or an
    /// I/O error if the file cannot be read or opened for appending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let replayed = replay(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        match replayed.tail {
            Tail::Clean => {}
            Tail::Unterminated => {
                file.write_all(b"\n").await?;
                file.flush().await?;
            }
            Tail::Torn { committed } => {
                file.set_len(committed).await?;
            }
        }

        info!(
            path = %path.display(),
            entries = replayed.index.len(),
            sequence = replayed.sequence,
            "Storage log replayed"
        );

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                index: replayed.index,
                file: Some(file),
                sequence: replayed.sequence,
            }),
        })
    }
}

/// State of the last line of the log after replay.
#[derive(Debug, PartialEq, Eq)]
enum Tail {
    Clean,
    /// The last record is valid but lacks its newline.
    Unterminated,
    /// The last line is an incomplete record; only the first `committed` bytes are kept.
    Torn { committed: u64 },
}

struct Replayed {
    index: DedupIndex,
    sequence: u64,
    tail: Tail,
}

/// Rebuilds the index from every line of the log, in order.
///
/// A malformed line is fatal unless it is the last one and has no newline,
/// which is what an interrupted append leaves behind.
async fn replay(path: &Path) -> Result<Replayed, RegistryError> {
    let mut replayed = Replayed {
        index: DedupIndex::new(),
        sequence: 0,
        tail: Tail::Clean,
    };

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(replayed),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut committed = 0u64;
    let mut line_no = 0usize;
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line).await?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let terminated = line.ends_with(b"\n");

        if line.iter().all(u8::is_ascii_whitespace) {
            committed += read as u64;
            continue;
        }

        let record = match LogRecord::from_line(&line) {
            Ok(record) => record,
            Err(source) if !terminated => {
                warn!(
                    path = %path.display(),
                    line = line_no,
                    "Discarding incomplete last record: {}",
                    source
                );
                replayed.tail = Tail::Torn { committed };
                break;
            }
            Err(source) => {
                return Err(RegistryError::CorruptLog {
                    line: line_no,
                    source,
                });
            }
        };

        committed += read as u64;
        if !terminated {
            replayed.tail = Tail::Unterminated;
        }
        replayed.sequence = replayed
            .sequence
            .max(record.sequence().unwrap_or(line_no as u64));
        replayed.index.upsert(record.into());
    }

    Ok(replayed)
}

#[async_trait]
impl UrlRegistry for FileRegistry {
    async fn store(&self, url: ShortenedUrl) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        state.index.check(&url)?;
        state.append_entry(url).await
    }

    async fn store_batch(&self, urls: Vec<ShortenedUrl>) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        for url in urls {
            if let Err(e) = state.index.check(&url) {
                debug!(alias = %url.alias, "Skipping batch entry: {}", e);
                continue;
            }
            state.append_entry(url).await?;
        }
        Ok(())
    }

    async fn get_by_alias(&self, alias: &str) -> Result<ShortenedUrl, RegistryError> {
        self.state
            .read()
            .await
            .index
            .get_by_alias(alias)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(alias))
    }

    async fn get_by_original_url(
        &self,
        original_url: &str,
    ) -> Result<ShortenedUrl, RegistryError> {
        self.state
            .read()
            .await
            .index
            .get_by_original_url(original_url)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(original_url))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortenedUrl>, RegistryError> {
        Ok(self.state.read().await.index.list_by_owner(owner_id))
    }

    async fn delete_batch(
        &self,
        owner_id: &str,
        aliases: &[String],
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;

        let mut tombstones = state.index.deletable(owner_id, aliases);
        if tombstones.is_empty() {
            return Ok(());
        }

        let first = state.sequence + 1;
        let records: Vec<LogRecord> = tombstones
            .iter_mut()
            .zip(first..)
            .map(|(entry, sequence)| {
                entry.deleted = true;
                LogRecord::new(sequence, entry)
            })
            .collect();

        state.append(&records).await?;
        state.sequence += records.len() as u64;
        for entry in &tombstones {
            state.index.mark_deleted(&entry.alias);
        }

        debug!(owner_id, deleted = tombstones.len(), "Tombstones appended");
        Ok(())
    }

    async fn count(&self) -> Result<RegistryCounts, RegistryError> {
        Ok(self.state.read().await.index.counts())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        match self.state.read().await.file {
            Some(_) => Ok(()),
            None => Err(RegistryError::Closed),
        }
    }

    async fn close(&self) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        if let Some(mut file) = state.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            info!(path = %self.path.display(), "Storage log closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");

        let registry = FileRegistry::open(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(registry.count().await.unwrap().urls, 0);
    }

    #[tokio::test]
    async fn test_store_appends_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        let registry = FileRegistry::open(&path).await.unwrap();

        registry
            .store(ShortenedUrl::new("AAAAAA", "https://example.com/a", ""))
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            content,
            "{\"uuid\":\"1\",\"short_url\":\"AAAAAA\",\"original_url\":\"https://example.com/a\"}\n"
        );
    }

    #[tokio::test]
    async fn test_corrupt_line_fails_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        tokio::fs::write(
            &path,
            "{\"uuid\":\"1\",\"short_url\":\"AAAAAA\",\"original_url\":\"https://example.com/a\"}\nnot json\n",
        )
        .await
        .unwrap();

        let err = FileRegistry::open(&path).await.err().unwrap();

        assert!(matches!(err, RegistryError::CorruptLog { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_closed_registry_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::open(dir.path().join("urls.json"))
            .await
            .unwrap();

        registry.close().await.unwrap();

        let err = registry
            .store(ShortenedUrl::new("AAAAAA", "https://example.com/a", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Closed));
        assert!(registry.ping().await.is_err());
        assert!(registry.get_by_alias("AAAAAA").await.unwrap_err().is_not_found());
    }

    const FIRST_LINE: &str =
        "{\"uuid\":\"1\",\"short_url\":\"AAAAAA\",\"original_url\":\"https://example.com/a\"}\n";

    #[tokio::test]
    async fn test_torn_last_line_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        tokio::fs::write(&path, format!("{FIRST_LINE}{{\"uuid\":\"2\",\"short_u"))
            .await
            .unwrap();

        let registry = FileRegistry::open(&path).await.unwrap();

        assert_eq!(registry.count().await.unwrap().urls, 1);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), FIRST_LINE);

        registry
            .store(ShortenedUrl::new("BBBBBB", "https://example.com/b", ""))
            .await
            .unwrap();
        registry.close().await.unwrap();

        let reopened = FileRegistry::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap().urls, 2);
        assert!(reopened.get_by_alias("BBBBBB").await.is_ok());
    }

    #[tokio::test]
    async fn test_torn_multibyte_tail_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        let mut content = FIRST_LINE.as_bytes().to_vec();
        content.extend_from_slice(b"{\"uuid\":\"2\",\"short_url\":\"BBBBBB\",\"original_url\":\"https://example.com/\xd0");
        tokio::fs::write(&path, content).await.unwrap();

        let registry = FileRegistry::open(&path).await.unwrap();

        assert_eq!(registry.count().await.unwrap().urls, 1);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), FIRST_LINE);
    }

    #[tokio::test]
    async fn test_valid_last_line_without_newline_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        tokio::fs::write(&path, FIRST_LINE.trim_end()).await.unwrap();

        let registry = FileRegistry::open(&path).await.unwrap();
        registry
            .store(ShortenedUrl::new("BBBBBB", "https://example.com/b", ""))
            .await
            .unwrap();
        registry.close().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with(FIRST_LINE));
        assert_eq!(content.lines().count(), 2);

        let reopened = FileRegistry::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap().urls, 2);
    }

    #[tokio::test]
    async fn test_failed_append_leaves_index_untouched_and_detaches_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        tokio::fs::write(&path, FIRST_LINE).await.unwrap();

        // A read-only handle fails both the write and the truncation.
        let mut state = FileState {
            index: DedupIndex::new(),
            file: Some(File::open(&path).await.unwrap()),
            sequence: 1,
        };

        let err = state
            .append_entry(ShortenedUrl::new("BBBBBB", "https://example.com/b", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Io(_)));
        assert!(state.index.is_empty());
        assert_eq!(state.sequence, 1);
        assert!(state.file.is_none());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), FIRST_LINE);

        let err = state
            .append_entry(ShortenedUrl::new("CCCCCC", "https://example.com/c", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Closed));
    }
}
