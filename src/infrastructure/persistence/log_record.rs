//! Line format of the append-only storage log.
//!
//! One JSON object per line:
//!
//! ```text
//! {"uuid":"1","short_url":"AAAAAA","original_url":"https://example.com/a"}
//! {"uuid":"2","short_url":"BBBBBB","original_url":"https://example.com/b","user_id":"u1"}
//! {"uuid":"3","short_url":"BBBBBB","original_url":"https://example.com/b","user_id":"u1","is_deleted":true}
//! ```
//!
//! `user_id` and `is_deleted` are omitted when empty/false, so anonymous live
//! entries are written in the minimal three-field form.

use serde::{Deserialize, Serialize};

use crate::domain::entities::ShortenedUrl;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Monotonic sequence number rendered as a decimal string. Identity only.
    pub uuid: String,
    pub short_url: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LogRecord {
    pub fn new(sequence: u64, url: &ShortenedUrl) -> Self {
        Self {
            uuid: sequence.to_string(),
            short_url: url.alias.clone(),
            original_url: url.original_url.clone(),
            user_id: url.owner_id.clone(),
            is_deleted: url.deleted,
        }
    }

    /// Parses the sequence number. Records written by hand may carry a
    /// non-numeric uuid, in which case `None` is returned.
    pub fn sequence(&self) -> Option<u64> {
        self.uuid.parse().ok()
    }

    /// Encodes the record as one newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes one raw log line. A trailing newline is accepted.
    pub fn from_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}

impl From<LogRecord> for ShortenedUrl {
    fn from(record: LogRecord) -> Self {
        Self {
            alias: record.short_url,
            original_url: record.original_url,
            owner_id: record.user_id,
            deleted: record.is_deleted,
        }
    }
}
