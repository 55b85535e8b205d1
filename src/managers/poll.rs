use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

const ID_SUFFIX_LEN: usize = 7;

#[derive(Clone, Hash, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PollId(pub String);

impl PollId {
    /// Base 36 millisecond timestamp followed by a short random suffix.
    /// Unique enough for one organizer, not a security token.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().to_simple().to_string();
        let millis = now.timestamp_millis().max(0) as u64;
        Self(format!("{}{}", to_base36(millis), &random[..ID_SUFFIX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the persisted mirror entry for this poll.
    pub fn mirror_key(&self) -> String {
        format!("poll_{}", self.0)
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("Poll question must not be empty")]
    EmptyPrompt,
    #[error("Poll needs at least 2 options, got {0}")]
    TooFewOptions(usize),
    #[error("Poll duration must be positive")]
    ZeroDuration,
}

/// Organizer input before a poll is minted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PollDraft {
    pub prompt: String,
    pub options: Vec<String>,
    pub duration_seconds: u64,
}

/// Immutable definition of a running poll. The option order is the index
/// space of the vote ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollRecord {
    id: PollId,
    prompt: String,
    options: Vec<String>,
    start_time: DateTime<Utc>,
    duration_seconds: u64,
}

impl PollRecord {
    pub fn create(draft: PollDraft, now: DateTime<Utc>) -> Result<Self, PollError> {
        let prompt = draft.prompt.trim();
        if prompt.is_empty() {
            return Err(PollError::EmptyPrompt);
        }
        let options: Vec<String> = draft
            .options
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .collect();
        if options.len() < 2 {
            return Err(PollError::TooFewOptions(options.len()));
        }
        if draft.duration_seconds == 0 {
            return Err(PollError::ZeroDuration);
        }
        Ok(Self {
            id: PollId::generate(now),
            prompt: prompt.to_owned(),
            options,
            start_time: now,
            duration_seconds: draft.duration_seconds,
        })
    }

    /// Rebuilds a record that was minted elsewhere, e.g. decoded from a share link.
    pub fn from_parts(
        id: PollId,
        prompt: String,
        options: Vec<String>,
        start_time: DateTime<Utc>,
        duration_seconds: u64,
    ) -> Self {
        Self {
            id,
            prompt,
            options,
            start_time,
            duration_seconds,
        }
    }

    pub fn id(&self) -> &PollId {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn option_name(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn start_millis(&self) -> i64 {
        self.start_time.timestamp_millis()
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }
}

/// `None` when the instant is out of range for chrono.
pub fn datetime_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(prompt: &str, options: &[&str], duration_seconds: u64) -> PollDraft {
        PollDraft {
            prompt: prompt.to_owned(),
            options: options.iter().map(|o| o.to_string()).collect(),
            duration_seconds,
        }
    }

    #[test]
    fn create_drops_blank_options() {
        let now = datetime_from_millis(1_700_000_000_000).unwrap();
        let record = PollRecord::create(draft("  Best color? ", &["Red", " ", "Blue", ""], 60), now)
            .unwrap();
        assert_eq!(record.prompt(), "Best color?");
        assert_eq!(record.options(), &["Red".to_owned(), "Blue".to_owned()][..]);
        assert_eq!(record.start_time(), now);
        assert_eq!(record.duration_seconds(), 60);
    }

    #[test]
    fn create_rejects_invalid_drafts() {
        let now = Utc::now();
        assert_eq!(
            PollRecord::create(draft(" ", &["a", "b"], 60), now),
            Err(PollError::EmptyPrompt)
        );
        assert_eq!(
            PollRecord::create(draft("q", &["a", "  "], 60), now),
            Err(PollError::TooFewOptions(1))
        );
        assert_eq!(
            PollRecord::create(draft("q", &["a", "b"], 0), now),
            Err(PollError::ZeroDuration)
        );
    }

    #[test]
    fn generated_ids_start_with_base36_time() {
        let now = datetime_from_millis(36 * 36).unwrap();
        let id = PollId::generate(now);
        assert!(id.as_str().starts_with("100"));
        assert_eq!(id.as_str().len(), 3 + ID_SUFFIX_LEN);
        assert_ne!(id, PollId::generate(now));
        assert_eq!(id.mirror_key(), format!("poll_{}", id));
    }
}
