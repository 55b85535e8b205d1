//! Shareable poll links.
//!
//! A link carries the whole poll definition as percent-encoded JSON in its
//! `poll` query parameter, so any context can open the poll without a lookup.

use super::poll::{datetime_from_millis, PollId, PollRecord};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything `encodeURIComponent` escapes.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Links minted before durations were configurable ran for one minute.
pub const LEGACY_DURATION_SECONDS: u64 = 60;

const POLL_PARAM: &str = "poll";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPayload {
    pub voting_prompt: String,
    pub options: Vec<String>,
    pub poll_id: PollId,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link has no poll parameter")]
    MissingPoll,
    #[error("Poll parameter is not valid UTF-8 once decoded")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("Poll parameter is not valid poll JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Poll definition is unusable: {0}")]
    Invalid(&'static str),
}

impl From<&PollRecord> for LinkPayload {
    fn from(record: &PollRecord) -> Self {
        Self {
            voting_prompt: record.prompt().to_owned(),
            options: record.options().to_vec(),
            poll_id: record.id().clone(),
            start_time: record.start_millis(),
            duration: Some(record.duration_seconds()),
        }
    }
}

impl LinkPayload {
    pub fn into_record(self) -> Result<PollRecord, LinkError> {
        if self.poll_id.as_str().is_empty() {
            return Err(LinkError::Invalid("missing poll id"));
        }
        if self.voting_prompt.trim().is_empty() {
            return Err(LinkError::Invalid("empty question"));
        }
        if self.options.len() < 2 {
            return Err(LinkError::Invalid("fewer than 2 options"));
        }
        if self.options.iter().any(|option| option.trim().is_empty()) {
            return Err(LinkError::Invalid("blank option label"));
        }
        let start_time =
            datetime_from_millis(self.start_time).ok_or(LinkError::Invalid("start time out of range"))?;
        // A zero duration was treated as absent by the first link format as well.
        let duration = match self.duration {
            Some(seconds) if seconds > 0 => seconds,
            _ => LEGACY_DURATION_SECONDS,
        };
        Ok(PollRecord::from_parts(
            self.poll_id,
            self.voting_prompt,
            self.options,
            start_time,
            duration,
        ))
    }
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// `{base_url}?poll={percent-encoded JSON}`.
pub fn encode_link(base_url: &str, record: &PollRecord) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(&LinkPayload::from(record))?;
    Ok(format!(
        "{}?{}={}",
        base_url.trim_end_matches('/'),
        POLL_PARAM,
        encode_component(&json)
    ))
}

/// Accepts a full link, a bare query string or the bare parameter value.
pub fn decode_link(link: &str) -> Result<PollRecord, LinkError> {
    let raw = poll_param(link.trim()).ok_or(LinkError::MissingPoll)?;
    let json = percent_decode_str(raw).decode_utf8()?;
    let payload: LinkPayload = serde_json::from_str(&json)?;
    payload.into_record()
}

fn poll_param(link: &str) -> Option<&str> {
    let link = link.split('#').next().unwrap_or_default();
    let query = match link.find('?') {
        Some(pos) => &link[pos + 1..],
        None if link.contains('=') => link,
        // Bare value, the JSON is fully escaped so it holds no '='
        None => return Some(link).filter(|value| !value.is_empty()),
    };
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(POLL_PARAM), Some(value)) if !value.is_empty() => Some(value),
                _ => None,
            }
        })
        .next()
}

/// Image URL for the external QR service. The image itself is never fetched here.
pub fn qr_image_url(endpoint: &str, link: &str) -> String {
    format!("{}{}", endpoint, encode_component(link))
}
