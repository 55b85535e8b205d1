use super::ledger::VoteCounts;
use color_eyre::eyre::Report;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value written under `poll_{id}`. Other contexts only read `vote_counts`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEntry {
    pub vote_counts: VoteCounts,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vote: Option<LastVote>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastVote {
    pub option_index: usize,
    pub option_name: String,
}

/// String key-value store shared between contexts. Treated as a cache of the
/// ledger, never as the source of truth.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), Report>;
    fn remove(&mut self, key: &str) -> Option<String>;
}

#[derive(Default, Debug)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Report> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_uses_camel_case_keys() {
        let entry = MirrorEntry {
            vote_counts: vec![1, 2],
            timestamp: 42,
            last_vote: Some(LastVote {
                option_index: 1,
                option_name: "Blue".to_owned(),
            }),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"voteCounts":[1,2],"timestamp":42,"lastVote":{"optionIndex":1,"optionName":"Blue"}}"#
        );
        let bare: MirrorEntry = serde_json::from_str(r#"{"voteCounts":[3],"timestamp":7}"#).unwrap();
        assert_eq!(bare.last_vote, None);
    }
}
