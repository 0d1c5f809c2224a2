//! Core data types shared across the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Per-category confidence scores from one moderation pass.
///
/// A `BTreeMap` keeps serialization and report output in stable catalog
/// order regardless of completion order upstream.
pub type CategoryScores = BTreeMap<Category, f64>;

/// Message identifier.
///
/// Batch files store numeric ids while the HTTP API round-trips them as
/// strings; the two representations must compare equal, so equality and
/// hashing go through the canonical (string) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Int(i64),
    Text(String),
}

impl MessageId {
    /// Canonical form used for cross-representation comparison.
    pub fn canonical(&self) -> String {
        match self {
            MessageId::Int(n) => n.to_string(),
            MessageId::Text(s) => s.clone(),
        }
    }
}

impl PartialEq for MessageId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for MessageId {}

impl Hash for MessageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        MessageId::Int(n)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId::Text(s.to_string())
    }
}

/// One message inside a conversation, as produced by the transcript parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    /// Speaker turn: 0 for the user, 1 for the character.
    pub role_idx: u8,
    pub content: String,
}

/// A parsed conversation. Read-only input to the batch pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub character_name: Option<String>,
    pub messages: Vec<Message>,
}

/// One message's score snapshot from one moderation pass.
///
/// Immutable once created; two passes over the same message produce two
/// independent records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub message_id: MessageId,
    pub content: String,
    pub category_scores: CategoryScores,
}

/// Request body accepted by the moderation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerateRequest {
    pub message_id: MessageId,
    pub content: String,
    pub categories: Vec<Category>,
}

/// Response body returned by the moderation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerateResponse {
    pub message_id: MessageId,
    pub content: String,
    pub category_scores: CategoryScores,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn numeric_and_textual_ids_compare_equal() {
        assert_eq!(MessageId::Int(42), MessageId::Text("42".into()));
        assert_ne!(MessageId::Int(42), MessageId::Text("042".into()));
    }

    #[test]
    fn id_hash_is_representation_independent() {
        let mut map: HashMap<MessageId, &str> = HashMap::new();
        map.insert(MessageId::Int(7), "seven");
        assert_eq!(map.get(&MessageId::Text("7".into())), Some(&"seven"));
    }

    #[test]
    fn message_id_deserializes_from_both_representations() {
        let numeric: MessageId = serde_json::from_str("12").unwrap();
        let textual: MessageId = serde_json::from_str("\"x1\"").unwrap();
        assert_eq!(numeric, MessageId::Int(12));
        assert_eq!(textual, MessageId::Text("x1".into()));
    }

    #[test]
    fn record_serializes_scores_in_catalog_order() {
        let mut scores = CategoryScores::new();
        scores.insert(Category::Violence, 0.2);
        scores.insert(Category::Sexual, 0.1);
        let record = ModerationRecord {
            message_id: MessageId::Int(0),
            content: "hi".into(),
            category_scores: scores,
        };
        let json = serde_json::to_string(&record).unwrap();
        let sexual = json.find("sexual").unwrap();
        let violence = json.find("violence").unwrap();
        assert!(sexual < violence);
    }
}
