//! Transcript parsing and JSON persistence.
//!
//! Raw transcripts are blank-line-separated conversations. Each line is
//! either `USER: ...` (speaker turn 0) or `Name: ...` (speaker turn 1, the
//! name becomes the conversation's character name, title-cased). Message
//! ids are sequential zero-based integers across the whole file.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ModerationError;
use crate::types::{Conversation, Message, MessageId, ModerationRecord};

/// Parse a raw transcript into structured conversations.
pub fn parse_transcript(text: &str) -> Result<Vec<Conversation>, ModerationError> {
    let mut conversations = Vec::new();
    let mut message_id_counter: i64 = 0;

    for raw_conversation in text.trim().split("\n\n") {
        let block = raw_conversation.trim();
        if block.is_empty() {
            continue;
        }

        let mut character_name: Option<String> = None;
        let mut messages = Vec::new();

        for line in block.lines() {
            let (role_idx, content) = if let Some(rest) = line.strip_prefix("USER:") {
                (0, rest.trim().to_string())
            } else {
                let (name, rest) = line.split_once(':').ok_or_else(|| {
                    ModerationError::Parse(format!("transcript line has no speaker: {line:?}"))
                })?;
                character_name = Some(title_case(name.trim()));
                (1, rest.trim().to_string())
            };

            messages.push(Message {
                message_id: MessageId::Int(message_id_counter),
                role_idx,
                content,
            });
            message_id_counter += 1;
        }

        conversations.push(Conversation {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            character_name,
            messages,
        });
    }

    Ok(conversations)
}

/// Render structured conversations back into transcript form.
pub fn render_transcript(conversations: &[Conversation]) -> String {
    conversations
        .iter()
        .map(|conversation| {
            let name = conversation.character_name.as_deref().unwrap_or("CHARACTER");
            conversation
                .messages
                .iter()
                .map(|message| {
                    if message.role_idx == 0 {
                        format!("USER: {}", message.content)
                    } else {
                        format!("{}: {}", name, message.content)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Load structured conversations from a JSON file.
pub fn load_conversations(path: &Path) -> Result<Vec<Conversation>, ModerationError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ModerationError::Io(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}

/// Write structured conversations as pretty-printed JSON, replacing the file.
pub fn write_conversations(
    path: &Path,
    conversations: &[Conversation],
) -> Result<(), ModerationError> {
    let json = serde_json::to_string_pretty(conversations)?;
    std::fs::write(path, json)
        .map_err(|e| ModerationError::Io(format!("cannot write {}: {e}", path.display())))
}

/// Load batch moderation records from a JSON file.
pub fn load_records(path: &Path) -> Result<Vec<ModerationRecord>, ModerationError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ModerationError::Io(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}

/// Write batch moderation records as pretty-printed JSON. The destination
/// is replaced wholesale once the batch finishes or is cancelled, never
/// appended to incrementally.
pub fn write_records(path: &Path, records: &[ModerationRecord]) -> Result<(), ModerationError> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .map_err(|e| ModerationError::Io(format!("cannot write {}: {e}", path.display())))
}

/// Index records loaded from a file by canonical message id.
pub fn load_records_by_id(
    path: &Path,
) -> Result<HashMap<String, ModerationRecord>, ModerationError> {
    Ok(crate::compare::index_records(load_records(path)?))
}
