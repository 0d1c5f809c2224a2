//! Moderation category catalog.
//!
//! The catalog is a closed set: every category a caller may request is one of
//! the variants below, and anything else is rejected up front rather than
//! passed through to the scorer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModerationError;

/// One tag from the moderation taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "sexual")]
    Sexual,
    #[serde(rename = "hate")]
    Hate,
    #[serde(rename = "harassment")]
    Harassment,
    #[serde(rename = "self-harm")]
    SelfHarm,
    #[serde(rename = "violence")]
    Violence,
}

impl Category {
    /// Every catalog member, in catalog order.
    pub const ALL: [Category; 5] = [
        Category::Sexual,
        Category::Hate,
        Category::Harassment,
        Category::SelfHarm,
        Category::Violence,
    ];

    /// Wire tag for this category.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Sexual => "sexual",
            Category::Hate => "hate",
            Category::Harassment => "harassment",
            Category::SelfHarm => "self-harm",
            Category::Violence => "violence",
        }
    }

    /// Wire tags for the whole catalog.
    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Category::as_str).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| ModerationError::InvalidCategories {
                invalid: vec![s.to_string()],
                valid: Category::all_names(),
            })
    }
}

/// Parse a comma-separated category selection.
///
/// Empty or whitespace-only input selects the full catalog. Tokens are
/// trimmed and checked for membership; any unknown token fails the whole
/// selection, carrying every offending token plus the valid set. Order of
/// the requested tokens is preserved.
pub fn parse_selection(input: &str) -> Result<Vec<Category>, ModerationError> {
    if input.trim().is_empty() {
        return Ok(Category::ALL.to_vec());
    }

    let mut selected = Vec::new();
    let mut invalid = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        match token.parse::<Category>() {
            Ok(category) => selected.push(category),
            Err(_) => invalid.push(token.to_string()),
        }
    }

    if invalid.is_empty() {
        Ok(selected)
    } else {
        Err(ModerationError::InvalidCategories {
            invalid,
            valid: Category::all_names(),
        })
    }
}
