//! Search query data structures.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured filter produced by the query parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Keywords as sent to the search API (`+`-joined)
    pub keywords: String,

    /// Terms that must all appear in a listing's title or description
    pub include_terms: BTreeSet<String>,

    /// Terms that reject a listing when any of them appears
    pub exclude_terms: BTreeSet<String>,

    /// Area code resolved to coordinates through the geo table
    pub area_code: Option<u32>,

    /// Search radius around the area code
    pub radius_km: Option<u32>,

    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
}

impl SearchSpec {
    /// Whether the search carries no keywords at all (filter-only search).
    pub fn is_filter_only(&self) -> bool {
        self.include_terms.is_empty()
    }

    /// Check a listing's text against the exclude and include terms.
    ///
    /// Comparison is case-insensitive. Each include term may be satisfied by
    /// either the title or the description.
    pub fn matches(&self, title: &str, description: &str) -> bool {
        let title = title.to_lowercase();
        let description = description.to_lowercase();
        let contains = |term: &String| title.contains(term) || description.contains(term);

        if self.exclude_terms.iter().any(contains) {
            return false;
        }
        self.include_terms.iter().all(contains)
    }
}

/// Destination chat for notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatRef {
    /// Numeric chat identifier
    Numeric(i64),
    /// Named channel handle, e.g. `@deals`
    Handle(String),
}

impl ChatRef {
    /// Interpret a chat string: integers are numeric ids, anything else a handle.
    pub fn from_chat(chat: &str) -> Self {
        match chat.parse::<i64>() {
            Ok(id) => Self::Numeric(id),
            Err(_) => Self::Handle(chat.to_string()),
        }
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Handle(handle) => f.write_str(handle),
        }
    }
}

/// Output of the query parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Canonical job key, `<chat>/<normalized query>`
    pub id: String,

    /// Normalized chat string
    pub chat: String,

    /// Normalized query string (everything after the chat prefix)
    pub query: String,

    pub spec: SearchSpec,
}

impl ParsedQuery {
    /// Whether this is the stop-all wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.query == "*"
    }

    pub fn chat_ref(&self) -> ChatRef {
        ChatRef::from_chat(&self.chat)
    }
}
