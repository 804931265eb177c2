//! Knowledge store module
//!
//! This module provides durable structured metadata for RCA documents, chat
//! sessions, and chat messages, including upsert-by-filename with caller-side
//! change detection via content hash.

mod database;
pub mod error;
mod schema;

pub use database::Store;
pub use error::StoreError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::RcaMatch;

/// A structured RCA document as stored in the knowledge base
#[derive(Debug, Clone, Serialize)]
pub struct RcaDocument {
    /// Store-assigned id, stable across updates of the same filename
    pub id: i64,

    /// Unique natural key
    pub filename: String,

    /// Location of the document in the external source
    pub source_path: String,

    /// Project the incident belongs to
    pub project_name: Option<String>,

    /// Identified problems
    pub problems: Vec<String>,

    /// Applied solutions
    pub solutions: Vec<String>,

    /// Identified root causes
    pub root_causes: Vec<String>,

    /// Key lessons learned
    pub lessons_learned: Vec<String>,

    /// Raw extracted text
    pub full_content: String,

    /// Fingerprint of the source bytes, used for change detection
    pub content_hash: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Payload for inserting or updating an RCA document
///
/// Ids and timestamps are store-assigned.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Unique natural key
    pub filename: String,

    /// Location of the document in the external source
    pub source_path: String,

    /// Project the incident belongs to
    pub project_name: Option<String>,

    /// Identified problems
    pub problems: Vec<String>,

    /// Applied solutions
    pub solutions: Vec<String>,

    /// Identified root causes
    pub root_causes: Vec<String>,

    /// Key lessons learned
    pub lessons_learned: Vec<String>,

    /// Raw extracted text
    pub full_content: String,

    /// Fingerprint of the source bytes
    pub content_hash: String,
}

/// A chat session
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    /// Opaque unique token
    pub id: String,

    /// Session title
    pub title: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Advances whenever a message is appended
    pub updated_at: DateTime<Utc>,
}

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// A message written by the user
    User,
    /// A message produced by the assistant
    Assistant,
}

impl MessageRole {
    /// The persisted text form of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Parse a persisted role value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// A persisted chat message
///
/// Messages are immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Store-assigned sequence
    pub id: i64,

    /// Owning session
    pub session_id: String,

    /// Author role
    pub role: MessageRole,

    /// Message text
    pub content: String,

    /// Similarity-search snapshots attached to technical assistant replies
    pub matched_rcas: Option<Vec<RcaMatch>>,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}
