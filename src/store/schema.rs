//! # Knowledge Store Schema Module
//!
//! This module defines and manages the database schema for the knowledge
//! store: RCA document metadata, chat sessions, and chat messages.
//!
//! ## Schema Design
//!
//! The schema implements a three-table design:
//! 1. `rca_documents` - Structured incident records keyed by unique filename
//! 2. `chat_sessions` - Chat sessions ordered by last activity
//! 3. `chat_messages` - Immutable per-session messages with optional
//!    similarity-match snapshots, cascading with their session
//!
//! List-valued document fields (problems, solutions, root causes, lessons)
//! are persisted as JSON text; encoding and decoding happen only in the
//! store adapter.

use crate::store::error::StoreError;
use libsql::{Connection, params};

/// Initialize the knowledge store schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    // Create RCA documents table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rca_documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL UNIQUE,
            source_path TEXT NOT NULL,
            project_name TEXT,
            problems TEXT NOT NULL DEFAULT '[]',
            solutions TEXT NOT NULL DEFAULT '[]',
            root_causes TEXT NOT NULL DEFAULT '[]',
            lessons_learned TEXT NOT NULL DEFAULT '[]',
            full_content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create rca_documents table: {}", e)))?;

    // Create chat sessions table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create chat_sessions table: {}", e)))?;

    // Create chat messages table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('user', 'assistant')),
            content TEXT NOT NULL,
            matched_rcas TEXT,
            timestamp TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
        )",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create chat_messages table: {}", e)))?;

    // Create index on session_id for faster lookups
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_session_id ON chat_messages(session_id)",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create index on chat_messages: {}", e)))?;

    Ok(())
}
