//! Database operations for the knowledge store

use std::collections::HashMap;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use libsql::{Connection, Row, params};
use tracing::{debug, instrument};

use crate::search::RcaMatch;
use crate::store::error::StoreError;
use crate::store::{ChatMessage, ChatSession, MessageRole, NewDocument, RcaDocument, schema};

/// Knowledge store over a LibSQL connection
///
/// The connection owns its internal concurrency control; each operation is a
/// discrete transaction and the handle is safe to clone across in-flight
/// requests.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Create a new store on an existing connection
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        // Initialize schema
        schema::initialize_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Create a new store from a database path
    pub async fn new_from_path(path: &str) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Insert a document or update the existing row matched by filename
    ///
    /// Content-hash change detection is the caller's responsibility; the store
    /// overwrites derived fields unconditionally. Returns the store-assigned
    /// id, which is stable across updates of the same filename.
    #[instrument(skip(self, doc), fields(filename = %doc.filename))]
    pub async fn upsert_document(&self, doc: &NewDocument) -> Result<i64, StoreError> {
        let now = format_timestamp(&Utc::now());

        self.conn
            .execute(
                "INSERT INTO rca_documents (filename, source_path, project_name, problems, solutions,
                                            root_causes, lessons_learned, full_content, content_hash,
                                            created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(filename) DO UPDATE SET
                 source_path = excluded.source_path,
                 project_name = excluded.project_name,
                 problems = excluded.problems,
                 solutions = excluded.solutions,
                 root_causes = excluded.root_causes,
                 lessons_learned = excluded.lessons_learned,
                 full_content = excluded.full_content,
                 content_hash = excluded.content_hash,
                 updated_at = excluded.updated_at",
                params![
                    doc.filename.clone(),
                    doc.source_path.clone(),
                    opt_text(doc.project_name.as_deref()),
                    encode_list(&doc.problems)?,
                    encode_list(&doc.solutions)?,
                    encode_list(&doc.root_causes)?,
                    encode_list(&doc.lessons_learned)?,
                    doc.full_content.clone(),
                    doc.content_hash.clone(),
                    now.clone(),
                    now,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to upsert document: {}", e)))?;

        match self.document_id(&doc.filename).await? {
            Some(id) => Ok(id),
            None => Err(StoreError::Data(
                "No id returned for upserted document".to_string(),
            )),
        }
    }

    /// Get the id of a document by filename
    pub async fn document_id(&self, filename: &str) -> Result<Option<i64>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM rca_documents WHERE filename = ?",
                params![filename],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get document id: {}", e)))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get(0)
                    .map_err(|e| StoreError::Data(format!("Failed to get id: {}", e)))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Data(format!("Failed to get document id: {}", e))),
        }
    }

    /// Load the filename -> content-hash map for all documents
    ///
    /// Loaded once at the start of a sync run so change detection does not
    /// issue one query per file.
    #[instrument(skip(self))]
    pub async fn document_hashes(&self) -> Result<HashMap<String, String>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT filename, content_hash FROM rca_documents", params![])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get document hashes: {}", e)))?;

        let mut hashes = HashMap::new();
        while let Ok(Some(row)) = rows.next().await {
            let filename: String = row
                .get(0)
                .map_err(|e| StoreError::Data(format!("Failed to get filename: {}", e)))?;
            let hash: String = row
                .get(1)
                .map_err(|e| StoreError::Data(format!("Failed to get content_hash: {}", e)))?;
            hashes.insert(filename, hash);
        }

        Ok(hashes)
    }

    /// Get all documents ordered by most recently updated
    #[instrument(skip(self))]
    pub async fn list_documents(&self) -> Result<Vec<RcaDocument>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, filename, source_path, project_name, problems, solutions,
                        root_causes, lessons_learned, full_content, content_hash,
                        created_at, updated_at
                 FROM rca_documents
                 ORDER BY updated_at DESC, id DESC",
                params![],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get documents: {}", e)))?;

        let mut documents = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            documents.push(row_to_document(&row)?);
        }

        Ok(documents)
    }

    /// Batch-fetch documents by id
    ///
    /// The result order is unspecified; callers joining against a ranking must
    /// reorder by id themselves.
    pub async fn documents_by_ids(&self, ids: &[i64]) -> Result<Vec<RcaDocument>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT id, filename, source_path, project_name, problems, solutions,
                    root_causes, lessons_learned, full_content, content_hash,
                    created_at, updated_at
             FROM rca_documents
             WHERE id IN ({})",
            placeholders
        );

        let params: Vec<libsql::Value> = ids.iter().map(|id| (*id).into()).collect();
        let mut rows = self
            .conn
            .query(&sql, params)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get documents by id: {}", e)))?;

        let mut documents = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            documents.push(row_to_document(&row)?);
        }

        Ok(documents)
    }

    /// Count documents in the knowledge base
    pub async fn document_count(&self) -> Result<i64, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM rca_documents", params![])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count documents: {}", e)))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| StoreError::Data(format!("Failed to get count: {}", e))),
            Ok(None) => Ok(0),
            Err(e) => Err(StoreError::Data(format!("Failed to get count: {}", e))),
        }
    }

    /// Create a new chat session
    ///
    /// The title defaults to a timestamp-derived label when absent or blank.
    #[instrument(skip(self))]
    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => format!("Chat Session {}", Local::now().format("%Y-%m-%d %H:%M")),
        };
        let now = Utc::now();
        let ts = format_timestamp(&now);

        self.conn
            .execute(
                "INSERT INTO chat_sessions (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
                params![id.clone(), title.clone(), ts.clone(), ts],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to create session: {}", e)))?;

        debug!("Created chat session {}", id);
        Ok(ChatSession {
            id,
            title,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get all chat sessions ordered by most recently updated
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, created_at, updated_at
                 FROM chat_sessions
                 ORDER BY updated_at DESC",
                params![],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get sessions: {}", e)))?;

        let mut sessions = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            sessions.push(row_to_session(&row)?);
        }

        Ok(sessions)
    }

    /// Rename a chat session
    ///
    /// The new title must be non-empty; renaming bumps `updated_at`.
    pub async fn rename_session(&self, id: &str, new_title: &str) -> Result<(), StoreError> {
        if new_title.trim().is_empty() {
            return Err(StoreError::Data(
                "Session title must not be empty".to_string(),
            ));
        }

        self.conn
            .execute(
                "UPDATE chat_sessions SET title = ?, updated_at = ? WHERE id = ?",
                params![new_title, format_timestamp(&Utc::now()), id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to rename session: {}", e)))?;

        Ok(())
    }

    /// Delete a chat session and all its messages
    ///
    /// Both deletes happen in one transaction so no orphan messages can
    /// survive a partial failure.
    #[instrument(skip(self))]
    pub async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chat_messages WHERE session_id = ?",
            params![id],
        )
        .await
        .map_err(|e| StoreError::Query(format!("Failed to delete messages: {}", e)))?;

        tx.execute("DELETE FROM chat_sessions WHERE id = ?", params![id])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to delete session: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    /// Append a message to a session
    ///
    /// The message insert and the session `updated_at` bump share one
    /// transaction; a failed write never partially commits.
    #[instrument(skip(self, content, matched))]
    pub async fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        matched: Option<&[RcaMatch]>,
    ) -> Result<ChatMessage, StoreError> {
        let now = Utc::now();
        let ts = format_timestamp(&now);
        let matched_json = match matched {
            Some(m) => libsql::Value::from(encode_matches(m)?),
            None => libsql::Value::Null,
        };

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to start transaction: {}", e)))?;

        let changed = tx
            .execute(
                "UPDATE chat_sessions SET updated_at = ? WHERE id = ?",
                params![ts.clone(), session_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to update session: {}", e)))?;

        if changed == 0 {
            return Err(StoreError::Data(format!("Unknown session: {}", session_id)));
        }

        tx.execute(
            "INSERT INTO chat_messages (session_id, role, content, matched_rcas, timestamp)
             VALUES (?, ?, ?, ?, ?)",
            params![session_id, role.as_str(), content, matched_json, ts],
        )
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert message: {}", e)))?;

        let mut rows = tx
            .query("SELECT last_insert_rowid()", params![])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get last insert ID: {}", e)))?;

        let id: i64 = match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| StoreError::Data(format!("Failed to get ID: {}", e)))?,
            Ok(None) => {
                return Err(StoreError::Data(
                    "No ID returned from last_insert_rowid()".to_string(),
                ));
            }
            Err(e) => return Err(StoreError::Data(format!("Failed to get ID: {}", e))),
        };

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        Ok(ChatMessage {
            id,
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            matched_rcas: matched.map(|m| m.to_vec()),
            timestamp: now,
        })
    }

    /// Get all messages of a session ordered by ascending timestamp
    ///
    /// An unknown session yields an empty list, not an error.
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, session_id, role, content, matched_rcas, timestamp
                 FROM chat_messages
                 WHERE session_id = ?
                 ORDER BY timestamp ASC, id ASC",
                params![session_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get messages: {}", e)))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(row_to_message(&row)?);
        }

        Ok(messages)
    }
}

/// Encode an ordered string sequence for a text column
fn encode_list(items: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(items)
        .map_err(|e| StoreError::Data(format!("Failed to encode list: {}", e)))
}

/// Decode an ordered string sequence from a text column
fn decode_list(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Data(format!("Failed to decode list: {}", e)))
}

/// Encode similarity-match snapshots for a text column
fn encode_matches(matches: &[RcaMatch]) -> Result<String, StoreError> {
    serde_json::to_string(matches)
        .map_err(|e| StoreError::Data(format!("Failed to encode matches: {}", e)))
}

/// Decode similarity-match snapshots from a text column
fn decode_matches(raw: &str) -> Result<Vec<RcaMatch>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Data(format!("Failed to decode matches: {}", e)))
}

fn opt_text(value: Option<&str>) -> libsql::Value {
    match value {
        Some(v) => libsql::Value::from(v),
        None => libsql::Value::Null,
    }
}

/// Read a nullable text column
fn get_opt_text(row: &Row, idx: i32, column: &str) -> Result<Option<String>, StoreError> {
    match row.get_value(idx) {
        Ok(libsql::Value::Text(text)) => Ok(Some(text)),
        Ok(libsql::Value::Null) => Ok(None),
        Ok(other) => Err(StoreError::Data(format!(
            "Unexpected value for {}: {:?}",
            column, other
        ))),
        Err(e) => Err(StoreError::Data(format!("Failed to get {}: {}", column, e))),
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed-width fractional seconds keep lexicographic and chronological
    // order aligned for TEXT timestamp columns
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Data(format!("Failed to parse timestamp: {}", e)))
}

/// Convert a database row to an RcaDocument
fn row_to_document(row: &Row) -> Result<RcaDocument, StoreError> {
    let problems: String = row
        .get(4)
        .map_err(|e| StoreError::Data(format!("Failed to get problems: {}", e)))?;
    let solutions: String = row
        .get(5)
        .map_err(|e| StoreError::Data(format!("Failed to get solutions: {}", e)))?;
    let root_causes: String = row
        .get(6)
        .map_err(|e| StoreError::Data(format!("Failed to get root_causes: {}", e)))?;
    let lessons_learned: String = row
        .get(7)
        .map_err(|e| StoreError::Data(format!("Failed to get lessons_learned: {}", e)))?;
    let created_at: String = row
        .get(10)
        .map_err(|e| StoreError::Data(format!("Failed to get created_at: {}", e)))?;
    let updated_at: String = row
        .get(11)
        .map_err(|e| StoreError::Data(format!("Failed to get updated_at: {}", e)))?;

    Ok(RcaDocument {
        id: row
            .get(0)
            .map_err(|e| StoreError::Data(format!("Failed to get id: {}", e)))?,
        filename: row
            .get(1)
            .map_err(|e| StoreError::Data(format!("Failed to get filename: {}", e)))?,
        source_path: row
            .get(2)
            .map_err(|e| StoreError::Data(format!("Failed to get source_path: {}", e)))?,
        project_name: get_opt_text(row, 3, "project_name")?,
        problems: decode_list(&problems)?,
        solutions: decode_list(&solutions)?,
        root_causes: decode_list(&root_causes)?,
        lessons_learned: decode_list(&lessons_learned)?,
        full_content: row
            .get(8)
            .map_err(|e| StoreError::Data(format!("Failed to get full_content: {}", e)))?,
        content_hash: row
            .get(9)
            .map_err(|e| StoreError::Data(format!("Failed to get content_hash: {}", e)))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Convert a database row to a ChatSession
fn row_to_session(row: &Row) -> Result<ChatSession, StoreError> {
    let created_at: String = row
        .get(2)
        .map_err(|e| StoreError::Data(format!("Failed to get created_at: {}", e)))?;
    let updated_at: String = row
        .get(3)
        .map_err(|e| StoreError::Data(format!("Failed to get updated_at: {}", e)))?;

    Ok(ChatSession {
        id: row
            .get(0)
            .map_err(|e| StoreError::Data(format!("Failed to get id: {}", e)))?,
        title: row
            .get(1)
            .map_err(|e| StoreError::Data(format!("Failed to get title: {}", e)))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Convert a database row to a ChatMessage
fn row_to_message(row: &Row) -> Result<ChatMessage, StoreError> {
    let role: String = row
        .get(2)
        .map_err(|e| StoreError::Data(format!("Failed to get role: {}", e)))?;
    let role = MessageRole::parse(&role)
        .ok_or_else(|| StoreError::Data(format!("Unknown message role: {}", role)))?;

    let matched_rcas = match get_opt_text(row, 4, "matched_rcas")? {
        Some(raw) => Some(decode_matches(&raw)?),
        None => None,
    };

    let timestamp: String = row
        .get(5)
        .map_err(|e| StoreError::Data(format!("Failed to get timestamp: {}", e)))?;

    Ok(ChatMessage {
        id: row
            .get(0)
            .map_err(|e| StoreError::Data(format!("Failed to get id: {}", e)))?,
        session_id: row
            .get(1)
            .map_err(|e| StoreError::Data(format!("Failed to get session_id: {}", e)))?,
        role,
        content: row
            .get(3)
            .map_err(|e| StoreError::Data(format!("Failed to get content: {}", e)))?,
        matched_rcas,
        timestamp: parse_timestamp(&timestamp)?,
    })
}
