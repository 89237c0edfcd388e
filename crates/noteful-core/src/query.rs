//! SQL composition for the flat note join.
//!
//! Statements use the SQLite dialect with numbered `?N` placeholders so the
//! same text runs on both the local SQLite store and D1.

use crate::{NoteQuery, UpdateNote};

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }

    /// Push a parameter and return its placeholder.
    fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }
}

const SELECT_NOTE_ROWS: &str =
    "SELECT n.id AS id, n.title AS title, n.content AS content,
        f.id AS folder_id, f.name AS folder_name,
        t.id AS tag_id, t.name AS tag_name
     FROM notes n
     LEFT JOIN folders f ON n.folder_id = f.id
     LEFT JOIN notes_tags nt ON n.id = nt.note_id
     LEFT JOIN tags t ON nt.tag_id = t.id";

pub const INSERT_NOTE: &str =
    "INSERT INTO notes (title, content, folder_id) VALUES (?1, ?2, ?3) RETURNING id";

pub const NOTE_EXISTS: &str = "SELECT COUNT(*) AS count FROM notes WHERE id = ?1";

pub const DELETE_NOTE: &str = "DELETE FROM notes WHERE id = ?1";

pub const DELETE_NOTE_TAGS: &str = "DELETE FROM notes_tags WHERE note_id = ?1";

pub const INSERT_NOTE_TAG: &str = "INSERT INTO notes_tags (note_id, tag_id) VALUES (?1, ?2)";

/// Links a tag only while the note still exists; inserts nothing otherwise.
pub const LINK_EXISTING_NOTE_TAG: &str =
    "INSERT INTO notes_tags (note_id, tag_id)
     SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM notes WHERE id = ?1)";

/// Which notes to select.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteSelect {
    ById(i64),
    Matching(NoteQuery),
}

impl NoteSelect {
    /// Build the join query. Rows come back ordered by note id, then tag id,
    /// so each note's rows are contiguous.
    pub fn to_statement(&self) -> Statement {
        let mut stmt = Statement::new(SELECT_NOTE_ROWS);
        let mut conditions = Vec::new();

        match self {
            NoteSelect::ById(id) => {
                let p = stmt.bind(*id);
                conditions.push(format!("n.id = {}", p));
            }
            NoteSelect::Matching(query) => {
                if let Some(term) = query.search_term.as_deref().filter(|t| !t.is_empty()) {
                    let p = stmt.bind(format!("%{}%", escape_like(term)));
                    conditions.push(format!("LOWER(n.title) LIKE LOWER({}) ESCAPE '\\'", p));
                }
                if let Some(folder_id) = query.folder_id {
                    let p = stmt.bind(folder_id);
                    conditions.push(format!("n.folder_id = {}", p));
                }
                if let Some(tag_id) = query.tag_id {
                    let p = stmt.bind(tag_id);
                    conditions.push(format!(
                        "n.id IN (SELECT note_id FROM notes_tags WHERE tag_id = {})",
                        p
                    ));
                }
            }
        }

        if !conditions.is_empty() {
            stmt.sql.push_str(" WHERE ");
            stmt.sql.push_str(&conditions.join(" AND "));
        }
        stmt.sql.push_str(" ORDER BY n.id, t.id");
        stmt
    }
}

/// Build the `UPDATE notes` statement for the column fields of a patch.
/// Returns `None` when the patch touches no column (tags only, or nothing).
pub fn update_note_statement(id: i64, update: &UpdateNote) -> Option<Statement> {
    let mut stmt = Statement::new("UPDATE notes SET ");
    let mut assignments = Vec::new();

    if let Some(ref title) = update.title {
        let p = stmt.bind(title.as_str());
        assignments.push(format!("title = {}", p));
    }
    if let Some(ref content) = update.content {
        let p = stmt.bind(content.clone());
        assignments.push(format!("content = {}", p));
    }
    if let Some(folder_id) = update.folder_id {
        let p = stmt.bind(folder_id);
        assignments.push(format!("folder_id = {}", p));
    }

    if assignments.is_empty() {
        return None;
    }

    stmt.sql.push_str(&assignments.join(", "));
    let p = stmt.bind(id);
    stmt.sql.push_str(&format!(" WHERE id = {}", p));
    Some(stmt)
}

/// Escape LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
