//! Read-only catalog gateway over the course database.
//!
//! Results are projections of catalog rows; no derived text is produced
//! here. Missing rows yield `None`/empty, never a fabricated record, and DB
//! error strings never travel past the tool boundary. The only write surface
//! is the append-only interaction log.
//!
//! Numeric columns are tolerated as TEXT or numeric ("480", 480, "297.00")
//! and coerced at row-mapping time; unusable values map to `None` so the
//! renderers fall back to the fixed placeholder.

use crate::error::CoreResult;
use crate::render;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct Course {
    pub id: String,
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub level: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub total_duration_min: Option<i64>,
    pub session_count: Option<i64>,
    pub status: Option<String>,
    pub subtheme_id: Option<String>,
    pub syllabus_url: Option<String>,
    pub course_url: Option<String>,
    pub purchase_url: Option<String>,
    pub audience_category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub course_id: String,
    pub session_index: Option<i64>,
    pub title: Option<String>,
    pub objective: Option<String>,
    pub duration_minutes: Option<i64>,
    pub modality: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Practice {
    pub id: String,
    pub session_id: String,
    pub practice_index: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<i64>,
    pub is_mandatory: bool,
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Deliverable {
    pub id: String,
    pub session_id: String,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub resource_url: Option<String>,
    pub is_mandatory: bool,
}

#[derive(Debug, Clone)]
pub struct Bonus {
    pub id: String,
    pub course_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub original_value: Option<f64>,
    pub expires_at: Option<String>,
    pub max_claims: Option<i64>,
    pub current_claims: Option<i64>,
    pub active: bool,
}

impl Bonus {
    /// Claims still available, when both bounds are known.
    pub fn remaining_claims(&self) -> Option<i64> {
        match (self.max_claims, self.current_claims) {
            (Some(max), Some(cur)) => Some((max - cur).max(0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FreeResource {
    pub id: String,
    pub course_id: String,
    pub resource_name: Option<String>,
    pub resource_type: Option<String>,
    pub resource_url: Option<String>,
    pub resource_description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct PaymentInfo {
    pub company_name: Option<String>,
    pub bank_name: Option<String>,
    pub clabe_account: Option<String>,
    pub rfc: Option<String>,
    pub cfdi_usage: Option<String>,
    pub cfdi_description: Option<String>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Coercion-tolerant column accessors
// ---------------------------------------------------------------------------

fn text_col(row: &Row, idx: usize) -> Option<String> {
    match row.get_ref(idx).ok()? {
        ValueRef::Text(t) => std::str::from_utf8(t).ok().map(|s| s.to_string()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

fn f64_col(row: &Row, idx: usize) -> Option<f64> {
    match row.get_ref(idx).ok()? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(render::f64_from_str),
        _ => None,
    }
}

fn i64_col(row: &Row, idx: usize) -> Option<i64> {
    f64_col(row, idx).map(|f| f as i64)
}

fn bool_col(row: &Row, idx: usize) -> bool {
    match row.get_ref(idx) {
        Ok(ValueRef::Integer(i)) => i != 0,
        Ok(ValueRef::Text(t)) => matches!(
            std::str::from_utf8(t).unwrap_or("").trim().to_lowercase().as_str(),
            "1" | "true" | "yes"
        ),
        _ => false,
    }
}

const COURSE_COLUMNS: &str = "id, name, short_description, long_description, level, price, \
     currency, total_duration_min, session_count, status, subtheme_id, syllabus_url, \
     course_url, purchase_url, audience_category";

fn map_course(row: &Row) -> Course {
    Course {
        id: text_col(row, 0).unwrap_or_default(),
        name: text_col(row, 1),
        short_description: text_col(row, 2),
        long_description: text_col(row, 3),
        level: text_col(row, 4),
        price: f64_col(row, 5),
        currency: text_col(row, 6),
        total_duration_min: i64_col(row, 7),
        session_count: i64_col(row, 8),
        status: text_col(row, 9),
        subtheme_id: text_col(row, 10),
        syllabus_url: text_col(row, 11),
        course_url: text_col(row, 12),
        purchase_url: text_col(row, 13),
        audience_category: text_col(row, 14),
    }
}

/// Read-shared gateway; the connection sits behind a mutex because queries
/// are short and the turn pipeline is cooperative.
pub struct CatalogGateway {
    conn: Mutex<Connection>,
}

impl CatalogGateway {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Wraps an existing connection (tests use in-memory databases).
    pub fn from_connection(conn: Connection) -> CoreResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS interaction_log (
                 lead_id INTEGER NOT NULL,
                 course_id TEXT,
                 interaction_type TEXT NOT NULL,
                 metadata TEXT,
                 created_at TEXT NOT NULL
             )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn get_course(&self, id: &str) -> CoreResult<Option<Course>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLUMNS))?;
        let mut rows = stmt.query_map([id], |row| Ok(map_course(row)))?;
        Ok(rows.next().transpose()?)
    }

    pub fn search_courses(&self, text: &str) -> CoreResult<Vec<Course>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let pattern = format!("%{}%", text.trim());
        let mut stmt = stmt_search(&conn)?;
        let rows = stmt.query_map([&pattern, &pattern], |row| Ok(map_course(row)))?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    pub fn list_sessions(&self, course_id: &str) -> CoreResult<Vec<Session>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, course_id, session_index, title, objective, duration_minutes, modality \
             FROM sessions WHERE course_id = ?1 ORDER BY session_index",
        )?;
        let rows = stmt.query_map([course_id], |row| {
            Ok(Session {
                id: text_col(row, 0).unwrap_or_default(),
                course_id: text_col(row, 1).unwrap_or_default(),
                session_index: i64_col(row, 2),
                title: text_col(row, 3),
                objective: text_col(row, 4),
                duration_minutes: i64_col(row, 5),
                modality: text_col(row, 6),
            })
        })?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    pub fn list_practices(&self, session_id: &str) -> CoreResult<Vec<Practice>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, session_id, practice_index, title, description, duration, is_mandatory, \
             resource_type FROM practices WHERE session_id = ?1 ORDER BY practice_index",
        )?;
        let rows = stmt.query_map([session_id], |row| {
            Ok(Practice {
                id: text_col(row, 0).unwrap_or_default(),
                session_id: text_col(row, 1).unwrap_or_default(),
                practice_index: i64_col(row, 2),
                title: text_col(row, 3),
                description: text_col(row, 4),
                duration: i64_col(row, 5),
                is_mandatory: bool_col(row, 6),
                resource_type: text_col(row, 7),
            })
        })?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    pub fn list_deliverables(&self, session_id: &str) -> CoreResult<Vec<Deliverable>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, session_id, name, type, resource_url, is_mandatory \
             FROM deliverables WHERE session_id = ?1",
        )?;
        let rows = stmt.query_map([session_id], |row| {
            Ok(Deliverable {
                id: text_col(row, 0).unwrap_or_default(),
                session_id: text_col(row, 1).unwrap_or_default(),
                name: text_col(row, 2),
                kind: text_col(row, 3),
                resource_url: text_col(row, 4),
                is_mandatory: bool_col(row, 5),
            })
        })?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    pub fn list_bonuses(&self, course_id: &str) -> CoreResult<Vec<Bonus>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, course_id, name, description, original_value, expires_at, max_claims, \
             current_claims, active FROM bonuses WHERE course_id = ?1 AND active = 1",
        )?;
        let rows = stmt.query_map([course_id], |row| {
            Ok(Bonus {
                id: text_col(row, 0).unwrap_or_default(),
                course_id: text_col(row, 1).unwrap_or_default(),
                name: text_col(row, 2),
                description: text_col(row, 3),
                original_value: f64_col(row, 4),
                expires_at: text_col(row, 5),
                max_claims: i64_col(row, 6),
                current_claims: i64_col(row, 7),
                active: bool_col(row, 8),
            })
        })?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    pub fn list_free_resources(&self, course_id: &str) -> CoreResult<Vec<FreeResource>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, course_id, resource_name, resource_type, resource_url, \
             resource_description, active FROM free_resources \
             WHERE course_id = ?1 AND active = 1",
        )?;
        let rows = stmt.query_map([course_id], |row| {
            Ok(FreeResource {
                id: text_col(row, 0).unwrap_or_default(),
                course_id: text_col(row, 1).unwrap_or_default(),
                resource_name: text_col(row, 2),
                resource_type: text_col(row, 3),
                resource_url: text_col(row, 4),
                resource_description: text_col(row, 5),
                active: bool_col(row, 6),
            })
        })?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    pub fn get_payment_info(&self) -> CoreResult<Option<PaymentInfo>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT company_name, bank_name, clabe_account, rfc, cfdi_usage, cfdi_description, \
             is_active FROM payment_info WHERE is_active = 1 LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], |row| {
            Ok(PaymentInfo {
                company_name: text_col(row, 0),
                bank_name: text_col(row, 1),
                clabe_account: text_col(row, 2),
                rfc: text_col(row, 3),
                cfdi_usage: text_col(row, 4),
                cfdi_description: text_col(row, 5),
                is_active: bool_col(row, 6),
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    /// Append-only interaction log; the gateway's only write.
    pub fn log_interaction(
        &self,
        user_id: i64,
        course_id: Option<&str>,
        interaction_type: &str,
        metadata: &serde_json::Value,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        conn.execute(
            "INSERT INTO interaction_log (lead_id, course_id, interaction_type, metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                user_id,
                course_id,
                interaction_type,
                metadata.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Interaction rows for a user, newest first (policy dedup + tests).
    pub fn interactions_for(&self, user_id: i64) -> CoreResult<Vec<(Option<String>, String)>> {
        let conn = self.conn.lock().expect("catalog lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT course_id, interaction_type FROM interaction_log \
             WHERE lead_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok((text_col(row, 0), text_col(row, 1).unwrap_or_default()))
        })?;
        Ok(rows.filter_map(Result::ok).collect())
    }
}

fn stmt_search<'a>(conn: &'a Connection) -> rusqlite::Result<rusqlite::Statement<'a>> {
    conn.prepare(&format!(
        "SELECT {} FROM courses WHERE status = 'active' AND (name LIKE ?1 OR short_description LIKE ?2)",
        COURSE_COLUMNS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_gateway() -> CatalogGateway {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE courses (id TEXT PRIMARY KEY, name TEXT, short_description TEXT, \
                 long_description TEXT, level TEXT, price TEXT, currency TEXT, \
                 total_duration_min TEXT, session_count INTEGER, status TEXT, subtheme_id TEXT, \
                 syllabus_url TEXT, course_url TEXT, purchase_url TEXT, audience_category TEXT);
             CREATE TABLE sessions (id TEXT, course_id TEXT, session_index INTEGER, title TEXT, \
                 objective TEXT, duration_minutes TEXT, modality TEXT);
             INSERT INTO courses VALUES ('c1', 'Experto en IA', 'GPT y Gemini aplicados', NULL, \
                 'intermedio', '297.00', 'USD', '480', 12, 'active', NULL, \
                 'https://cdn.example.com/temario.pdf', 'https://example.com/c1', NULL, NULL);
             INSERT INTO sessions VALUES ('s2', 'c1', 2, 'Prompting avanzado', 'Dominar prompts', '45', 'online');
             INSERT INTO sessions VALUES ('s1', 'c1', 1, 'Fundamentos', 'Entender la IA', '40', 'online');",
        )
        .unwrap();
        CatalogGateway::from_connection(conn).unwrap()
    }

    #[test]
    fn course_numeric_text_columns_coerce() {
        let catalog = seeded_gateway();
        let course = catalog.get_course("c1").unwrap().unwrap();
        assert_eq!(course.price, Some(297.0));
        assert_eq!(course.total_duration_min, Some(480));
        assert_eq!(course.session_count, Some(12));
        assert!(course.long_description.is_none());
    }

    #[test]
    fn missing_course_is_none_not_fabricated() {
        let catalog = seeded_gateway();
        assert!(catalog.get_course("nope").unwrap().is_none());
    }

    #[test]
    fn sessions_ordered_by_index() {
        let catalog = seeded_gateway();
        let sessions = catalog.list_sessions("c1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_index, Some(1));
        assert_eq!(sessions[0].duration_minutes, Some(40));
    }

    #[test]
    fn interaction_log_round_trip() {
        let catalog = seeded_gateway();
        catalog
            .log_interaction(7, Some("c1"), "show_syllabus", &serde_json::json!({"ok": true}))
            .unwrap();
        let rows = catalog.interactions_for(7).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "show_syllabus");
    }
}
