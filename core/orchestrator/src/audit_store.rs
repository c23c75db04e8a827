use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::audit_entry::ClinicianOverride;
use domain::{AuditAction, AuditEntry};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

const REDACTED: &str = "[REDACTED]";
const REDACTION_KEYS: &[&str] = &["name", "email", "phone", "ssn", "address", "dob"];

#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("failed to open audit store: {0}")]
    Open(String),
    #[error("audit write failed: {0}")]
    Write(String),
    #[error("audit entry not found: {0}")]
    NotFound(String),
}

/// Recursively replaces the value of any map key whose lowercased form is
/// in the redaction set with `[REDACTED]`, per §4.5 point 1.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if REDACTION_KEYS.contains(&k.to_lowercase().as_str()) {
                    out.insert(k.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

pub fn hash_user_id(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[derive(Debug, Default)]
pub struct AuditFilters {
    pub handler: Option<String>,
    pub user_hash: Option<String>,
    pub min_confidence_percent: Option<u8>,
    pub escalations_only: bool,
    pub since_hours: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AuditEntrySummary {
    pub audit_id: String,
    pub handler_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub confidence_score: Option<u8>,
    pub escalation_triggered: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditSummary {
    pub summary_text: String,
    pub handler_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub requires_review: bool,
    pub explainability_score: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ExplainabilityStats {
    pub average_score: f64,
    pub high: u32,
    pub moderate: u32,
    pub low: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerStatistics {
    pub handler_name: String,
    pub total_queries: u64,
    pub escalations: u64,
    pub clinician_overrides: u64,
    pub average_confidence: f64,
    pub override_rate_percent: f64,
}

/// Write-mostly append store for `AuditEntry` records, backed by SQLite
/// behind a pooled connection manager. Audit ids are strictly increasing
/// within this process via an in-memory atomic counter; the counter is
/// seeded from the existing table's max id at startup so restarts don't
/// collide with prior entries in the same file.
pub struct AuditStore {
    pool: Pool<SqliteConnectionManager>,
    next_id: Arc<AtomicU64>,
}

impl AuditStore {
    pub fn open(dsn: &str) -> Result<Self, AuditStoreError> {
        let path = dsn.strip_prefix("sqlite://").unwrap_or(dsn);
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(10)
            .min_idle(Some(1))
            .build(manager)
            .map_err(|e| AuditStoreError::Open(e.to_string()))?;

        let conn = pool.get().map_err(|e| AuditStoreError::Open(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_entries (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                user_id_hash TEXT NOT NULL,
                handler_name TEXT,
                action TEXT NOT NULL,
                input_data TEXT NOT NULL,
                output_data TEXT NOT NULL,
                confidence_score INTEGER,
                explainability_score INTEGER,
                reasoning_summary TEXT,
                decision_factors TEXT,
                alternatives TEXT,
                escalation_triggered TEXT,
                safety_flags TEXT,
                clinician_override TEXT,
                reviewed_by_hash TEXT,
                review_timestamp TEXT,
                review_notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_audit_handler ON audit_entries(handler_name);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_entries(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_escalation ON audit_entries(escalation_triggered);",
        )
        .map_err(|e| AuditStoreError::Open(e.to_string()))?;

        let max_id: i64 = conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM audit_entries", [], |row| row.get(0))
            .map_err(|e| AuditStoreError::Open(e.to_string()))?;

        Ok(Self {
            pool,
            next_id: Arc::new(AtomicU64::new(max_id as u64 + 1)),
        })
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// The §4.5 write path: redacts input, hashes the user id, assembles
    /// an `AuditEntry`, and commits it. Returns the human-readable id.
    pub async fn record(&self, entry: AuditEntry) -> Result<String, AuditStoreError> {
        let pool = self.pool.clone();
        let audit_id = AuditEntry::format_id(entry.timestamp, entry.id);
        let entry_clone = entry;
        tokio::task::spawn_blocking(move || insert_entry(&pool, &entry_clone))
            .await
            .map_err(|e| AuditStoreError::Write(e.to_string()))??;
        Ok(audit_id)
    }

    pub fn next_entry_id(&self) -> u64 {
        self.allocate_id()
    }

    pub async fn get_full(&self, audit_id: &str) -> Result<AuditEntry, AuditStoreError> {
        let numeric_id = numeric_suffix(audit_id)?;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || fetch_entry(&pool, numeric_id))
            .await
            .map_err(|e| AuditStoreError::Write(e.to_string()))?
    }

    pub async fn get_summary(&self, audit_id: &str) -> Result<AuditSummary, AuditStoreError> {
        let entry = self.get_full(audit_id).await?;
        Ok(render_summary(&entry))
    }

    pub async fn list(&self, filters: AuditFilters) -> Result<Vec<AuditEntrySummary>, AuditStoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || list_entries(&pool, &filters))
            .await
            .map_err(|e| AuditStoreError::Write(e.to_string()))?
    }

    pub async fn mark_reviewed(
        &self,
        audit_id: &str,
        clinician_id: &str,
        notes: Option<String>,
        override_flag: bool,
        override_reason: Option<String>,
    ) -> Result<(), AuditStoreError> {
        if override_flag && override_reason.is_none() {
            return Err(AuditStoreError::Write(
                "override=true requires override_reason".to_string(),
            ));
        }

        let numeric_id = numeric_suffix(audit_id)?;
        let pool = self.pool.clone();
        let clinician_hash = hash_user_id(clinician_id);
        let review_timestamp = Utc::now();
        let override_record = if override_flag {
            Some(ClinicianOverride {
                clinician_id_hash: clinician_hash.clone(),
                timestamp: review_timestamp,
                reason: override_reason.clone().unwrap_or_default(),
                new_decision: override_reason.unwrap_or_default(),
            })
        } else {
            None
        };

        tokio::task::spawn_blocking(move || {
            apply_review(&pool, numeric_id, &clinician_hash, notes, review_timestamp, override_record)
        })
        .await
        .map_err(|e| AuditStoreError::Write(e.to_string()))?
    }

    pub async fn handler_statistics(&self, handler_name: &str) -> Result<HandlerStatistics, AuditStoreError> {
        let pool = self.pool.clone();
        let name = handler_name.to_string();
        tokio::task::spawn_blocking(move || compute_handler_statistics(&pool, &name))
            .await
            .map_err(|e| AuditStoreError::Write(e.to_string()))?
    }

    pub async fn explainability_stats(&self, since_hours: u32) -> Result<ExplainabilityStats, AuditStoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || compute_explainability_stats(&pool, since_hours))
            .await
            .map_err(|e| AuditStoreError::Write(e.to_string()))?
    }
}

fn numeric_suffix(audit_id: &str) -> Result<i64, AuditStoreError> {
    audit_id
        .rsplit('_')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| AuditStoreError::NotFound(audit_id.to_string()))
}

fn insert_entry(
    pool: &Pool<SqliteConnectionManager>,
    entry: &AuditEntry,
) -> Result<(), AuditStoreError> {
    let conn = pool.get().map_err(|e| AuditStoreError::Write(e.to_string()))?;
    conn.execute(
        "INSERT INTO audit_entries (
            id, timestamp, user_id_hash, handler_name, action, input_data, output_data,
            confidence_score, explainability_score, reasoning_summary, decision_factors,
            alternatives, escalation_triggered, safety_flags, clinician_override,
            reviewed_by_hash, review_timestamp, review_notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        rusqlite::params![
            entry.id as i64,
            entry.timestamp.to_rfc3339(),
            entry.user_id_hash,
            entry.handler_name,
            entry.action.as_str(),
            Value::Object(entry.input_data.clone()).to_string(),
            Value::Object(entry.output_data.clone()).to_string(),
            entry.confidence_score,
            entry.explainability_score,
            entry.reasoning_summary,
            entry.decision_factors.as_ref().map(|v| v.to_string()),
            entry.alternatives.as_ref().map(|v| v.to_string()),
            entry.escalation_triggered,
            entry.safety_flags.as_ref().map(|v| v.to_string()),
            entry
                .clinician_override
                .as_ref()
                .map(|o| serde_json::to_string(o).unwrap_or_default()),
            entry.reviewed_by_hash,
            entry.review_timestamp.map(|t| t.to_rfc3339()),
            entry.review_notes,
        ],
    )
    .map_err(|e| AuditStoreError::Write(e.to_string()))?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditEntry> {
    let action_str: String = row.get("action")?;
    let action = match action_str.as_str() {
        "safety_violation" => AuditAction::SafetyViolation,
        "clinician_override" => AuditAction::ClinicianOverride,
        _ => AuditAction::AgentQuery,
    };
    let input_data_raw: String = row.get("input_data")?;
    let output_data_raw: String = row.get("output_data")?;
    let decision_factors_raw: Option<String> = row.get("decision_factors")?;
    let alternatives_raw: Option<String> = row.get("alternatives")?;
    let safety_flags_raw: Option<String> = row.get("safety_flags")?;
    let clinician_override_raw: Option<String> = row.get("clinician_override")?;
    let timestamp_raw: String = row.get("timestamp")?;
    let review_timestamp_raw: Option<String> = row.get("review_timestamp")?;

    Ok(AuditEntry {
        id: row.get::<_, i64>("id")? as u64,
        timestamp: DateTime::parse_from_rfc3339(&timestamp_raw)
            .unwrap()
            .with_timezone(&Utc),
        user_id_hash: row.get("user_id_hash")?,
        handler_name: row.get("handler_name")?,
        action,
        input_data: serde_json::from_str(&input_data_raw).unwrap_or_default(),
        output_data: serde_json::from_str(&output_data_raw).unwrap_or_default(),
        confidence_score: row.get("confidence_score")?,
        explainability_score: row.get("explainability_score")?,
        reasoning_summary: row.get("reasoning_summary")?,
        decision_factors: decision_factors_raw.and_then(|s| serde_json::from_str(&s).ok()),
        alternatives: alternatives_raw.and_then(|s| serde_json::from_str(&s).ok()),
        escalation_triggered: row.get("escalation_triggered")?,
        safety_flags: safety_flags_raw.and_then(|s| serde_json::from_str(&s).ok()),
        clinician_override: clinician_override_raw.and_then(|s| serde_json::from_str(&s).ok()),
        reviewed_by_hash: row.get("reviewed_by_hash")?,
        review_timestamp: review_timestamp_raw
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        review_notes: row.get("review_notes")?,
    })
}

fn fetch_entry(pool: &Pool<SqliteConnectionManager>, id: i64) -> Result<AuditEntry, AuditStoreError> {
    let conn = pool.get().map_err(|e| AuditStoreError::Write(e.to_string()))?;
    conn.query_row("SELECT * FROM audit_entries WHERE id = ?1", [id], row_to_entry)
        .map_err(|_| AuditStoreError::NotFound(id.to_string()))
}

fn list_entries(
    pool: &Pool<SqliteConnectionManager>,
    filters: &AuditFilters,
) -> Result<Vec<AuditEntrySummary>, AuditStoreError> {
    let conn = pool.get().map_err(|e| AuditStoreError::Write(e.to_string()))?;
    let mut sql = String::from(
        "SELECT id, timestamp, handler_name, user_id_hash, confidence_score, escalation_triggered \
         FROM audit_entries WHERE 1=1",
    );
    if filters.handler.is_some() {
        sql.push_str(" AND handler_name = :handler");
    }
    if filters.user_hash.is_some() {
        sql.push_str(" AND user_id_hash = :user_hash");
    }
    if let Some(min) = filters.min_confidence_percent {
        sql.push_str(&format!(" AND confidence_score >= {min}"));
    }
    if filters.escalations_only {
        sql.push_str(" AND escalation_triggered IS NOT NULL");
    }
    if let Some(hours) = filters.since_hours {
        let since = Utc::now() - chrono::Duration::hours(hours as i64);
        sql.push_str(&format!(" AND timestamp >= '{}'", since.to_rfc3339()));
    }
    sql.push_str(" ORDER BY id DESC");
    let limit = filters.limit.unwrap_or(50).clamp(1, 500);
    sql.push_str(&format!(" LIMIT {limit}"));

    let mut stmt = conn.prepare(&sql).map_err(|e| AuditStoreError::Write(e.to_string()))?;
    let mut named_params: Vec<(&str, &dyn rusqlite::ToSql)> = Vec::new();
    if let Some(h) = &filters.handler {
        named_params.push((":handler", h));
    }
    if let Some(u) = &filters.user_hash {
        named_params.push((":user_hash", u));
    }

    let rows = stmt
        .query_map(named_params.as_slice(), |row| {
            let timestamp_raw: String = row.get("timestamp")?;
            Ok(AuditEntrySummary {
                audit_id: AuditEntry::format_id(
                    DateTime::parse_from_rfc3339(&timestamp_raw).unwrap().with_timezone(&Utc),
                    row.get::<_, i64>("id")? as u64,
                ),
                handler_name: row.get("handler_name")?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_raw).unwrap().with_timezone(&Utc),
                confidence_score: row.get("confidence_score")?,
                escalation_triggered: row.get("escalation_triggered")?,
            })
        })
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| AuditStoreError::Write(e.to_string()))
}

fn apply_review(
    pool: &Pool<SqliteConnectionManager>,
    id: i64,
    clinician_hash: &str,
    notes: Option<String>,
    review_timestamp: DateTime<Utc>,
    override_record: Option<ClinicianOverride>,
) -> Result<(), AuditStoreError> {
    let conn = pool.get().map_err(|e| AuditStoreError::Write(e.to_string()))?;
    let override_json = override_record
        .as_ref()
        .map(|o| serde_json::to_string(o).unwrap_or_default());
    let updated = conn
        .execute(
            "UPDATE audit_entries SET reviewed_by_hash = ?1, review_timestamp = ?2, review_notes = ?3, \
             clinician_override = COALESCE(?4, clinician_override) WHERE id = ?5",
            rusqlite::params![
                clinician_hash,
                review_timestamp.to_rfc3339(),
                notes,
                override_json,
                id,
            ],
        )
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;
    if updated == 0 {
        return Err(AuditStoreError::NotFound(id.to_string()));
    }
    Ok(())
}

fn render_summary(entry: &AuditEntry) -> AuditSummary {
    let mut text = String::new();
    text.push_str(&format!(
        "Audit Entry {}\n",
        AuditEntry::format_id(entry.timestamp, entry.id)
    ));
    text.push_str(&format!("Handler: {}\n", entry.handler_name.as_deref().unwrap_or("n/a")));
    text.push_str(&format!("Timestamp: {}\n", entry.timestamp.to_rfc3339()));
    if let Some(score) = entry.confidence_score {
        text.push_str(&format!("Confidence: {score}%\n"));
    }
    if let Some(summary) = &entry.reasoning_summary {
        text.push_str(&format!("Reasoning: {summary}\n"));
    }
    if let Some(Value::Array(factors)) = &entry.decision_factors {
        for factor in factors {
            if let Some(obj) = factor.as_object() {
                let importance = obj.get("importance").and_then(Value::as_str).unwrap_or("moderate");
                let name = obj.get("factor").and_then(Value::as_str).unwrap_or("factor");
                let value = obj.get("value").and_then(Value::as_str).unwrap_or("");
                text.push_str(&format!("[{}] {}: {}\n", importance.to_uppercase(), name, value));
            }
        }
    }
    if let Some(Value::Array(alts)) = &entry.alternatives {
        for alt in alts {
            if let Some(s) = alt.as_str() {
                text.push_str(&format!("Alternative: {s}\n"));
            }
        }
    }
    text.push_str(&format!(
        "Escalation: {}\n",
        entry.escalation_triggered.as_deref().unwrap_or("none")
    ));
    text.push_str(&format!(
        "Clinician override present: {}\n",
        entry.clinician_override.is_some()
    ));
    if let Some(score) = entry.explainability_score {
        text.push_str(&format!("Explainability score: {score}\n"));
    }

    AuditSummary {
        summary_text: text,
        handler_name: entry.handler_name.clone(),
        timestamp: entry.timestamp,
        requires_review: entry.escalation_triggered.is_some(),
        explainability_score: entry.explainability_score,
    }
}

fn compute_handler_statistics(
    pool: &Pool<SqliteConnectionManager>,
    handler_name: &str,
) -> Result<HandlerStatistics, AuditStoreError> {
    let conn = pool.get().map_err(|e| AuditStoreError::Write(e.to_string()))?;

    let total_queries: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM audit_entries WHERE handler_name = ?1",
            [handler_name],
            |r| r.get(0),
        )
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;

    let escalations: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM audit_entries WHERE handler_name = ?1 AND escalation_triggered IS NOT NULL",
            [handler_name],
            |r| r.get(0),
        )
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;

    let overrides: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM audit_entries WHERE handler_name = ?1 AND clinician_override IS NOT NULL",
            [handler_name],
            |r| r.get(0),
        )
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;

    let average_confidence: Option<f64> = conn
        .query_row(
            "SELECT AVG(confidence_score) FROM audit_entries WHERE handler_name = ?1 AND confidence_score IS NOT NULL",
            [handler_name],
            |r| r.get(0),
        )
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;

    let override_rate = if total_queries > 0 {
        (overrides as f64 / total_queries as f64) * 100.0
    } else {
        0.0
    };

    Ok(HandlerStatistics {
        handler_name: handler_name.to_string(),
        total_queries: total_queries as u64,
        escalations: escalations as u64,
        clinician_overrides: overrides as u64,
        average_confidence: average_confidence.unwrap_or(0.0),
        override_rate_percent: override_rate,
    })
}

fn compute_explainability_stats(
    pool: &Pool<SqliteConnectionManager>,
    since_hours: u32,
) -> Result<ExplainabilityStats, AuditStoreError> {
    let conn = pool.get().map_err(|e| AuditStoreError::Write(e.to_string()))?;
    let since = Utc::now() - chrono::Duration::hours(since_hours as i64);

    let mut stmt = conn
        .prepare(
            "SELECT explainability_score FROM audit_entries \
             WHERE explainability_score IS NOT NULL AND timestamp >= ?1",
        )
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;
    let scores: Vec<i64> = stmt
        .query_map([since.to_rfc3339()], |row| row.get(0))
        .map_err(|e| AuditStoreError::Write(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AuditStoreError::Write(e.to_string()))?;

    let total = scores.len() as u32;
    let average = if total > 0 {
        scores.iter().sum::<i64>() as f64 / total as f64
    } else {
        0.0
    };
    let high = scores.iter().filter(|s| **s >= 80).count() as u32;
    let moderate = scores.iter().filter(|s| **s >= 50 && **s < 80).count() as u32;
    let low = scores.iter().filter(|s| **s < 50).count() as u32;

    Ok(ExplainabilityStats {
        average_score: average,
        high,
        moderate,
        low,
        total,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    fn sample_entry(id: u64, handler: &str) -> AuditEntry {
        let mut input_data = Map::new();
        input_data.insert("message".to_string(), Value::String("hello".to_string()));
        AuditEntry {
            id,
            timestamp: Utc::now(),
            user_id_hash: hash_user_id("user-1"),
            handler_name: Some(handler.to_string()),
            action: AuditAction::AgentQuery,
            input_data,
            output_data: Map::new(),
            confidence_score: Some(80),
            explainability_score: Some(70),
            reasoning_summary: Some("because reasons".to_string()),
            decision_factors: None,
            alternatives: None,
            escalation_triggered: None,
            safety_flags: None,
            clinician_override: None,
            reviewed_by_hash: None,
            review_timestamp: None,
            review_notes: None,
        }
    }

    fn temp_store() -> (AuditStore, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp file");
        let path = file.path().to_str().unwrap().to_string();
        let store = AuditStore::open(&path).expect("open store");
        (store, file)
    }

    #[test]
    fn redact_replaces_closed_key_set_recursively() {
        let input = json!({
            "message": "hi",
            "context": {
                "email": "a@b.com",
                "nested": {"ssn": "123-45-6789", "other": "kept"}
            },
            "attachments": [{"name": "file.pdf"}]
        });
        let redacted = redact(&input);
        let s = redacted.to_string();
        assert!(!s.contains("a@b.com"));
        assert!(!s.contains("123-45-6789"));
        assert!(!s.contains("file.pdf"));
        assert!(s.contains("kept"));
        assert_eq!(redacted["context"]["email"], json!(REDACTED));
        assert_eq!(redacted["context"]["nested"]["ssn"], json!(REDACTED));
    }

    #[test]
    fn hash_user_id_is_16_hex_chars() {
        let hash = hash_user_id("patient-42");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn ids_are_strictly_increasing_and_unique() {
        let (store, _f) = temp_store();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let id = store.next_entry_id();
            let entry = sample_entry(id, "triage");
            let audit_id = store.record(entry).await.expect("record");
            ids.push(audit_id);
        }
        let mut seen = std::collections::HashSet::new();
        for id in &ids {
            assert!(seen.insert(id.clone()), "duplicate audit id {id}");
        }
        let numeric: Vec<i64> = ids.iter().map(|s| numeric_suffix(s).unwrap()).collect();
        for window in numeric.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[tokio::test]
    async fn record_then_get_full_round_trips() {
        let (store, _f) = temp_store();
        let id = store.next_entry_id();
        let entry = sample_entry(id, "triage");
        let audit_id = store.record(entry).await.expect("record");
        let fetched = store.get_full(&audit_id).await.expect("get_full");
        assert_eq!(fetched.handler_name.as_deref(), Some("triage"));
        assert_eq!(fetched.confidence_score, Some(80));
    }

    #[tokio::test]
    async fn mark_reviewed_requires_override_reason_when_override_true() {
        let (store, _f) = temp_store();
        let id = store.next_entry_id();
        let entry = sample_entry(id, "triage");
        let audit_id = store.record(entry).await.expect("record");
        let result = store
            .mark_reviewed(&audit_id, "clinician-1", None, true, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mark_reviewed_with_override_reason_succeeds() {
        let (store, _f) = temp_store();
        let id = store.next_entry_id();
        let entry = sample_entry(id, "triage");
        let audit_id = store.record(entry).await.expect("record");
        store
            .mark_reviewed(
                &audit_id,
                "clinician-1",
                Some("looks fine".to_string()),
                true,
                Some("disagree with urgency".to_string()),
            )
            .await
            .expect("mark reviewed");

        let fetched = store.get_full(&audit_id).await.expect("get_full");
        assert!(fetched.clinician_override.is_some());
        assert_eq!(fetched.review_notes.as_deref(), Some("looks fine"));
    }

    #[tokio::test]
    async fn list_filters_by_handler() {
        let (store, _f) = temp_store();
        for handler in ["triage", "communication", "triage"] {
            let id = store.next_entry_id();
            store.record(sample_entry(id, handler)).await.expect("record");
        }
        let results = store
            .list(AuditFilters {
                handler: Some("triage".to_string()),
                ..Default::default()
            })
            .await
            .expect("list");
        assert_eq!(results.len(), 2);
    }
}
