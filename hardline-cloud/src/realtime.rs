//! Realtime change payloads pushed by the backend.
//!
//! The backend streams one message per committed row change on a subscribed
//! table. Only the payload shape lives here; the socket transport feeding
//! these into the app is a separate concern.

use chrono::NaiveDate;
use hardline_types::{ChallengeId, EntityType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A committed row change on a remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    pub table: String,
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    /// Row after the change; absent for deletes.
    #[serde(rename = "new", default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    /// Row before the change; for deletes this usually carries only the key columns.
    #[serde(rename = "old", default, skip_serializing_if = "Option::is_none")]
    pub old_record: Option<Value>,
}

impl RemoteChange {
    pub fn entity_type(&self) -> Option<EntityType> {
        EntityType::from_table(&self.table)
    }

    /// The row that identifies this change: the new row, or the old one for deletes.
    fn subject(&self) -> Option<&Value> {
        match self.kind {
            ChangeKind::Delete => self.old_record.as_ref().or(self.record.as_ref()),
            _ => self.record.as_ref().or(self.old_record.as_ref()),
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        self.subject()?.get("id")?.as_str()
    }

    /// `(challenge, date)` of the affected row, when the payload carries them.
    pub fn natural_key(&self) -> Option<(ChallengeId, NaiveDate)> {
        let row = self.subject()?;
        let challenge = row.get("challenge_id")?.as_str()?;
        let date = row.get("date")?.as_str()?.parse::<NaiveDate>().ok()?;
        Some((ChallengeId::new(challenge), date))
    }
}

/// A filtered subscription: one table, optionally narrowed by a column equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSubscription {
    pub table: String,
    pub filter: Option<(String, String)>,
}

impl TableSubscription {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((column.into(), value.into()));
        self
    }

    pub fn matches(&self, change: &RemoteChange) -> bool {
        if change.table != self.table {
            return false;
        }
        let Some((column, value)) = &self.filter else {
            return true;
        };
        change
            .subject()
            .and_then(|row| row.get(column))
            .and_then(Value::as_str)
            .is_some_and(|v| v == value)
    }
}
