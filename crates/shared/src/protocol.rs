//! Row shapes exchanged with the hosted `events` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventId, EventRecord, NewEvent, UserId};

/// Body of an insert into the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInsertRow {
    pub title: String,
    pub description: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub created_by: Option<UserId>,
}

impl From<&NewEvent> for EventInsertRow {
    fn from(event: &NewEvent) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            start_time: event.timing.clone(),
            end_time: event.end_time.clone(),
            longitude: event.longitude,
            latitude: event.latitude,
            created_by: event.user_id,
        }
    }
}

/// A row returned by the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            start_time: row.start_time.unwrap_or_default(),
            end_time: row.end_time,
            latitude: row.latitude,
            longitude: row.longitude,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// Error body returned by the REST gateway on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl RestErrorBody {
    pub fn summary(&self) -> String {
        match (&self.message, &self.details) {
            (Some(message), Some(details)) => format!("{message} ({details})"),
            (Some(message), None) => message.clone(),
            (None, Some(details)) => details.clone(),
            (None, None) => "no error details returned".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_row_renames_timing_and_author() {
        let event = NewEvent {
            title: "Rooftop".into(),
            description: "Sunset set".into(),
            timing: "7:00 PM".into(),
            end_time: None,
            latitude: 37.78,
            longitude: -122.43,
            user_id: None,
        };
        let row = serde_json::to_value(EventInsertRow::from(&event)).expect("json");
        assert_eq!(row["start_time"], "7:00 PM");
        assert!(row["created_by"].is_null());
        assert!(row.get("timing").is_none());
    }

    #[test]
    fn sparse_row_decodes_with_defaults() {
        let row: EventRow = serde_json::from_str(
            r#"{"id": 4, "title": "Jam", "latitude": 1.5, "longitude": 2.5}"#,
        )
        .expect("row");
        let record = EventRecord::from(row);
        assert_eq!(record.id, EventId(4));
        assert!(record.description.is_empty());
        assert!(record.created_at.is_none());
    }
}
