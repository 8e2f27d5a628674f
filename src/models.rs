use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-assigned session identifier. The backend emits integers, but the
/// client only ever echoes it back in URLs, so any scalar is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => SessionId::from(n),
            RawId::Text(s) => SessionId(s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub session_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: String,
    #[serde(default, deserialize_with = "nullable")]
    pub total_duration: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub pomodoros_completed: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub pomodoros_interrupted: u32,
    #[serde(default, deserialize_with = "timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.end_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartSession {
    pub session_name: String,
}

/// Partial update body. Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pomodoros_completed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pomodoros_interrupted: Option<u32>,
}

impl SessionUpdate {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCompletion {
    /// Whole minutes of work-phase time.
    pub total_duration: u32,
    pub pomodoros_completed: u32,
    pub notes: String,
}

impl SessionCompletion {
    pub fn from_study_secs(total_study_secs: u64, pomodoros_completed: u32, notes: String) -> Self {
        let minutes = total_study_secs / 60;
        Self {
            total_duration: u32::try_from(minutes).unwrap_or(u32::MAX),
            pomodoros_completed,
            notes,
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The backend writes naive UTC timestamps (`2024-03-01T09:15:00.123456`).
fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn decodes_backend_session_record() {
        let raw = json!({
            "id": 7,
            "session_name": "Algebra",
            "start_time": "2024-03-01T09:15:00.123456",
            "end_time": null,
            "total_duration": 0,
            "pomodoros_completed": 2,
            "pomodoros_interrupted": 1,
            "notes": "quadratics",
            "created_at": "2024-03-01T09:15:00.123456",
            "updated_at": "2024-03-01T10:00:00"
        });

        let session: Session = serde_json::from_value(raw).unwrap();
        assert_eq!(session.id, SessionId::from(7));
        assert_eq!(session.session_name, "Algebra");
        assert_eq!(session.pomodoros_completed, 2);
        assert_eq!(session.pomodoros_interrupted, 1);
        assert!(!session.is_completed());

        let created = session.created_at.unwrap();
        assert_eq!((created.year(), created.month(), created.day()), (2024, 3, 1));
        assert_eq!((created.hour(), created.minute()), (9, 15));
    }

    #[test]
    fn nulls_and_missing_fields_fall_back_to_defaults() {
        let raw = json!({
            "id": "abc",
            "session_name": "History",
            "notes": null,
            "total_duration": null,
            "created_at": "not a date"
        });

        let session: Session = serde_json::from_value(raw).unwrap();
        assert_eq!(session.id.as_str(), "abc");
        assert_eq!(session.notes, "");
        assert_eq!(session.total_duration, 0);
        assert_eq!(session.pomodoros_completed, 0);
        assert_eq!(session.created_at, None);
    }

    #[test]
    fn rfc3339_timestamps_are_accepted() {
        let parsed = parse_timestamp("2024-03-01T09:15:00+02:00").unwrap();
        assert_eq!(parsed.hour(), 7);
    }

    #[test]
    fn partial_update_omits_absent_fields() {
        let body = serde_json::to_value(SessionUpdate::notes("abcd")).unwrap();
        assert_eq!(body, json!({ "notes": "abcd" }));

        let counters = SessionUpdate {
            notes: None,
            pomodoros_completed: Some(3),
            pomodoros_interrupted: Some(0),
        };
        assert_eq!(
            serde_json::to_value(counters).unwrap(),
            json!({ "pomodoros_completed": 3, "pomodoros_interrupted": 0 })
        );
    }

    #[test]
    fn completion_floors_study_time_to_minutes() {
        let completion = SessionCompletion::from_study_secs(1530, 1, "n".into());
        assert_eq!(completion.total_duration, 25);

        let short = SessionCompletion::from_study_secs(59, 0, String::new());
        assert_eq!(short.total_duration, 0);
    }
}
