use crate::error::MasterError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Probe state reported by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Ok,
    Error,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Ok => write!(f, "ok"),
            EventStatus::Error => write!(f, "error"),
        }
    }
}

/// A probe-emitted state transition, delivered relay → master on
/// `POST /events` as a single object or an array.
///
/// Agents in the wild omit `uuid` and `version`, so both carry defaults;
/// the rest of the schema is enforced by [`Event::validate`] before the
/// router touches the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
    #[serde(default = "default_event_version")]
    pub version: u32,
    pub user: Option<Uuid>,
    /// Milliseconds since the epoch.
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<Uuid>,
    #[serde(rename = "probeUuid")]
    pub probe_uuid: Option<Uuid>,
    /// Probe kind that produced the event; carried opaquely.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub status: Option<EventStatus>,
}

fn default_event_version() -> u32 {
    1
}

impl Event {
    /// Enforce the event schema. Field presence errors are
    /// `MissingParameter`, everything else `InvalidArgument`.
    pub fn validate(&self) -> Result<(), MasterError> {
        if self.user.is_none() {
            return Err(MasterError::missing("user"));
        }
        let time = self.time.ok_or_else(|| MasterError::missing("time"))?;
        if time <= 0 {
            return Err(MasterError::invalid(format!(
                "invalid \"time\": {time} is not a positive ms-epoch time"
            )));
        }
        if self.probe_uuid.is_none() {
            return Err(MasterError::missing("probeUuid"));
        }
        if self.status.is_none() {
            return Err(MasterError::missing("status"));
        }
        Ok(())
    }

    pub fn user(&self) -> Uuid {
        self.user.unwrap_or_default()
    }

    pub fn time_ms(&self) -> i64 {
        self.time.unwrap_or_default()
    }
}
