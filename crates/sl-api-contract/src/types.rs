//! API contract types for the SessionLens replay service

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::ApiContractError;

/// Event type tag carried by the meta event (viewport dimensions record)
pub const META_EVENT_TYPE: i64 = 4;

/// One captured browser event from a recorded session
///
/// Events are treated as opaque beyond the `type` tag and `timestamp`: the
/// player orders, counts and forwards them, but only the meta event
/// (`type == 4`) is ever inspected, for its viewport dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    #[serde(rename = "type")]
    pub event_type: i64,
    /// Absolute epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordedEvent {
    /// Whether this is the meta event carrying the recorded viewport size
    pub fn is_meta(&self) -> bool {
        self.event_type == META_EVENT_TYPE
    }

    /// Recorded viewport dimensions, present only on meta events
    pub fn viewport(&self) -> Option<(u32, u32)> {
        let data = self.data.as_ref()?;
        let width = data.get("width")?.as_u64()?;
        let height = data.get("height")?.as_u64()?;
        Some((width as u32, height as u32))
    }

    /// Parse a wire frame into an event.
    ///
    /// The backend frames one logical event as a JSON object with exactly one
    /// key of the form `"<n>#<suffix>"`. The value is either a JSON-encoded
    /// string holding the event, or the event object itself.
    pub fn from_frame(frame: Value) -> Result<Self, ApiContractError> {
        let map = match frame {
            Value::Object(map) => map,
            other => {
                return Err(ApiContractError::InvalidFrame(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )));
            }
        };

        if map.len() != 1 {
            return Err(ApiContractError::InvalidFrame(format!(
                "expected exactly one key, got {}",
                map.len()
            )));
        }

        let (key, value) = map.into_iter().next().expect("length checked above");
        if key.split_once('#').is_none() {
            return Err(ApiContractError::InvalidFrame(format!(
                "key {:?} is not of the form \"<n>#<suffix>\"",
                key
            )));
        }

        match value {
            // Double-encoded payload: the event itself is a JSON string
            Value::String(encoded) => Ok(serde_json::from_str(&encoded)?),
            value @ Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(ApiContractError::InvalidFrame(format!(
                "frame value must be a string or object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Coarse classification of an action-list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Error,
    Click,
    Other,
}

/// One significant user action within the recorded session
///
/// `action_tm` is measured in milliseconds relative to the session start,
/// NOT absolute epoch time. Descriptive fields are forwarded verbatim to
/// whatever row UI displays them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionListEntry {
    #[serde(rename = "actionTm")]
    pub action_tm: i64,
    #[serde(rename = "logType", default, skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ActionListEntry {
    pub fn kind(&self) -> ActionKind {
        let Some(log_type) = self.log_type.as_deref() else {
            return ActionKind::Other;
        };
        let lowered = log_type.to_lowercase();
        if lowered.contains("error") {
            ActionKind::Error
        } else if lowered.contains("click") || lowered.contains("tap") {
            ActionKind::Click
        } else {
            ActionKind::Other
        }
    }
}

/// The absolute time window of a recorded session, in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    #[serde(rename = "sessionStartTm")]
    pub start_tm: i64,
    #[serde(rename = "sessionEndTm")]
    pub end_tm: i64,
}

impl SessionWindow {
    pub fn new(start_tm: i64, end_tm: i64) -> Result<Self, ApiContractError> {
        if end_tm < start_tm {
            return Err(ApiContractError::InvalidWindow {
                start: start_tm,
                end: end_tm,
            });
        }
        Ok(Self { start_tm, end_tm })
    }

    /// Total session duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end_tm - self.start_tm
    }

    /// Convert an absolute epoch timestamp to a relative offset,
    /// clamped into `[0, duration]`
    pub fn relative(&self, abs_ms: i64) -> i64 {
        (abs_ms - self.start_tm).clamp(0, self.duration_ms())
    }
}

/// Request body shared by the `actionList` and `stream` endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    #[validate(length(min = 1, message = "Session id cannot be empty"))]
    pub session_id: String,
    #[validate(length(min = 1, message = "Package name cannot be empty"))]
    pub package_nm: String,
    pub server_type: String,
    #[serde(default)]
    pub index: i64,
}

/// Response of the upfront `actionList` request
///
/// The backend is loose about numeric types here: the session window
/// timestamps arrive either as JSON numbers or as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionListResponse {
    #[serde(rename = "actionList", default)]
    pub action_list: Vec<ActionListEntry>,
    #[serde(rename = "sessionStartTm", deserialize_with = "tm_from_value")]
    pub session_start_tm: i64,
    #[serde(rename = "sessionEndTm", deserialize_with = "tm_from_value")]
    pub session_end_tm: i64,
}

impl ActionListResponse {
    pub fn window(&self) -> Result<SessionWindow, ApiContractError> {
        SessionWindow::new(self.session_start_tm, self.session_end_tm)
    }
}

/// Deserialize an epoch-milliseconds value that may arrive as a number
/// or as a decimal string
fn tm_from_value<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("invalid timestamp string: {:?}", s))),
        other => Err(D::Error::custom(format!(
            "timestamp must be a number or string, got {}",
            json_kind(other)
        ))),
    }
}
