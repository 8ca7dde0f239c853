use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use chorus_shared::errors::{AppError, ErrorCode};

use crate::schema::notifications;

pub const DEFAULT_CATEGORY: &str = "system";

/// Placeholder used in grouping keys when the payload lacks the keyed field.
pub const UNKNOWN_KEY_PART: &str = "unknown";

/// A `notifications` row exactly as stored.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = notifications)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            notification_type: notification_type.into(),
            category: DEFAULT_CATEGORY.to_string(),
            title: title.into(),
            body: body.into(),
            data: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        if self.category.is_empty() {
            self.category = DEFAULT_CATEGORY.to_string();
        }
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Reject drafts that could never be read back as a [`Notification`].
    pub fn validate(&self) -> Result<(), AppError> {
        NotificationKind::decode(&self.notification_type, self.data.as_ref())
            .map(|_| ())
            .map_err(AppError::Validation)
    }
}

/// Notification type with its strongly-typed payload.
///
/// Payload fields are optional: older rows and third-party producers are not
/// guaranteed to carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Message { conversation_id: Option<String> },
    Like { target_id: Option<String> },
    Comment { target_id: Option<String> },
    Follow { actor_id: Option<String> },
    Login { device_info: Option<String> },
    Achievement { achievement_type: Option<String> },
    /// Any type outside the known set, kept verbatim.
    Other(String),
}

impl NotificationKind {
    /// Build a kind from the stored type string and its `data` payload.
    ///
    /// Returns the reason on malformed input: an empty type, a non-object
    /// payload, or a keyed field that is neither a string nor a number.
    pub fn decode(notification_type: &str, data: Option<&Value>) -> Result<Self, String> {
        if notification_type.is_empty() {
            return Err("type is empty".to_string());
        }

        let payload = match data {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(format!("data must be an object, got {}", json_type(other)));
            }
        };
        let field = |name: &str| payload_field(payload, name);

        Ok(match notification_type {
            "message" => Self::Message { conversation_id: field("conversation_id")? },
            "like" => Self::Like { target_id: field("target_id")? },
            "comment" => Self::Comment { target_id: field("target_id")? },
            "follow" => Self::Follow { actor_id: field("actor_id")? },
            "login" => Self::Login { device_info: field("device_info")? },
            "achievement" => Self::Achievement { achievement_type: field("achievement_type")? },
            other => Self::Other(other.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Message { .. } => "message",
            Self::Like { .. } => "like",
            Self::Comment { .. } => "comment",
            Self::Follow { .. } => "follow",
            Self::Login { .. } => "login",
            Self::Achievement { .. } => "achievement",
            Self::Other(raw) => raw,
        }
    }

    /// Key under which notifications collapse into one group.
    ///
    /// Unrecognized types group by the bare type string, so every
    /// notification of such a type shares a single group.
    pub fn group_key(&self) -> String {
        let part = match self {
            Self::Message { conversation_id: part }
            | Self::Like { target_id: part }
            | Self::Comment { target_id: part }
            | Self::Follow { actor_id: part }
            | Self::Login { device_info: part }
            | Self::Achievement { achievement_type: part } => part,
            Self::Other(raw) => return raw.clone(),
        };

        format!("{}_{}", self.as_str(), part.as_deref().unwrap_or(UNKNOWN_KEY_PART))
    }
}

impl Serialize for NotificationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn payload_field(payload: Option<&Map<String, Value>>, name: &str) -> Result<Option<String>, String> {
    match payload.and_then(|p| p.get(name)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!(
            "data.{name} must be a string or number, got {}",
            json_type(other)
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A stored row that cannot be decoded into a [`Notification`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed notification {id}: {reason}")]
pub struct ContractViolation {
    pub id: Uuid,
    pub reason: String,
}

impl From<ContractViolation> for AppError {
    fn from(err: ContractViolation) -> Self {
        AppError::with_details(
            ErrorCode::NotificationMalformed,
            err.to_string(),
            serde_json::json!({ "notification_id": err.id }),
        )
    }
}

/// A decoded notification, as served to clients and fed to grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub category: String,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = ContractViolation;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::decode(&row.notification_type, row.data.as_ref())
            .map_err(|reason| ContractViolation { id: row.id, reason })?;

        let category = if row.category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            row.category
        };

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind,
            category,
            title: row.title,
            body: row.body,
            data: row.data,
            read: row.is_read,
            created_at: row.created_at,
        })
    }
}

/// Decode a batch, failing on the first malformed row.
pub fn decode_rows(rows: Vec<NotificationRow>) -> Result<Vec<Notification>, ContractViolation> {
    rows.into_iter().map(Notification::try_from).collect()
}
