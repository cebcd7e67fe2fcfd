use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::UserId;

pub const WEBHOOK_ACK_MESSAGE: &str = "Event Received!";

/// Identity-provider event type. Unknown wire values land in `Other` so new
/// provider event types are ignored instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Other(String),
}

impl EventKind {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "user.created" => Self::Created,
            "user.updated" => Self::Updated,
            "user.deleted" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::Created => "user.created",
            Self::Updated => "user.updated",
            Self::Deleted => "user.deleted",
            Self::Other(raw) => raw,
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEventData {
    pub id: UserId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
}

impl IdentityEventData {
    fn subject_only(id: UserId) -> Self {
        Self {
            id,
            email_addresses: Vec::new(),
            first_name: String::new(),
            last_name: String::new(),
            image_url: String::new(),
        }
    }
}

/// Verified webhook envelope. Lives for a single delivery.
///
/// `data` is only held to the user shape for `user.*` types; for any other
/// type it is reduced to its `id`, if it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIdentityEvent")]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: IdentityEventData,
}

#[derive(Deserialize)]
struct RawIdentityEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawIdentityEvent> for IdentityEvent {
    type Error = serde_json::Error;

    fn try_from(raw: RawIdentityEvent) -> Result<Self, Self::Error> {
        let data = match raw.kind {
            EventKind::Other(_) => IdentityEventData::subject_only(UserId::new(
                raw.data
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default(),
            )),
            _ => serde_json::from_value(raw.data)?,
        };
        Ok(Self {
            kind: raw.kind,
            data,
        })
    }
}

impl IdentityEvent {
    pub fn subject_id(&self) -> &UserId {
        &self.data.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub message: String,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self {
            message: WEBHOOK_ACK_MESSAGE.to_string(),
        }
    }
}

/// Envelope used by the chat backend for both `/chat/get` and `/chat/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
