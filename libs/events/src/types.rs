//! Notification event types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lockbox_id::{ProjectId, SecretId, TeamId, UserId};
use serde::{Deserialize, Serialize};

use crate::EventError;

/// The kind of a notification event.
///
/// This is a closed set on the producing side, but consumers must tolerate
/// values they do not know (newer producers may ship new kinds), so the type
/// preserves the raw string rather than collapsing unknowns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationType(String);

impl NotificationType {
    pub const SECRET_EXPIRING: &'static str = "SECRET_EXPIRING";
    pub const SECRET_ROTATED: &'static str = "SECRET_ROTATED";
    pub const PROJECT_INVITATION: &'static str = "PROJECT_INVITATION";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn secret_expiring() -> Self {
        Self(Self::SECRET_EXPIRING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a kind the current build knows how to render specially.
    /// Unknown kinds are still recorded and delivered verbatim.
    pub fn is_known(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::SECRET_EXPIRING | Self::SECRET_ROTATED | Self::PROJECT_INVITATION
        )
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cross-service notification event.
///
/// This corresponds to the notification wire schema: JSON, camelCase keys,
/// ISO-8601 `createdAt`. Events are created once, published once, and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Event kind (e.g., "SECRET_EXPIRING").
    #[serde(rename = "type")]
    pub event_type: NotificationType,

    /// User whose action triggered the event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<UserId>,

    /// Users the notification is addressed to. Must be non-empty.
    pub recipient_user_ids: Vec<UserId>,

    /// Project context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,

    /// Team context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,

    /// Secret context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<SecretId>,

    /// Short human-readable title.
    pub title: String,

    /// Human-readable body.
    pub message: String,

    /// Free-form string metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Creates a new event builder.
    pub fn builder() -> NotificationEventBuilder {
        NotificationEventBuilder::new()
    }

    /// Decodes an event from its JSON wire form.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|e| EventError::InvalidPayload(e.to_string()))
    }

    /// Encodes the event to its JSON wire form.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EventError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Validates invariants that decode alone cannot enforce.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.recipient_user_ids.is_empty() {
            return Err(EventError::NoRecipients);
        }
        Ok(())
    }
}

/// Builder for constructing notification events.
#[derive(Debug, Default)]
pub struct NotificationEventBuilder {
    event_type: Option<NotificationType>,
    actor_user_id: Option<UserId>,
    recipient_user_ids: Vec<UserId>,
    project_id: Option<ProjectId>,
    team_id: Option<TeamId>,
    secret_id: Option<SecretId>,
    title: Option<String>,
    message: Option<String>,
    metadata: HashMap<String, String>,
    created_at: Option<DateTime<Utc>>,
}

impl NotificationEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, kind: NotificationType) -> Self {
        self.event_type = Some(kind);
        self
    }

    pub fn actor(mut self, user_id: UserId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn recipient(mut self, user_id: UserId) -> Self {
        self.recipient_user_ids.push(user_id);
        self
    }

    pub fn recipients(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.recipient_user_ids.extend(user_ids);
        self
    }

    pub fn project_id(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn team_id(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn secret_id(mut self, secret_id: SecretId) -> Self {
        self.secret_id = Some(secret_id);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn created_at(mut self, ts: DateTime<Utc>) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Builds the event.
    ///
    /// # Panics
    ///
    /// Panics if the event type, title, or message is missing, or if no
    /// recipient was added.
    pub fn build(self) -> NotificationEvent {
        assert!(
            !self.recipient_user_ids.is_empty(),
            "at least one recipient is required"
        );
        NotificationEvent {
            event_type: self.event_type.expect("event_type is required"),
            actor_user_id: self.actor_user_id,
            recipient_user_ids: self.recipient_user_ids,
            project_id: self.project_id,
            team_id: self.team_id,
            secret_id: self.secret_id,
            title: self.title.expect("title is required"),
            message: self.message.expect("message is required"),
            metadata: self.metadata,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}
