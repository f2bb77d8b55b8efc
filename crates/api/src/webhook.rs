//! Webhook event payloads and dispatch parsing.
//!
//! Deliveries arrive as `{"type": "<event>", "data": {...}}`. Only the events
//! we mirror locally get typed payloads; everything else parses to
//! [`WebhookEvent::Unknown`] and is acknowledged without side effects, so the
//! provider does not retry events we don't care about.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

// ─── Payloads ────────────────────────────────────────────────────────────────

/// One entry of the provider's `email_addresses` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub id: Option<String>,
    pub email_address: String,
}

/// `user.*` event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl UserData {
    /// The user's primary email: the entry matching
    /// `primary_email_address_id`, else the first one.
    pub fn primary_email(&self) -> Option<&str> {
        if let Some(primary_id) = &self.primary_email_address_id {
            if let Some(m) = self
                .email_addresses
                .iter()
                .find(|e| e.id.as_ref() == Some(primary_id))
            {
                return Some(&m.email_address);
            }
        }
        self.email_addresses.first().map(|e| e.email_address.as_str())
    }

    /// `first_name last_name`, trimmed. Used to seed staff profiles.
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or(""),
        );
        let name = name.trim();
        if name.is_empty() {
            self.id.clone()
        } else {
            name.to_string()
        }
    }
}

/// `organization.*` event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Nested organization reference in membership events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Nested user snapshot in membership events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUserData {
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PublicUserData {
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or(""),
        );
        let name = name.trim();
        if name.is_empty() {
            self.user_id.clone()
        } else {
            name.to_string()
        }
    }
}

/// `organizationMembership.*` event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipData {
    pub id: String,
    pub organization: OrganizationRef,
    pub public_user_data: PublicUserData,
    pub role: String,
}

/// `*.deleted` payload — only the id survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedData {
    pub id: String,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// A parsed webhook delivery.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    UserCreated(UserData),
    UserUpdated(UserData),
    UserDeleted(DeletedData),
    OrganizationCreated(OrganizationData),
    OrganizationUpdated(OrganizationData),
    OrganizationDeleted(DeletedData),
    MembershipCreated(MembershipData),
    MembershipUpdated(MembershipData),
    MembershipDeleted(MembershipData),
    /// Event type we don't mirror. Acknowledged, not processed.
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

/// Parse a raw delivery body into a [`WebhookEvent`].
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, ServiceError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid webhook body: {e}")))?;

    fn data<T: serde::de::DeserializeOwned>(
        event_type: &str,
        value: serde_json::Value,
    ) -> Result<T, ServiceError> {
        serde_json::from_value(value).map_err(|e| {
            ServiceError::BadRequest(format!("invalid {event_type} payload: {e}"))
        })
    }

    let ty = envelope.event_type.as_str();
    let event = match ty {
        "user.created" => WebhookEvent::UserCreated(data(ty, envelope.data)?),
        "user.updated" => WebhookEvent::UserUpdated(data(ty, envelope.data)?),
        "user.deleted" => WebhookEvent::UserDeleted(data(ty, envelope.data)?),
        "organization.created" => WebhookEvent::OrganizationCreated(data(ty, envelope.data)?),
        "organization.updated" => WebhookEvent::OrganizationUpdated(data(ty, envelope.data)?),
        "organization.deleted" => WebhookEvent::OrganizationDeleted(data(ty, envelope.data)?),
        "organizationMembership.created" => {
            WebhookEvent::MembershipCreated(data(ty, envelope.data)?)
        }
        "organizationMembership.updated" => {
            WebhookEvent::MembershipUpdated(data(ty, envelope.data)?)
        }
        "organizationMembership.deleted" => {
            WebhookEvent::MembershipDeleted(data(ty, envelope.data)?)
        }
        _ => WebhookEvent::Unknown(envelope.event_type),
    };
    Ok(event)
}
