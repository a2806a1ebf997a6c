//! Wire types exchanged with the backend.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Backend user identifier.
///
/// The backend may send either a number or a string; both are kept as a
/// string so the persisted record has a single shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(#[serde(deserialize_with = "number_or_string")] pub String);

/// Accepts an id sent as a JSON number or string.
fn number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Email address, if the backend shares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    /// Whether generated replies are held for manual review.
    #[serde(default = "default_manual_review")]
    pub manual_review: bool,
}

impl User {
    /// Creates a user with the given id and name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            name: name.into(),
            email: None,
            profile_pic: None,
            manual_review: default_manual_review(),
        }
    }
}

/// Email identifier, stable across fetches. Numeric ids are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(#[serde(deserialize_with = "number_or_string")] pub String);

impl EmailId {
    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmailId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EmailId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An unread email awaiting a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Unique identifier.
    pub id: EmailId,
    /// Sender.
    #[serde(default)]
    pub from: String,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Plain-text body.
    #[serde(default)]
    pub body: String,
    /// Generated reply, if one exists. Empty strings are read as absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub ai_response: Option<String>,
}

impl Email {
    /// Creates an email without a generated reply.
    #[must_use]
    pub fn new(
        id: impl Into<EmailId>,
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
            ai_response: None,
        }
    }

    /// Returns true if a generated reply is attached.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        self.ai_response.is_some()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Tone of generated replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTone {
    /// Professional tone.
    #[default]
    Professional,
    /// Friendly tone.
    Friendly,
    /// Formal tone.
    Formal,
}

/// Length of generated replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    /// Short replies.
    Short,
    /// Medium replies.
    #[default]
    Medium,
    /// Long replies.
    Long,
}

impl std::str::FromStr for ResponseTone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "professional" => Ok(Self::Professional),
            "friendly" => Ok(Self::Friendly),
            "formal" => Ok(Self::Formal),
            other => Err(format!("unknown response tone: {other}")),
        }
    }
}

impl std::str::FromStr for ResponseLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(format!("unknown response length: {other}")),
        }
    }
}

/// Response-generation policy.
///
/// Missing or null fields in a fetched policy fall back to the defaults
/// (manual review on, professional tone, medium length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPolicy {
    /// Hold generated replies for manual review before sending.
    #[serde(default = "default_manual_review", deserialize_with = "null_as_default_review")]
    pub manual_review: bool,
    /// Reply tone.
    #[serde(default, deserialize_with = "null_as_default")]
    pub response_tone: ResponseTone,
    /// Reply length.
    #[serde(default, deserialize_with = "null_as_default")]
    pub response_length: ResponseLength,
}

impl Default for SettingsPolicy {
    fn default() -> Self {
        Self {
            manual_review: default_manual_review(),
            response_tone: ResponseTone::default(),
            response_length: ResponseLength::default(),
        }
    }
}

const fn default_manual_review() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_review<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_manual_review))
}

/// `GET /auth/google` payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthUrlPayload {
    pub auth_url: String,
}

/// `POST /auth/google/callback` payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CallbackPayload {
    #[serde(default)]
    pub user: Option<User>,
}

/// `GET /emails` payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EmailsPayload {
    #[serde(default)]
    pub emails: Vec<Email>,
}

/// `POST /generate-response` payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeneratedPayload {
    pub ai_response: String,
}
