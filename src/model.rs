use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::dates;

/// A date as the backend sends it: `[year, month, day, hour, minute, second, fraction]`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BackendDate(pub NaiveDateTime);

impl BackendDate {
    pub fn from_parts(parts: &[i64]) -> Result<Self, dates::DateError> {
        dates::parse_backend_date(parts).map(BackendDate)
    }

    pub fn naive(&self) -> &NaiveDateTime {
        &self.0
    }
}

impl From<NaiveDateTime> for BackendDate {
    fn from(value: NaiveDateTime) -> Self {
        BackendDate(value)
    }
}

impl Serialize for BackendDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        dates::to_backend_array(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BackendDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        dates::parse_backend_date_value(&value)
            .map(BackendDate)
            .map_err(serde::de::Error::custom)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// ShortLink is the record the backend keeps for each shortened URL.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub key: String, // backend-generated, always present
    pub url: String, // destination
    #[serde(default, deserialize_with = "null_as_empty")]
    pub alias: String, // empty when unset
    #[serde(default)]
    pub hit: i64,
    pub created_at: BackendDate,
    #[serde(default)]
    pub expires_at: Option<BackendDate>,
}

impl ShortLink {
    /// The path segment visitors use: the alias when one is set, the key otherwise.
    pub fn public_segment(&self) -> &str {
        if self.alias.is_empty() { &self.key } else { &self.alias }
    }
}

impl std::fmt::Display for ShortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.key)?;
        write!(f, "/{} -> {}", self.public_segment(), self.url)?;
        write!(f, " [hits: {}, created: {}", self.hit, dates::format_date(&self.created_at.0))?;
        if let Some(expires_at) = &self.expires_at {
            write!(f, ", expires: {}", dates::format_date(&expires_at.0))?;
        }
        write!(f, "]")
    }
}

/// Body of `POST /urls/`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>, // ISO-8601 UTC
}

/// Body of `PUT /urls/{key}`. Only fields that differ from the stored record
/// are present; `expiresAt: null` removes the expiration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Option<String>>,
}

/// The editable fields of a link after form parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkChanges {
    pub url: String,
    pub alias: String,
    pub expires_at: Option<NaiveDateTime>,
}

impl UrlPatch {
    /// Fields of `changes` that differ from `original`. Expirations are compared
    /// at whole-second precision since form inputs carry no milliseconds.
    pub fn diff(original: &ShortLink, changes: &LinkChanges) -> Self {
        let mut patch = UrlPatch::default();
        if original.url != changes.url {
            patch.url = Some(changes.url.clone());
        }
        if original.alias != changes.alias {
            patch.alias = Some(changes.alias.clone());
        }
        let before = original.expires_at.map(|d| d.0.trunc_subsecs(0));
        let after = changes.expires_at.map(|d| d.trunc_subsecs(0));
        if before != after {
            patch.expires_at = Some(after.as_ref().map(dates::to_iso_utc));
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.alias.is_none() && self.expires_at.is_none()
    }
}

/// Body of a successful `GET /urls/{keyOrAlias}`; only the destination matters here.
#[derive(Clone, Debug, Deserialize)]
pub struct Resolved {
    pub url: String,
}
