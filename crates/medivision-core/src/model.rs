// Wire data model for the medicine-identification API.
//
// The client never interprets these records beyond (de)serializing and
// displaying them. Search results keep unknown server fields in an explicit
// `extra` map so nothing the server adds is silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::prefs::Language;

/// Role string the server uses for administrators.
pub const ADMIN_ROLE: &str = "admin";

// ---------------------------------------------------------------------------
// Users and authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl User {
    /// Whether the user should see the administrator screens. Purely a UI
    /// decision; the server enforces real permissions.
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Response of every endpoint that establishes a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
}

/// Plain `{ "message": "..." }` acknowledgement (OTP dispatch and similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupOtpRequest {
    pub name: String,
    pub email: String,
}

/// Partial profile update. Fields left as `None` are not sent, so the
/// server keeps their current values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }
}

// ---------------------------------------------------------------------------
// Medicines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineResult {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_bn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_bn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub images: Vec<String>,
    #[serde(
        default,
        rename = "matched_image",
        skip_serializing_if = "Option::is_none"
    )]
    pub matched_image: Option<String>,
    /// Every field the server sent that is not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MedicineResult {
    /// Name in the requested language, falling back to the English name
    /// when no translation was supplied.
    pub fn display_name(&self, language: Language) -> &str {
        match (language, self.name_bn.as_deref()) {
            (Language::Bn, Some(bn)) if !bn.is_empty() => bn,
            _ => &self.name,
        }
    }

    pub fn display_brand(&self, language: Language) -> Option<&str> {
        match (language, self.brand_bn.as_deref()) {
            (Language::Bn, Some(bn)) if !bn.is_empty() => Some(bn),
            _ => self.brand.as_deref(),
        }
    }

    /// URL of the first catalogue image, if any.
    pub fn image_url(&self, image_base: &str) -> Option<String> {
        self.images
            .first()
            .map(|file| join_image_url(image_base, file))
    }

    /// URL of the catalogue image the recognizer matched against.
    pub fn matched_image_url(&self, image_base: &str) -> Option<String> {
        self.matched_image
            .as_deref()
            .map(|file| join_image_url(image_base, file))
    }
}

/// Concatenate an image base path and a file name with exactly one `/`.
pub fn join_image_url(base: &str, file: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        file.trim_start_matches('/')
    )
}

/// List endpoints answer either with a paginated envelope
/// (`{"data": [...], "total": ..}`) or a bare array depending on server
/// version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Page<T> {
    Raw(Vec<T>),
    Paginated {
        data: Vec<T>,
        #[serde(flatten)]
        meta: Map<String, Value>,
    },
}

impl<T> Page<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Page::Raw(items) => items,
            Page::Paginated { data, .. } => data,
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Scan,
    Upload,
    View,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub action_type: HistoryAction,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub result_data: Option<Vec<MedicineResult>>,
    pub is_successful: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub medicine_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Best match recorded for this entry, if the action produced any.
    pub fn top_result(&self) -> Option<&MedicineResult> {
        self.result_data.as_ref().and_then(|r| r.first())
    }
}

// ---------------------------------------------------------------------------
// Id normalization
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Uint(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Uint(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(deserializer).map(|id| id.map(String::from))
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
