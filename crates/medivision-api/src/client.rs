// HTTP client for the medicine-identification API.
//
// Every call is a single best-effort request: no retry, no caching, no
// deduplication. Failures are classified into `ApiError` instead of being
// propagated as transport errors, and a 401 on an authenticated call clears
// the local session.

use std::sync::Arc;

use medivision_core::config::ApiConfig;
use medivision_core::model::{
    HistoryEntry, LoginResponse, MedicineResult, MessageResponse, Page, ProfileUpdate,
    RegisterData, SignupOtpRequest, User,
};
use medivision_core::storage::Store;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::session::{Session, SessionState};
use crate::upload::ImageUpload;

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

enum Body {
    Empty,
    Json(Value),
    Image(ImageUpload),
}

/// Whether a call sends the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Never send a token.
    None,
    /// Send the token when one is stored.
    Optional,
    /// Refuse to send the request without a token.
    Required,
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    /// Client with reqwest's default settings. The session is restored from
    /// `store`.
    pub fn new(base_url: &str, store: Arc<Store>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, store)
    }

    pub fn from_config(config: &ApiConfig, store: Arc<Store>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http(http, &config.base_url, store))
    }

    fn with_http(http: reqwest::Client, base_url: &str, store: Arc<Store>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Session::new(store),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn set_auth_token(&self, token: &str) {
        self.session.set_token(token);
    }

    pub fn clear_auth_token(&self) {
        self.session.clear();
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Body,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let token = match auth {
            Auth::None => None,
            Auth::Optional | Auth::Required => self.session.token(),
        };
        if auth == Auth::Required && token.is_none() {
            debug!("{} {} skipped: no session token", method, endpoint);
            return Err(ApiError::NotAuthenticated);
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Image(upload) => builder.multipart(upload.into_form()?),
        };

        debug!("{} {}", method, endpoint);
        let response = builder.send().await.map_err(|e| {
            warn!("{} {} failed: {}", method, endpoint, e);
            ApiError::Network {
                detail: e.to_string(),
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            warn!("{} {} body read failed: {}", method, endpoint, e);
            ApiError::Network {
                detail: e.to_string(),
            }
        })?;

        if status == StatusCode::UNAUTHORIZED && token.is_some() {
            info!("{} {} rejected the session token, signing out", method, endpoint);
            self.session.clear();
        }

        let result = decode_response(status, &bytes);
        if let Err(e) = &result {
            debug!("{} {} -> {}: {}", method, endpoint, status.as_u16(), e);
        }
        result
    }

    // --- Authentication ---

    pub async fn send_otp(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let resp = self
            .request(
                Method::POST,
                "/auth/send-otp",
                &[],
                Body::Json(json!({ "email": email })),
                Auth::None,
            )
            .await?;
        self.session.begin_otp(email);
        Ok(resp)
    }

    /// Verify a login OTP and store the returned token.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<LoginResponse, ApiError> {
        let resp: LoginResponse = self
            .request(
                Method::POST,
                "/auth/verify-otp",
                &[],
                Body::Json(json!({ "email": email, "otp": otp })),
                Auth::None,
            )
            .await?;
        self.establish(&resp);
        Ok(resp)
    }

    /// Password login; stores the returned token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let resp: LoginResponse = self
            .request(
                Method::POST,
                "/auth/login",
                &[],
                Body::Json(json!({ "email": email, "password": password })),
                Auth::None,
            )
            .await?;
        self.establish(&resp);
        Ok(resp)
    }

    /// Sign out on the server and forget the local token. The token is
    /// cleared whatever the server answers. Logging out without a session
    /// is a no-op.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .request::<Value>(Method::POST, "/auth/logout", &[], Body::Empty, Auth::Required)
            .await;
        self.session.clear();
        match result {
            Ok(_) | Err(ApiError::NotAuthenticated) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn register(&self, data: &RegisterData) -> Result<LoginResponse, ApiError> {
        let body = serde_json::to_value(data)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to encode request: {e}")))?;
        let resp: LoginResponse = self
            .request(Method::POST, "/auth/register", &[], Body::Json(body), Auth::None)
            .await?;
        self.establish(&resp);
        Ok(resp)
    }

    pub async fn send_otp_for_signup(
        &self,
        request: &SignupOtpRequest,
    ) -> Result<MessageResponse, ApiError> {
        let resp = self
            .request(
                Method::POST,
                "/auth/send-otp-for-signup",
                &[],
                Body::Json(json!({ "name": request.name, "email": request.email })),
                Auth::None,
            )
            .await?;
        self.session.begin_otp(&request.email);
        Ok(resp)
    }

    pub async fn verify_otp_for_signup(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<LoginResponse, ApiError> {
        let resp: LoginResponse = self
            .request(
                Method::POST,
                "/auth/verify-otp-for-signup",
                &[],
                Body::Json(json!({ "email": email, "otp": otp })),
                Auth::None,
            )
            .await?;
        self.establish(&resp);
        Ok(resp)
    }

    fn establish(&self, resp: &LoginResponse) {
        self.session.set_token(&resp.access_token);
        info!("Signed in as {} (role: {})", resp.user.email, resp.user.role);
    }

    // --- Profile ---

    pub async fn get_profile(&self) -> Result<User, ApiError> {
        self.request(Method::GET, "/users/profile", &[], Body::Empty, Auth::Required)
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let body = serde_json::to_value(update)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to encode request: {e}")))?;
        self.request(Method::PUT, "/users/profile", &[], Body::Json(body), Auth::Required)
            .await
    }

    pub async fn upload_profile_image(&self, image: ImageUpload) -> Result<User, ApiError> {
        self.request(
            Method::PUT,
            "/users/profile/image",
            &[],
            Body::Image(image),
            Auth::Required,
        )
        .await
    }

    pub async fn remove_profile_image(&self) -> Result<User, ApiError> {
        self.request(
            Method::DELETE,
            "/users/profile/image",
            &[],
            Body::Empty,
            Auth::Required,
        )
        .await
    }

    pub async fn get_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, ApiError> {
        let page: Page<HistoryEntry> = self
            .request(
                Method::GET,
                "/users/profile/history",
                &[("limit", limit.to_string())],
                Body::Empty,
                Auth::Required,
            )
            .await?;
        Ok(page.into_items())
    }

    // --- Medicines ---

    /// Text search. Signed-in users send their token so the server can
    /// record history; anonymous search is allowed.
    pub async fn search_medicines(&self, term: &str) -> Result<Vec<MedicineResult>, ApiError> {
        let page: Page<MedicineResult> = self
            .request(
                Method::GET,
                "/medicines",
                &[("search", term.to_string())],
                Body::Empty,
                Auth::Optional,
            )
            .await?;
        Ok(page.into_items())
    }

    pub async fn search_by_image(
        &self,
        image: ImageUpload,
    ) -> Result<Vec<MedicineResult>, ApiError> {
        let page: Page<MedicineResult> = self
            .request(
                Method::POST,
                "/medicines/search-by-image",
                &[],
                Body::Image(image),
                Auth::Required,
            )
            .await?;
        Ok(page.into_items())
    }

    pub async fn get_medicine(&self, id: &str) -> Result<MedicineResult, ApiError> {
        self.request(
            Method::GET,
            &format!("/medicines/{id}"),
            &[],
            Body::Empty,
            Auth::None,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// Classify a response body. An empty body decodes as JSON `null`.
pub(crate) fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    bytes: &[u8],
) -> Result<T, ApiError> {
    let value: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(bytes).map_err(|_| status_error(status))?
    };

    if !status.is_success() {
        return Err(match server_message(&value) {
            Some(message) => ApiError::Server {
                status: status.as_u16(),
                message,
            },
            None => status_error(status),
        });
    }

    serde_json::from_value(value).map_err(|e| ApiError::UnexpectedResponse {
        detail: e.to_string(),
    })
}

fn status_error(status: StatusCode) -> ApiError {
    ApiError::Status {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
    }
}

/// The `message` field of an error body. Validation failures carry an
/// array of messages, which are joined.
pub(crate) fn server_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
