// Application orchestration.
//
// `AppState` owns the API client and every piece of client-side state
// (theme, language, alerts, cached profile). Each user flow calls the API,
// turns failures into alerts and hands back the uniform `{data, error}`
// response so the caller can render either side.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use medivision_api::{
    ApiClient, ApiError, ApiResponse, ErrorCategory, ImageUpload, RequestGuard,
};
use medivision_core::access::{self, Screen};
use medivision_core::alert::{ActionStyle, Alert, AlertAction, AlertCenter, AlertKind};
use medivision_core::config::Config;
use medivision_core::model::{
    HistoryEntry, MedicineResult, MessageResponse, ProfileUpdate, RegisterData,
    SignupOtpRequest, User,
};
use medivision_core::prefs::{Language, LanguageState, Theme, ThemeState};
use medivision_core::storage::Store;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::scan::{self, ScanRoute};
use crate::search::{MedicineSearch, SearchEvent, SuggestionController};

/// OTPs are four digits.
pub const OTP_LENGTH: usize = 4;

/// Button ids on the logout confirmation.
pub const LOGOUT_ACTION: &str = "logout";
pub const CANCEL_ACTION: &str = "cancel";

pub struct AppState {
    config: Config,
    api: Arc<ApiClient>,
    guard: Arc<RequestGuard>,
    pub theme: ThemeState,
    pub language: LanguageState,
    pub alerts: AlertCenter,
    profile: Option<User>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<Store>) -> anyhow::Result<Self> {
        let api = ApiClient::from_config(&config.api, Arc::clone(&store))
            .context("failed to create API client")?;
        Ok(Self::with_client(config, Arc::new(api), store))
    }

    pub fn with_client(config: Config, api: Arc<ApiClient>, store: Arc<Store>) -> Self {
        Self {
            config,
            api,
            guard: Arc::new(RequestGuard::new()),
            theme: ThemeState::load(store),
            language: LanguageState::default(),
            alerts: AlertCenter::default(),
            profile: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn profile(&self) -> Option<&User> {
        self.profile.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }

    pub fn image_base(&self) -> String {
        self.config.api.image_base()
    }

    // --- Alerts ---

    /// Alert for a failed call, titled by error category.
    pub fn error_alert(&self, err: &ApiError) -> Alert {
        let (kind, title) = match err.category() {
            ErrorCategory::Network => (AlertKind::Error, "networkError"),
            ErrorCategory::Precondition if *err == ApiError::NotAuthenticated => {
                (AlertKind::Warning, "notAuthenticated")
            }
            _ => (AlertKind::Error, "error"),
        };
        Alert::new(kind, self.language.t(title), err.to_string())
    }

    fn success(&mut self, message_key: &str) {
        let alert = Alert::new(
            AlertKind::Success,
            self.language.t("success"),
            self.language.t(message_key),
        );
        self.alerts.show(alert);
    }

    /// Reject input before it reaches the server.
    fn invalid<T>(&mut self, message_key: &str) -> ApiResponse<T> {
        let message = self.language.t(message_key).to_string();
        let alert = Alert::new(AlertKind::Warning, self.language.t("error"), message.clone());
        self.alerts.show(alert);
        ApiResponse::from(Err::<T, _>(ApiError::InvalidRequest(message)))
    }

    /// Raise the alert for `result` and convert it to the uniform shape.
    fn finish<T>(
        &mut self,
        result: Result<T, ApiError>,
        success_key: Option<&str>,
    ) -> ApiResponse<T> {
        match &result {
            Ok(_) => {
                if let Some(key) = success_key {
                    self.success(key);
                }
            }
            Err(e) => {
                if e.is_unauthorized() || *e == ApiError::NotAuthenticated {
                    self.profile = None;
                }
                let alert = self.error_alert(e);
                self.alerts.show(alert);
            }
        }
        result.into()
    }

    // --- Authentication ---

    pub async fn send_otp(&mut self, email: &str) -> ApiResponse<MessageResponse> {
        let email = email.trim();
        if email.is_empty() {
            return self.invalid("enterEmail");
        }
        let result = self.api.send_otp(email).await;
        self.finish(result, Some("otpSent"))
    }

    pub async fn verify_otp(&mut self, email: &str, otp: &str) -> ApiResponse<User> {
        if !is_valid_otp(otp) {
            return self.invalid("enter4DigitOtp");
        }
        let result = self.api.verify_otp(email.trim(), otp).await.map(|r| r.user);
        self.signed_in(result)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ApiResponse<User> {
        let result = self.api.login(email.trim(), password).await.map(|r| r.user);
        self.signed_in(result)
    }

    pub async fn register(&mut self, data: &RegisterData) -> ApiResponse<User> {
        let result = self.api.register(data).await.map(|r| r.user);
        self.signed_in(result)
    }

    pub async fn send_signup_otp(
        &mut self,
        name: &str,
        email: &str,
    ) -> ApiResponse<MessageResponse> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() {
            return self.invalid("enterNameAndEmail");
        }
        let request = SignupOtpRequest {
            name: name.to_string(),
            email: email.to_string(),
        };
        let result = self.api.send_otp_for_signup(&request).await;
        self.finish(result, Some("otpSent"))
    }

    pub async fn verify_signup_otp(&mut self, email: &str, otp: &str) -> ApiResponse<User> {
        if !is_valid_otp(otp) {
            return self.invalid("enter4DigitOtp");
        }
        let result = self
            .api
            .verify_otp_for_signup(email.trim(), otp)
            .await
            .map(|r| r.user);
        self.signed_in(result)
    }

    fn signed_in(&mut self, result: Result<User, ApiError>) -> ApiResponse<User> {
        if let Ok(user) = &result {
            self.profile = Some(user.clone());
        }
        self.finish(result, Some("loginSuccess"))
    }

    /// Sign out. Local state is reset even when the server call fails.
    pub async fn logout(&mut self) -> ApiResponse<()> {
        let result = self.api.logout().await;
        self.profile = None;
        if let Err(e) = &result {
            warn!("Server-side logout failed: {}", e);
        }
        self.finish(result, Some("logoutSuccess"))
    }

    /// Raise the logout confirmation. Nothing is cleared until the
    /// destructive button is pressed through `answer_logout`.
    pub fn request_logout(&mut self) {
        let lang = &self.language;
        let alert = Alert::new(AlertKind::Warning, lang.t("logout"), lang.t("areYouSureLogout"))
            .with_action(AlertAction::new(CANCEL_ACTION, lang.t("cancel"), ActionStyle::Cancel))
            .with_action(AlertAction::new(
                LOGOUT_ACTION,
                lang.t("logout"),
                ActionStyle::Destructive,
            ));
        self.alerts.show(alert);
    }

    /// Resolve the logout confirmation. Returns `None` when the user
    /// cancelled or `action_id` is not a button on the visible alert.
    pub async fn answer_logout(&mut self, action_id: &str) -> Option<ApiResponse<()>> {
        match self.alerts.press(action_id)?.as_str() {
            LOGOUT_ACTION => Some(self.logout().await),
            _ => {
                info!("Logout cancelled");
                None
            }
        }
    }

    // --- Profile ---

    pub async fn load_profile(&mut self) -> ApiResponse<User> {
        let result = self.api.get_profile().await;
        if let Ok(user) = &result {
            self.profile = Some(user.clone());
        }
        self.finish(result, None)
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> ApiResponse<User> {
        let result = self.api.update_profile(update).await;
        if let Ok(user) = &result {
            self.profile = Some(user.clone());
        }
        self.finish(result, Some("profileUpdated"))
    }

    /// Replace the profile picture. On failure the cached profile, and with
    /// it the previous image, is left untouched.
    pub async fn upload_profile_image(&mut self, path: &Path) -> ApiResponse<User> {
        let result = match ImageUpload::from_path(path).await {
            Ok(upload) => self.api.upload_profile_image(upload).await,
            Err(e) => Err(e),
        };
        if let Ok(user) = &result {
            self.profile = Some(user.clone());
        }
        self.finish(result, Some("profileImageUpdated"))
    }

    pub async fn remove_profile_image(&mut self) -> ApiResponse<User> {
        let result = self.api.remove_profile_image().await;
        if let Ok(user) = &result {
            self.profile = Some(user.clone());
        }
        self.finish(result, Some("profileImageRemoved"))
    }

    pub async fn history(&mut self, limit: Option<u32>) -> ApiResponse<Vec<HistoryEntry>> {
        let limit = limit.unwrap_or(self.config.history.limit);
        let result = self.api.get_history(limit).await;
        self.finish(result, None)
    }

    /// Fetch profile and recent history concurrently, as the dashboard
    /// does on open.
    pub async fn refresh_dashboard(
        &mut self,
    ) -> (ApiResponse<User>, ApiResponse<Vec<HistoryEntry>>) {
        let api = Arc::clone(&self.api);
        let limit = self.config.history.limit;
        let (profile, history) =
            futures_util::future::join(api.get_profile(), api.get_history(limit)).await;

        if let Ok(user) = &profile {
            self.profile = Some(user.clone());
        }
        let profile = self.finish(profile, None);
        // A failed profile fetch already raised the alert.
        let history = if profile.is_ok() {
            self.finish(history, None)
        } else {
            history.into()
        };
        (profile, history)
    }

    // --- Medicines ---

    /// Immediate full-text search.
    pub async fn search(&mut self, term: &str) -> ApiResponse<Vec<MedicineResult>> {
        let term = term.trim();
        if term.is_empty() {
            return ApiResponse::from(Ok::<_, ApiError>(Vec::new()));
        }
        let result = self.api.search_medicines(term).await;
        if let Ok(results) = &result {
            info!("Search {:?} returned {} result(s)", term, results.len());
        }
        self.finish(result, None)
    }

    pub async fn medicine(&mut self, id: &str) -> ApiResponse<MedicineResult> {
        let result = self.api.get_medicine(id).await;
        self.finish(result, None)
    }

    /// Image search. An empty result raises an informational alert and
    /// routes nowhere.
    pub async fn scan(&mut self, path: &Path) -> ApiResponse<ScanRoute> {
        let single = self.config.search.single_result_to_detail;
        let result = scan::scan_image(&self.api, path, single).await;
        if let Ok(route) = &result {
            if let Some(alert) = route.alert(&self.language) {
                self.alerts.show(alert);
            }
        }
        self.finish(result, None)
    }

    /// Debounced suggestion controller wired to this client.
    pub fn suggestions(&self) -> (SuggestionController, mpsc::Receiver<SearchEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let backend: Arc<dyn MedicineSearch> = self.api.clone();
        let controller = SuggestionController::new(
            backend,
            Arc::clone(&self.guard),
            &self.config.search,
            tx,
        );
        (controller, rx)
    }

    // --- Preferences and navigation ---

    pub fn toggle_theme(&mut self) -> Theme {
        let theme = self.theme.toggle();
        info!("Theme switched to {}", theme);
        theme
    }

    pub fn select_language(&mut self, language: Language) {
        self.language.select(language);
        info!("Language set to {}", language);
    }

    pub fn can_access(&self, screen: Screen) -> bool {
        access::can_access(self.profile.as_ref(), screen)
    }

    pub fn available_screens(&self) -> Vec<Screen> {
        access::available_screens(self.profile.as_ref())
    }
}

fn is_valid_otp(otp: &str) -> bool {
    otp.len() == OTP_LENGTH && otp.bytes().all(|b| b.is_ascii_digit())
}
