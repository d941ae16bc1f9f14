// Client for the medicine-identification HTTP API: request/response
// classification, the session token lifecycle, and the in-flight guard that
// keeps stale responses from overwriting newer ones.

pub mod client;
pub mod error;
pub mod guard;
pub mod session;
pub mod upload;

pub use client::ApiClient;
pub use error::{ApiError, ApiResponse, ErrorCategory};
pub use guard::{RequestGuard, Ticket};
pub use session::{Session, SessionState};
pub use upload::ImageUpload;
