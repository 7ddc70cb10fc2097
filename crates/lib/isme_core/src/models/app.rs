//! Registered external application models.

use serde::{Deserialize, Serialize};

/// Context tag for applications that use the shared login page.
pub const CTX_INFO_AUTHEN: &str = "authen";
/// Context tag for service-to-service applications.
pub const CTX_INFO_APP_SERVICE: &str = "app_service";

/// Context tags an application may register under.
pub const ALLOWED_CTX_INFOS: &[&str] = &[CTX_INFO_AUTHEN, CTX_INFO_APP_SERVICE];

/// Status of a registered application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Active,
    Inactive,
    Terminated,
}

/// A registered external application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppService {
    pub id: String,
    pub code: String,
    pub name: String,
    /// Secret encrypted under `ctx_info`. Never the plaintext.
    #[serde(skip_serializing)]
    pub secret_ciphertext: String,
    pub redirect_url: String,
    pub ctx_info: String,
    pub status: AppStatus,
}

impl AppService {
    pub fn is_active(&self) -> bool {
        self.status == AppStatus::Active
    }
}

/// Insert payload for a new application.
#[derive(Debug, Clone)]
pub struct NewAppService {
    pub code: String,
    pub name: String,
    pub secret_ciphertext: String,
    pub redirect_url: String,
    pub ctx_info: String,
}

/// Returned once, at registration or secret rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSecretResponse {
    pub app_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyAppResponse {
    pub ok: bool,
}
