//! Authentication header construction.
//!
//! Secrets live in the per-tool runtime config, never in the tool
//! definition. An empty or missing secret emits no header at all, so tools
//! against unauthenticated dev endpoints work with an empty config.

use base64::Engine as _;
use trellis_core::tool::{AuthConfig, AuthType, ToolConfig};

/// Runtime-config key holding the auth token (or Basic-auth password).
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Default header name for `api_key` auth.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Default runtime-config key holding the Basic-auth username.
pub const DEFAULT_USERNAME_KEY: &str = "auth_username";

/// Build the authentication headers for a call.
#[must_use]
pub fn auth_headers(auth: &AuthConfig, config: &ToolConfig) -> Vec<(String, String)> {
    let token = config
        .get(AUTH_TOKEN_KEY)
        .map(String::as_str)
        .unwrap_or_default();

    match auth.auth_type {
        AuthType::None => Vec::new(),
        AuthType::ApiKey => {
            if token.is_empty() {
                return Vec::new();
            }
            let header = auth
                .header
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());
            vec![(header, token.to_string())]
        }
        AuthType::Bearer => {
            if token.is_empty() {
                return Vec::new();
            }
            vec![("Authorization".to_string(), format!("Bearer {token}"))]
        }
        AuthType::Basic => {
            let username_key = auth
                .username_key
                .as_deref()
                .unwrap_or(DEFAULT_USERNAME_KEY);
            let username = config
                .get(username_key)
                .map(String::as_str)
                .unwrap_or_default();
            if username.is_empty() && token.is_empty() {
                return Vec::new();
            }
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{token}"));
            tracing::debug!("using basic authentication");
            vec![("Authorization".to_string(), format!("Basic {encoded}"))]
        }
    }
}
