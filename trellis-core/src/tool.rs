//! Tool definitions - declarative descriptions of HTTP endpoints.
//!
//! A tool describes one endpoint: where it lives, how to authenticate, and
//! how step inputs map onto the request. Two request shapes coexist by
//! design: the flat legacy shape (inputs become query or a flat JSON body)
//! and the structured shape, selected by the presence of a [`RequestConfig`],
//! which partitions inputs into path, query, and templated body.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-tool runtime configuration injected at call time (auth tokens and
/// similar secrets). Never part of the persisted tool definition.
pub type ToolConfig = HashMap<String, String>;

/// HTTP method for a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    #[default]
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP PATCH.
    Patch,
    /// HTTP DELETE.
    Delete,
}

impl HttpMethod {
    /// The method as an uppercase string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the legacy path sends inputs as query parameters (true) or a
    /// flat JSON body (false).
    #[must_use]
    pub fn sends_query(self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No authentication.
    #[default]
    None,
    /// API key sent in a named header.
    ApiKey,
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `Authorization: Basic <base64(user:pass)>`.
    Basic,
}

/// Structured authentication configuration.
///
/// Secrets are never stored here; they arrive through the per-tool
/// [`ToolConfig`] at call time under `auth_token` (and, for Basic auth, the
/// key named by `username_key`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The authentication scheme.
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,

    /// Header name for `api_key` auth (defaults to `X-API-Key`).
    #[serde(default)]
    pub header: Option<String>,

    /// Runtime-config key holding the Basic-auth username
    /// (defaults to `auth_username`).
    #[serde(default)]
    pub username_key: Option<String>,
}

/// Structured request shape: how resolved inputs map onto the HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Input names substituted into `{name}` placeholders in the path and
    /// removed from the remaining inputs.
    #[serde(default)]
    pub path_params: BTreeSet<String>,

    /// Input names extracted as URL query parameters.
    #[serde(default)]
    pub query_params: BTreeSet<String>,

    /// Custom headers: name -> template string, rendered leniently.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body template, rendered strictly. Any JSON shape.
    #[serde(default)]
    pub body: Option<Value>,

    /// Body encoding. `application/x-www-form-urlencoded` sends the rendered
    /// body form-encoded; anything else sends JSON.
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            path_params: BTreeSet::new(),
            query_params: BTreeSet::new(),
            headers: BTreeMap::new(),
            body: None,
            content_type: default_content_type(),
        }
    }
}

impl RequestConfig {
    /// Whether the body should be form-encoded rather than JSON.
    #[must_use]
    pub fn is_form_encoded(&self) -> bool {
        self.content_type == "application/x-www-form-urlencoded"
    }
}

/// Post-call projection of the response onto a flat output map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseExtract {
    /// Output key -> dotted path into the parsed response.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    /// In strict mode a missing path fails the step; otherwise it yields null.
    #[serde(default)]
    pub strict: bool,
}

/// An immutable description of one HTTP endpoint.
///
/// The legacy fields (`auth_type`, `auth_header`, `parameters`) and the
/// structured blocks (`auth`, `request`, `response_extract`) coexist; the
/// dispatcher selects the structured call path when `request` is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// What the endpoint does.
    #[serde(default)]
    pub description: String,

    /// Base URL, joined with `path`.
    pub base_url: String,

    /// HTTP method.
    #[serde(default)]
    pub method: HttpMethod,

    /// URL path, may contain `{name}` placeholders.
    #[serde(default)]
    pub path: String,

    /// Legacy authentication scheme.
    #[serde(default)]
    pub auth_type: AuthType,

    /// Legacy header name for `api_key` auth.
    #[serde(default)]
    pub auth_header: String,

    /// Legacy flat list of accepted input names.
    #[serde(default)]
    pub parameters: Vec<String>,

    /// Structured authentication; overrides the legacy fields when present.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Structured request shape; its presence selects the structured path.
    #[serde(default)]
    pub request: Option<RequestConfig>,

    /// Response projection.
    #[serde(default)]
    pub response_extract: Option<ResponseExtract>,
}

impl ToolDefinition {
    /// Create a minimal tool definition.
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the URL path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the structured request shape.
    #[must_use]
    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the structured auth configuration.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the response projection.
    #[must_use]
    pub fn with_response_extract(mut self, extract: ResponseExtract) -> Self {
        self.response_extract = Some(extract);
        self
    }

    /// Effective authentication configuration: the structured block when
    /// present, otherwise the legacy fields lifted into the same shape.
    #[must_use]
    pub fn effective_auth(&self) -> AuthConfig {
        if let Some(ref auth) = self.auth {
            return auth.clone();
        }
        AuthConfig {
            auth_type: self.auth_type,
            header: (!self.auth_header.is_empty()).then(|| self.auth_header.clone()),
            username_key: None,
        }
    }

    /// Check the structural invariants of the definition.
    ///
    /// `path_params` and `query_params` must be disjoint, and every declared
    /// path param must appear as `{name}` in `path`.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(ref request) = self.request else {
            return Ok(());
        };
        if let Some(shared) = request.path_params.intersection(&request.query_params).next() {
            return Err(format!(
                "input '{shared}' is declared as both a path param and a query param"
            ));
        }
        for param in &request.path_params {
            if !self.path.contains(&format!("{{{param}}}")) {
                return Err(format!(
                    "path param '{param}' has no '{{{param}}}' placeholder in path '{}'",
                    self.path
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_legacy_tool() {
        let yaml = r#"
id: search
name: Search
base_url: https://api.example.com
method: GET
path: /search
auth_type: api_key
auth_header: X-Token
parameters: [q, limit]
"#;
        let tool: ToolDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tool.id, "search");
        assert_eq!(tool.method, HttpMethod::Get);
        assert_eq!(tool.auth_type, AuthType::ApiKey);
        assert!(tool.request.is_none());

        let auth = tool.effective_auth();
        assert_eq!(auth.auth_type, AuthType::ApiKey);
        assert_eq!(auth.header.as_deref(), Some("X-Token"));
    }

    #[test]
    fn deserialize_structured_tool() {
        let yaml = r#"
id: create_order
name: Create order
base_url: https://api.example.com
method: POST
path: /customers/{customer_id}/orders
auth:
  type: bearer
request:
  path_params: [customer_id]
  query_params: [dry_run]
  headers:
    X-Request-Source: "trellis/{{channel}}"
  body:
    customer:
      email: "{{email}}"
    items: "{{lines}}"
response_extract:
  fields:
    order_id: data.order.id
  strict: true
"#;
        let tool: ToolDefinition = serde_yaml::from_str(yaml).unwrap();
        let request = tool.request.as_ref().unwrap();
        assert!(request.path_params.contains("customer_id"));
        assert_eq!(request.body.as_ref().unwrap()["items"], json!("{{lines}}"));
        assert_eq!(request.content_type, "application/json");
        assert!(tool.response_extract.as_ref().unwrap().strict);
        assert!(tool.check_invariants().is_ok());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let yaml = r#"
id: t
name: T
base_url: https://api.example.com
some_future_field: 3
"#;
        let tool: ToolDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tool.id, "t");
    }

    #[test]
    fn overlapping_path_and_query_params_are_invalid() {
        let tool = ToolDefinition::new("t", "T", "https://api.example.com")
            .with_path("/items/{id}")
            .with_request(RequestConfig {
                path_params: ["id".to_string()].into(),
                query_params: ["id".to_string()].into(),
                ..RequestConfig::default()
            });
        let err = tool.check_invariants().unwrap_err();
        assert!(err.contains("both a path param and a query param"));
    }

    #[test]
    fn path_param_must_appear_in_path() {
        let tool = ToolDefinition::new("t", "T", "https://api.example.com")
            .with_path("/items")
            .with_request(RequestConfig {
                path_params: ["id".to_string()].into(),
                ..RequestConfig::default()
            });
        let err = tool.check_invariants().unwrap_err();
        assert!(err.contains("placeholder"));
    }

    #[test]
    fn form_encoding_detection() {
        let mut request = RequestConfig::default();
        assert!(!request.is_form_encoded());
        request.content_type = "application/x-www-form-urlencoded".to_string();
        assert!(request.is_form_encoded());
    }
}
