//! HTTP dispatch - turning a tool definition plus resolved inputs into a
//! request, and its response into a step output.
//!
//! Two call paths coexist by design, selected by the presence of the tool's
//! structured `request` block:
//!
//! - **Structured**: inputs are partitioned into path values, query values,
//!   and body values; headers and body are rendered from templates; the
//!   response may be projected through `response_extract`.
//! - **Legacy**: GET/DELETE send all inputs as query parameters,
//!   POST/PUT/PATCH as a flat JSON body, after `{name}` path substitution.
//!
//! The paths share only the clearly-factored primitives: path substitution,
//! auth header construction, and response shaping.

mod auth;
mod response;

pub use auth::{auth_headers, AUTH_TOKEN_KEY, DEFAULT_API_KEY_HEADER, DEFAULT_USERNAME_KEY};
pub use response::{parse_body, shape_output};

use serde_json::{Map, Value};
use std::time::Duration;
use trellis_core::error::{EngineError, Result};
use trellis_core::template;
use trellis_core::tool::{HttpMethod, RequestConfig, ToolConfig, ToolDefinition};

/// Default HTTP call timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Timeout applied to every HTTP call.
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl DispatchConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads `TRELLIS_HTTP_TIMEOUT_MS`; unset or unparseable values fall
    /// back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let timeout_ms = std::env::var("TRELLIS_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// Issues configured HTTP requests for tool calls.
///
/// Holds one connection-pooled client; request-specific headers are set per
/// call and never leak across calls.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(config: DispatchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| EngineError::Internal {
                cause: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    /// Execute one tool call with the given resolved inputs.
    ///
    /// Returns the shaped step output. Network failures, non-2xx statuses,
    /// template misses, and strict extraction misses all surface as errors.
    pub async fn call(
        &self,
        tool: &ToolDefinition,
        resolved_inputs: Map<String, Value>,
        config: &ToolConfig,
    ) -> Result<Value> {
        match tool.request {
            Some(ref request) => {
                self.call_structured(tool, request, resolved_inputs, config)
                    .await
            }
            None => self.call_legacy(tool, resolved_inputs, config).await,
        }
    }

    async fn call_structured(
        &self,
        tool: &ToolDefinition,
        request: &RequestConfig,
        resolved_inputs: Map<String, Value>,
        config: &ToolConfig,
    ) -> Result<Value> {
        // Partition: path values and query values are popped off; what's
        // left is the flat body-value map. The untouched full map stays
        // available to header and body templates.
        let mut remaining = resolved_inputs.clone();

        let mut path = tool.path.clone();
        for param in &request.path_params {
            let value = remaining.remove(param).ok_or_else(|| EngineError::Dispatch {
                tool: tool.id.clone(),
                url: join_url(&tool.base_url, &tool.path),
                status: None,
                cause: format!("missing value for path parameter '{param}'"),
            })?;
            path = substitute_path_param(&path, param, &value);
        }
        let url = join_url(&tool.base_url, &path);

        let mut query = Vec::new();
        for param in &request.query_params {
            if let Some(value) = remaining.remove(param) {
                push_query(&mut query, param, value);
            }
        }

        let mut headers = auth_headers(&tool.effective_auth(), config);
        for (name, template_text) in &request.headers {
            let rendered = template::render(
                &Value::String(template_text.clone()),
                &resolved_inputs,
                false,
            )?;
            let text = scalar_string(&rendered);
            // Entries that still contain placeholders had no value; drop them.
            if !text.contains("{{") {
                headers.push((name.clone(), text));
            }
        }

        let body = match request.body {
            Some(ref body_template) => {
                Some(template::render(body_template, &resolved_inputs, true)?)
            }
            None => None,
        };

        tracing::debug!(tool = %tool.id, method = %tool.method, %url, "dispatching structured call");

        let mut builder = self
            .http
            .request(into_method(tool.method), &url)
            .timeout(self.config.timeout);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(ref body) = body {
            builder = if request.is_form_encoded() {
                builder.form(body)
            } else {
                builder.json(body)
            };
        }

        let output = self.send(tool, &url, builder).await?;
        shape_output(&tool.id, output, tool.response_extract.as_ref())
    }

    async fn call_legacy(
        &self,
        tool: &ToolDefinition,
        resolved_inputs: Map<String, Value>,
        config: &ToolConfig,
    ) -> Result<Value> {
        // Inputs matching {name} placeholders in the path are substituted
        // and consumed; the rest travel as query or flat body.
        let mut remaining = resolved_inputs;
        let mut path = tool.path.clone();
        for name in placeholder_names(&tool.path) {
            if let Some(value) = remaining.remove(&name) {
                path = substitute_path_param(&path, &name, &value);
            }
        }
        let url = join_url(&tool.base_url, &path);

        let headers = auth_headers(&tool.effective_auth(), config);

        tracing::debug!(tool = %tool.id, method = %tool.method, %url, "dispatching legacy call");

        let mut builder = self
            .http
            .request(into_method(tool.method), &url)
            .timeout(self.config.timeout);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        if tool.method.sends_query() {
            let mut query = Vec::new();
            for (name, value) in remaining {
                push_query(&mut query, &name, value);
            }
            if !query.is_empty() {
                builder = builder.query(&query);
            }
        } else {
            builder = builder.json(&Value::Object(remaining));
        }

        let output = self.send(tool, &url, builder).await?;
        shape_output(&tool.id, output, None)
    }

    async fn send(
        &self,
        tool: &ToolDefinition,
        url: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value> {
        let response = builder.send().await.map_err(|e| EngineError::Dispatch {
            tool: tool.id.clone(),
            url: url.to_string(),
            status: None,
            cause: format!("HTTP request failed: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Dispatch {
                tool: tool.id.clone(),
                url: url.to_string(),
                status: Some(status.as_u16()),
                cause: truncate(&body, 500),
            });
        }

        parse_body(response, &tool.id, url).await
    }
}

fn into_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Join a base URL and a path with exactly one slash between them.
fn join_url(base_url: &str, path: &str) -> String {
    if path.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Replace every `{name}` occurrence in `path` with the URL-encoded value.
fn substitute_path_param(path: &str, name: &str, value: &Value) -> String {
    let encoded = urlencoding::encode(&scalar_string(value)).into_owned();
    path.replace(&format!("{{{name}}}"), &encoded)
}

/// The `{name}` placeholder names appearing in a path.
fn placeholder_names(path: &str) -> Vec<String> {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid"));
    re.captures_iter(path).map(|caps| caps[1].to_string()).collect()
}

/// Append a query pair; sequences expand to repeated keys, nulls are
/// omitted.
fn push_query(query: &mut Vec<(String, String)>, key: &str, value: Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                push_query(query, key, item);
            }
        }
        other => query.push((key.to_string(), scalar_string(&other))),
    }
}

/// String form of a value for URLs and headers: strings verbatim,
/// everything else compact JSON.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
