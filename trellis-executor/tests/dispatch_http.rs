//! HTTP dispatch tests against a wiremock server.
//!
//! Cover both call paths: the structured shape (input partitioning,
//! template rendering, response extraction) and the flat legacy shape.

use serde_json::{json, Map, Value};
use trellis_core::tool::{
    AuthConfig, AuthType, RequestConfig, ResponseExtract, ToolConfig, ToolDefinition,
};
use trellis_core::{EngineError, HttpMethod};
use trellis_executor::{DispatchConfig, Dispatcher};
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher() -> Dispatcher {
    Dispatcher::new(DispatchConfig::default()).expect("dispatcher construction")
}

fn inputs(value: Value) -> Map<String, Value> {
    value.as_object().expect("object literal").clone()
}

fn config(pairs: &[(&str, &str)]) -> ToolConfig {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn request_config() -> RequestConfig {
    RequestConfig::default()
}

#[tokio::test]
async fn structured_post_preserves_body_types() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(json!({
            "customer": {"email": "a@b"},
            "items": [{"sku": 1}, {"sku": 2}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("orders", "Orders", server.uri())
        .with_method(HttpMethod::Post)
        .with_path("/orders")
        .with_request(RequestConfig {
            body: Some(json!({
                "customer": {"email": "{{email}}"},
                "items": "{{lines}}"
            })),
            ..request_config()
        });

    let output = dispatcher()
        .call(
            &tool,
            inputs(json!({"email": "a@b", "lines": [{"sku": 1}, {"sku": 2}]})),
            &config(&[]),
        )
        .await
        .unwrap();
    assert_eq!(output, json!({"ok": true}));
}

#[tokio::test]
async fn structured_call_partitions_path_query_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers/c-42/orders"))
        .and(query_param("dry_run", "true"))
        .and(body_json(json!({"note": "rush"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "o-1"})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("orders", "Orders", server.uri())
        .with_method(HttpMethod::Post)
        .with_path("/customers/{customer_id}/orders")
        .with_request(RequestConfig {
            path_params: ["customer_id".to_string()].into(),
            query_params: ["dry_run".to_string()].into(),
            body: Some(json!({"note": "{{note}}"})),
            ..request_config()
        });

    let output = dispatcher()
        .call(
            &tool,
            inputs(json!({"customer_id": "c-42", "dry_run": true, "note": "rush"})),
            &config(&[]),
        )
        .await
        .unwrap();
    assert_eq!(output, json!({"id": "o-1"}));
}

#[tokio::test]
async fn path_values_are_url_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"found": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("files", "Files", server.uri())
        .with_path("/files/{name}")
        .with_request(RequestConfig {
            path_params: ["name".to_string()].into(),
            ..request_config()
        });

    let output = dispatcher()
        .call(&tool, inputs(json!({"name": "a b"})), &config(&[]))
        .await
        .unwrap();
    assert_eq!(output, json!({"found": true}));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/files/a%20b");
}

#[tokio::test]
async fn missing_path_value_is_fatal() {
    let tool = ToolDefinition::new("files", "Files", "http://unused.invalid")
        .with_path("/files/{name}")
        .with_request(RequestConfig {
            path_params: ["name".to_string()].into(),
            ..request_config()
        });

    let err = dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap_err();
    match err {
        EngineError::Dispatch { status, cause, .. } => {
            assert_eq!(status, None);
            assert!(cause.contains("path parameter 'name'"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn query_sequences_expand_and_nulls_drop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("search", "Search", server.uri())
        .with_path("/search")
        .with_request(RequestConfig {
            query_params: ["tag".to_string(), "missing".to_string()].into(),
            ..request_config()
        });

    dispatcher()
        .call(
            &tool,
            inputs(json!({"tag": ["a", "b"], "missing": null})),
            &config(&[]),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query = requests[0].url.query().unwrap_or_default();
    assert!(query.contains("tag=a") && query.contains("tag=b"));
    assert!(!query.contains("missing"));
}

#[tokio::test]
async fn bearer_auth_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri())
        .with_request(request_config())
        .with_auth(AuthConfig {
            auth_type: AuthType::Bearer,
            ..AuthConfig::default()
        });

    dispatcher()
        .call(&tool, inputs(json!({})), &config(&[("auth_token", "tok-123")]))
        .await
        .unwrap();
}

#[tokio::test]
async fn basic_auth_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri())
        .with_request(request_config())
        .with_auth(AuthConfig {
            auth_type: AuthType::Basic,
            ..AuthConfig::default()
        });

    dispatcher()
        .call(
            &tool,
            inputs(json!({})),
            &config(&[("auth_username", "user"), ("auth_token", "pass")]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_token_sends_no_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    // Legacy tool with bearer auth but no configured secret.
    let tool = ToolDefinition {
        auth_type: AuthType::Bearer,
        ..ToolDefinition::new("t", "T", server.uri())
    };

    dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("Authorization").is_none());
}

#[tokio::test]
async fn custom_headers_render_and_unresolved_ones_drop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-Channel", "web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri()).with_request(RequestConfig {
        headers: [
            ("X-Channel".to_string(), "{{channel}}".to_string()),
            ("X-Missing".to_string(), "{{absent}}".to_string()),
        ]
        .into(),
        ..request_config()
    });

    dispatcher()
        .call(&tool, inputs(json!({"channel": "web"})), &config(&[]))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Missing").is_none());
}

#[tokio::test]
async fn strict_body_render_fails_on_missing_key() {
    let tool = ToolDefinition::new("t", "T", "http://unused.invalid")
        .with_method(HttpMethod::Post)
        .with_request(RequestConfig {
            body: Some(json!({"customer": {"email": "{{email}}"}})),
            ..request_config()
        });

    let err = dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap_err();
    match err {
        EngineError::Template { key, path } => {
            assert_eq!(key, "email");
            assert_eq!(path, "customer.email");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn path_param_remains_visible_to_body_templates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers/c-7"))
        .and(body_json(json!({"customer_ref": "c-7"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri())
        .with_method(HttpMethod::Post)
        .with_path("/customers/{customer_id}")
        .with_request(RequestConfig {
            path_params: ["customer_id".to_string()].into(),
            body: Some(json!({"customer_ref": "{{customer_id}}"})),
            ..request_config()
        });

    dispatcher()
        .call(&tool, inputs(json!({"customer_id": "c-7"})), &config(&[]))
        .await
        .unwrap();
}

#[tokio::test]
async fn strict_extraction_miss_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"order": {}}})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri())
        .with_request(request_config())
        .with_response_extract(ResponseExtract {
            fields: [("order_id".to_string(), "data.order.id".to_string())].into(),
            strict: true,
        });

    let err = dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap_err();
    match err {
        EngineError::Extraction { path, .. } => assert_eq!(path, "data.order.id"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn lenient_extraction_miss_yields_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 9, "extra": 1}})),
        )
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri())
        .with_request(request_config())
        .with_response_extract(ResponseExtract {
            fields: [
                ("id".to_string(), "data.id".to_string()),
                ("absent".to_string(), "data.nope".to_string()),
            ]
            .into(),
            strict: false,
        });

    let output = dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap();
    assert_eq!(output, json!({"id": 9, "absent": null}));
}

#[tokio::test]
async fn non_json_response_is_wrapped_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text here"))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri()).with_request(request_config());

    let output = dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap();
    assert_eq!(output, json!({"text": "plain text here"}));
}

#[tokio::test]
async fn error_status_carries_http_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri()).with_request(request_config());

    let err = dispatcher()
        .call(&tool, inputs(json!({})), &config(&[]))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(404));
    assert!(err.to_string().contains("not here"));
}

#[tokio::test]
async fn form_encoded_body_is_supported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("grant_type=client_credentials&scope=read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("t", "T", server.uri())
        .with_method(HttpMethod::Post)
        .with_request(RequestConfig {
            body: Some(json!({
                "grant_type": "client_credentials",
                "scope": "{{scope}}"
            })),
            content_type: "application/x-www-form-urlencoded".to_string(),
            ..request_config()
        });

    let output = dispatcher()
        .call(&tool, inputs(json!({"scope": "read"})), &config(&[]))
        .await
        .unwrap();
    assert_eq!(output, json!({"token": "t"}));
}

#[tokio::test]
async fn legacy_get_substitutes_path_and_queries_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u-1/posts"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(&server)
        .await;

    let tool = ToolDefinition::new("posts", "Posts", server.uri()).with_path("/users/{user_id}/posts");

    let output = dispatcher()
        .call(&tool, inputs(json!({"user_id": "u-1", "limit": 5})), &config(&[]))
        .await
        .unwrap();
    // Path inputs are consumed; only `limit` reaches the query string, and
    // the list response is wrapped.
    assert_eq!(output, json!({"items": [{"id": 1}], "count": 1}));

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default();
    assert!(!query.contains("user_id"));
}

#[tokio::test]
async fn legacy_api_key_auth_uses_configured_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-Api-Token", "key-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let tool = ToolDefinition {
        auth_type: AuthType::ApiKey,
        auth_header: "X-Api-Token".to_string(),
        ..ToolDefinition::new("t", "T", server.uri())
    };

    dispatcher()
        .call(&tool, inputs(json!({})), &config(&[("auth_token", "key-9")]))
        .await
        .unwrap();
}
