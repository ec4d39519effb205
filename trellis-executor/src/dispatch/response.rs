//! Response parsing and output shaping.

use serde_json::{json, Map, Value};
use trellis_core::error::{EngineError, Result};
use trellis_core::tool::ResponseExtract;
use trellis_core::value;

/// Parse an HTTP response body into a dynamic value.
///
/// JSON bodies (per content type) are parsed; a parse failure is a dispatch
/// error. Anything else is wrapped as `{"text": <body>}`.
pub async fn parse_body(
    response: reqwest::Response,
    tool_id: &str,
    url: &str,
) -> Result<Value> {
    let status = response.status().as_u16();
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));

    let text = response
        .text()
        .await
        .map_err(|e| EngineError::Dispatch {
            tool: tool_id.to_string(),
            url: url.to_string(),
            status: Some(status),
            cause: format!("failed to read response body: {e}"),
        })?;

    if is_json {
        serde_json::from_str(&text).map_err(|e| EngineError::Dispatch {
            tool: tool_id.to_string(),
            url: url.to_string(),
            status: Some(status),
            cause: format!("invalid JSON response: {e}"),
        })
    } else {
        Ok(json!({ "text": text }))
    }
}

/// Shape the parsed response into the step output.
///
/// With an extraction config, project the configured dotted paths into a
/// flat map (strict misses fail, lenient misses yield null). Without one,
/// wrap bare sequences as `{"items": ..., "count": ...}` so downstream
/// references always address a mapping; everything else passes through.
pub fn shape_output(
    tool_id: &str,
    data: Value,
    extract: Option<&ResponseExtract>,
) -> Result<Value> {
    if let Some(extract) = extract.filter(|e| !e.fields.is_empty()) {
        let mut projected = Map::new();
        for (output_key, dot_path) in &extract.fields {
            match value::traverse(&data, dot_path) {
                Ok(found) => {
                    projected.insert(output_key.clone(), found.clone());
                }
                Err(_) if extract.strict => {
                    return Err(EngineError::Extraction {
                        tool: tool_id.to_string(),
                        path: dot_path.clone(),
                    });
                }
                Err(_) => {
                    projected.insert(output_key.clone(), Value::Null);
                }
            }
        }
        return Ok(Value::Object(projected));
    }

    match data {
        Value::Array(items) => {
            let count = items.len();
            Ok(json!({ "items": items, "count": count }))
        }
        other => Ok(other),
    }
}
