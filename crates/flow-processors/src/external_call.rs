//! External call node: performs an HTTP request as a pipeline stage
//!
//! The request is described entirely by configuration. The body is a
//! template in which every `{{input}}` token is replaced by the JSON
//! serialization of the resolved input, so upstream values can be embedded
//! in the payload. The node's output wraps the response status and decoded
//! body together with the input that triggered the call.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use flow_engine::{
    EngineError, Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::values::{parse_config, resolve_single};

/// Configuration for an external call node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalCallConfig {
    /// Request URL; required
    pub url: Option<String>,
    /// HTTP method (default GET)
    pub method: Option<String>,
    /// Extra request headers; may override the default content type
    pub headers: Option<BTreeMap<String, String>>,
    /// Body template; `{{input}}` expands to the serialized input. Ignored
    /// for GET requests.
    pub body: Option<String>,
}

/// Calls an external HTTP endpoint and surfaces its JSON response
#[derive(Debug, Clone)]
pub struct ExternalCallProcessor {
    client: Client,
}

impl ExternalCallProcessor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies, TLS settings)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ExternalCallProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn build_headers(headers: Option<&BTreeMap<String, String>>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(headers) = headers {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                EngineError::configuration(format!("invalid header name '{}'", name))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                EngineError::configuration(format!("invalid value for header '{}'", name))
            })?;
            map.insert(name, value);
        }
    }
    Ok(map)
}

fn render_body(template: &str, input: &Value) -> Result<Value> {
    if template.contains("{{input}}") {
        let rendered = template.replace("{{input}}", &serde_json::to_string(input)?);
        return serde_json::from_str(&rendered).map_err(|_| {
            EngineError::configuration("request body is not valid JSON after substitution")
        });
    }
    // A tokenless template is either literal JSON or a plain string payload.
    Ok(serde_json::from_str(template).unwrap_or_else(|_| Value::String(template.to_string())))
}

impl ProcessorDescriptor for ExternalCallProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "external-call",
            ProcessorCategory::Integration,
            "External Call",
            "Performs an HTTP request and passes the response downstream",
        )
    }
}

#[async_trait]
impl Processor for ExternalCallProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: ExternalCallConfig = parse_config(config, node_id)?;
        let input = resolve_single(&inputs);

        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                EngineError::configuration(format!("node '{}' has no URL configured", node_id))
            })?;
        let method_text = config.method.as_deref().unwrap_or("GET").to_uppercase();
        let method = Method::from_bytes(method_text.as_bytes()).map_err(|_| {
            EngineError::configuration(format!("invalid HTTP method '{}'", method_text))
        })?;
        let headers = build_headers(config.headers.as_ref())?;

        let body = match config.body.as_deref() {
            Some(template) if method != Method::GET => Some(render_body(template, &input)?),
            _ => None,
        };

        log::debug!("external call node '{}': {} {}", node_id, method, url);
        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| {
            EngineError::external_call(format!("request to {} failed: {}", url, e))
        })?;
        let status = response.status().as_u16();
        let data: Value = response.json().await.map_err(|e| {
            EngineError::external_call(format!("response from {} is not valid JSON: {}", url, e))
        })?;

        Ok(json!({
            "status": status,
            "data": data,
            "input": input,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_body_substitutes_every_token() {
        let out = render_body(
            r#"{"first": {{input}}, "second": {{input}}}"#,
            &json!({"a": 1}),
        )
        .unwrap();
        assert_eq!(out, json!({"first": {"a": 1}, "second": {"a": 1}}));
    }

    #[test]
    fn test_render_body_serializes_strings_as_json() {
        let out = render_body(r#"{"name": {{input}}}"#, &json!("ada")).unwrap();
        assert_eq!(out, json!({"name": "ada"}));
    }

    #[test]
    fn test_render_body_without_token() {
        assert_eq!(
            render_body(r#"{"fixed": true}"#, &Value::Null).unwrap(),
            json!({"fixed": true})
        );
        assert_eq!(
            render_body("plain text", &Value::Null).unwrap(),
            json!("plain text")
        );
    }

    #[test]
    fn test_render_body_rejects_broken_substitution() {
        let err = render_body(r#"{"open": {{input}}"#, &json!(1)).unwrap_err();
        assert!(err
            .to_string()
            .contains("not valid JSON after substitution"));
    }

    #[test]
    fn test_build_headers_defaults_to_json() {
        let headers = build_headers(None).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_build_headers_allows_overrides() {
        let mut extra = BTreeMap::new();
        extra.insert("content-type".to_string(), "text/plain".to_string());
        extra.insert("x-trace".to_string(), "abc".to_string());
        let headers = build_headers(Some(&extra)).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_build_headers_rejects_invalid_entries() {
        let mut bad_name = BTreeMap::new();
        bad_name.insert("not a header".to_string(), "v".to_string());
        assert!(build_headers(Some(&bad_name)).is_err());

        let mut bad_value = BTreeMap::new();
        bad_value.insert("x-ok".to_string(), "line\nbreak".to_string());
        assert!(build_headers(Some(&bad_value)).is_err());
    }

    #[tokio::test]
    async fn test_url_is_required() {
        let err = ExternalCallProcessor::new()
            .process("call", HashMap::new(), &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no URL configured"));
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected_before_sending() {
        let err = ExternalCallProcessor::new()
            .process(
                "call",
                HashMap::new(),
                &json!({"url": "http://localhost:1/x", "method": "NOT A METHOD"}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid HTTP method"));
    }
}
