use crate::ai::{CompletionClient, CompletionRequest};
use anyhow::{bail, Context};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Calls the Gemini `generateContent` endpoint with a JSON response schema.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: Url,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// `base_url` is the API root, e.g. `https://generativelanguage.googleapis.com/v1beta/`.
    /// Without a `timeout` a request waits as long as the server takes.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid completion service URL '{base_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Unable to create the HTTP client")?;
        Ok(Self {
            http,
            base_url,
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> anyhow::Result<Url> {
        self.base_url
            .join(&format!("models/{}:generateContent", self.model))
            .context("Unable to build the generateContent URL")
    }
}

fn request_body(request: &CompletionRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseJsonSchema": request.output_schema
        }
    })
}

/// Pulls the JSON answer out of a `generateContent` response.
fn answer(response: &Value) -> anyhow::Result<Value> {
    let text = response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .context("The completion response has no text")?;
    serde_json::from_str(text).context("The completion text is not JSON")
}

#[async_trait::async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Value> {
        let url = self.endpoint()?;
        trace!("POST {url} for {}", request.name);
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .with_context(|| format!("Failed to send the {} request", request.name))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The completion service answered {status}: {body}");
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse the completion response")?;
        answer(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-2.0-flash",
            "k",
            None,
        )
        .unwrap();
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(GeminiClient::new("not a url", "m", "k", None).is_err());
    }

    #[test]
    fn test_request_body_carries_schema() {
        let request = CompletionRequest {
            name: "breakdown",
            prompt: "Split it".into(),
            output_schema: json!({"type": "object"}),
        };
        let body = request_body(&request);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Split it");
        assert_eq!(
            body["generationConfig"]["responseJsonSchema"],
            json!({"type": "object"})
        );
    }

    #[test]
    fn test_answer() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"subtasks\":[\"a\"]}"}]}
            }]
        });
        assert_eq!(answer(&response).unwrap(), json!({"subtasks": ["a"]}));
        assert!(answer(&json!({"candidates": []})).is_err());
        let not_json = json!({"candidates": [{"content": {"parts": [{"text": "sure!"}]}}]});
        assert!(answer(&not_json).is_err());
    }
}
