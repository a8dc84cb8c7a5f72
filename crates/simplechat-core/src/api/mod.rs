//! HTTP client for the chat backend.
//!
//! Endpoints: `GET /health`, `POST /ai/ask`, `POST /login`, and the
//! knowledge-base routes under `/kb/vector-stores`.

mod auth;
mod kb;
pub mod stream;

pub use auth::Session;
pub use kb::{UploadedFile, VectorStore};

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::state::ChatMessage;
use stream::Utf8StreamDecoder;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Serialize)]
struct AskRequest<'a> {
    messages: &'a [ChatMessage],
}

/// Non-streaming `/ai/ask` reply. Older backends answer `{text}` instead.
#[derive(Deserialize)]
struct AskJsonResponse {
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplyMessage {
    Message(ChatMessage),
    Text(String),
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: Option<String>,
}

/// Backend health as reported by `/health`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
}

/// A tool invocation reported alongside a JSON reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ToolCall {
    /// Result as display text. `None` when the tool returned nothing.
    pub fn result_text(&self) -> Option<String> {
        match &self.result {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()))
            }
        }
    }
}

/// Final outcome of an `/ai/ask` call
#[derive(Debug, Clone, PartialEq)]
pub struct AskReply {
    pub message: ChatMessage,
    pub tool_calls: Vec<ToolCall>,
}

impl AskReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::assistant(content),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.url("/health");
        debug!("checking backend health at {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            warn!("health check returned {}", response.status());
            return Err(ApiError::HealthCheck);
        }

        let health: HealthResponse = response.json().await?;
        Ok(HealthStatus {
            status: health.status.unwrap_or_else(|| "ok".to_string()),
        })
    }

    /// Send the conversation to `/ai/ask`.
    ///
    /// A streamed text body is decoded incrementally and every non-empty
    /// piece is passed to `on_chunk` in arrival order; the returned reply
    /// holds the whole text. A JSON body is parsed as a complete reply and
    /// produces no chunks.
    pub async fn ask<F>(&self, messages: &[ChatMessage], mut on_chunk: F) -> Result<AskReply>
    where
        F: FnMut(&str),
    {
        let url = self.url("/ai/ask");
        info!("asking backend (messages={})", messages.len());

        let response = self
            .authorize(self.client.post(&url))
            .json(&AskRequest { messages })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        if is_json(&response) {
            let body: AskJsonResponse = response.json().await?;
            return parse_json_reply(body);
        }

        let mut decoder = Utf8StreamDecoder::new();
        let mut full = String::new();
        let mut chunks = 0usize;
        let mut byte_stream = response.bytes_stream();

        while let Some(item) = byte_stream.next().await {
            let bytes = item?;
            let text = decoder.decode(&bytes);
            if !text.is_empty() {
                chunks += 1;
                full.push_str(&text);
                on_chunk(&text);
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            full.push_str(&tail);
            on_chunk(&tail);
        }

        debug!("stream finished (chunks={}, chars={})", chunks, full.chars().count());
        Ok(AskReply::text(full))
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("application/json"))
        .unwrap_or(false)
}

/// Turn a non-success response into `ApiError::Status` carrying its body.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("backend returned {}: {}", status, body);
    Err(ApiError::Status { status, body })
}

fn parse_json_reply(body: AskJsonResponse) -> Result<AskReply> {
    let message = match (body.message, body.text) {
        (Some(ReplyMessage::Message(message)), _) => message,
        (Some(ReplyMessage::Text(text)), _) | (None, Some(text)) => ChatMessage::assistant(text),
        (None, None) => {
            return Err(ApiError::UnexpectedReply(
                "reply has neither message nor text".to_string(),
            ))
        }
    };

    Ok(AskReply {
        message,
        tool_calls: body.tool_calls.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;

    fn parse(json: &str) -> Result<AskReply> {
        parse_json_reply(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.url("/health"), "http://localhost:8000/health");
    }

    #[test]
    fn test_parse_message_object() {
        let reply = parse(r#"{"message":{"role":"assistant","content":"hi"}}"#).unwrap();
        assert_eq!(reply.message, ChatMessage::assistant("hi"));
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_message_string_and_null_tools() {
        let reply = parse(r#"{"message":"plain","tool_calls":null}"#).unwrap();
        assert_eq!(reply.message.role, ChatRole::Assistant);
        assert_eq!(reply.message.content, "plain");
    }

    #[test]
    fn test_parse_legacy_text() {
        let reply = parse(r#"{"text":"from the old backend"}"#).unwrap();
        assert_eq!(reply.message.content, "from the old backend");
    }

    #[test]
    fn test_parse_tool_calls() {
        let reply = parse(
            r#"{"message":{"role":"assistant","content":"done"},
                "tool_calls":[{"name":"search","result":"3 hits"},{"result":{"n":1}},{}]}"#,
        )
        .unwrap();
        assert_eq!(reply.tool_calls.len(), 3);
        assert_eq!(reply.tool_calls[0].result_text().as_deref(), Some("3 hits"));
        assert!(reply.tool_calls[1].result_text().unwrap().contains("\"n\": 1"));
        assert_eq!(reply.tool_calls[2].result_text(), None);
    }

    #[test]
    fn test_parse_empty_object_is_error() {
        assert!(matches!(parse("{}"), Err(ApiError::UnexpectedReply(_))));
    }
}
