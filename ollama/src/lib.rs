//! Minimal Ollama chat API client.
//!
//! This crate provides a focused client for a locally hosted Ollama
//! server's `/api/chat` endpoint with:
//! - Non-streaming and streaming chat completions
//! - Tool (function) calling support
//! - Schema-constrained JSON output via the `format` field
//! - Buffered NDJSON parsing for streaming responses

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";

/// Errors that can occur when talking to an Ollama server.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not reach the Ollama server: {0}")]
    Network(String),

    #[error("Ollama answered with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unreadable Ollama response: {0}")]
    Parse(String),
}

/// Ollama API client.
#[derive(Clone)]
pub struct Ollama {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl Ollama {
    /// Create a client for the default local host.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the OLLAMA_HOST and OLLAMA_MODEL environment
    /// variables, falling back to the defaults for any that are unset.
    pub fn from_env() -> Self {
        let mut client = Self::new();
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            client = client.with_host(host);
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            client = client.with_model(model);
        }
        client
    }

    /// Set the server host, e.g. `http://localhost:11434`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The model requests default to when they name none.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat request and return the full response.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let api_request = self.build_api_request(&request, false);
        let response = self.post_chat(&api_request).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    /// Send a chat request and stream the response chunk by chunk.
    ///
    /// Each item is one NDJSON line from the server: intermediate chunks
    /// carry a content delta in `message.content`, the final chunk has
    /// `done == true` and may carry tool calls and token counts.
    pub async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<ChatResponse, Error>> + Send>>, Error> {
        let api_request = self.build_api_request(&request, true);
        let response = self.post_chat(&api_request).await?;

        // The scan state carries a partial NDJSON line across network chunks.
        let stream = response
            .bytes_stream()
            .scan(String::new(), |carry, piece| {
                let batch = match piece {
                    Ok(bytes) => {
                        carry.push_str(&String::from_utf8_lossy(&bytes));
                        drain_complete_lines(carry)
                    }
                    Err(e) => vec![Err(Error::Network(e.to_string()))],
                };
                futures::future::ready(Some(batch))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    /// POST to `/api/chat`, turning transport failures and non-2xx
    /// statuses into errors.
    async fn post_chat(&self, api_request: &ApiChatRequest) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(Error::Api { status, message })
    }

    fn build_api_request(&self, request: &ChatRequest, stream: bool) -> ApiChatRequest {
        ApiChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            messages: request.messages.clone(),
            stream,
            format: request.format.clone(),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools.clone())
            },
            options: request.options.clone(),
            keep_alive: request.keep_alive.clone(),
        }
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

/// A chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub format: Option<serde_json::Value>,
    pub tools: Vec<Tool>,
    pub options: Option<ModelOptions>,
    pub keep_alive: Option<String>,
}

impl ChatRequest {
    /// Create a request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Override the client's default model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Constrain output to a JSON schema (Ollama's `format` field).
    pub fn with_format(mut self, schema: serde_json::Value) -> Self {
        self.format = Some(schema);
        self
    }

    /// Make the given tools available to the model.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Set model runner options (temperature etc.).
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Control how long the model stays loaded after the request.
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    /// Append a message to the conversation.
    pub fn add_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create a tool-result message answering a tool call.
    pub fn tool(text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: text.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A function tool the model may call.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub r#type: String,
    pub function: ToolFunction,
}

impl Tool {
    /// Define a function tool with a JSON-schema parameter description.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            r#type: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// The function half of a tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolCallFunction,
}

/// Name and arguments of a requested tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Model runner options forwarded verbatim to the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl ModelOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_num_predict(mut self, num_predict: i32) -> Self {
        self.num_predict = Some(num_predict);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A chat response, or one chunk of a streaming response.
///
/// Ollama uses the same JSON shape for both: a streaming response is a
/// sequence of these with `done == false` until the last.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub message: Message,
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl ChatResponse {
    /// The assistant text of this response or chunk.
    pub fn text(&self) -> &str {
        &self.message.content
    }

    /// Tool calls requested by the model, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.message.tool_calls
    }
}

#[derive(Debug, Serialize)]
struct ApiChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ModelOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorLine {
    error: String,
}

/// Parse every complete NDJSON line out of `carry`, leaving a trailing
/// partial line (no newline yet) for the next network chunk.
fn drain_complete_lines(carry: &mut String) -> Vec<Result<ChatResponse, Error>> {
    let mut batch = Vec::new();

    while let Some(end) = carry.find('\n') {
        let line = carry[..end].trim();
        if !line.is_empty() {
            batch.push(parse_chunk_line(line));
        }
        carry.drain(..=end);
    }

    batch
}

/// Decode one NDJSON line. The server reports mid-stream failures as a
/// bare `{"error": ...}` object instead of a chunk.
fn parse_chunk_line(line: &str) -> Result<ChatResponse, Error> {
    if let Ok(chunk) = serde_json::from_str::<ChatResponse>(line) {
        return Ok(chunk);
    }
    match serde_json::from_str::<ApiErrorLine>(line) {
        Ok(reported) => Err(Error::Api {
            status: 200,
            message: reported.error,
        }),
        Err(e) => Err(Error::Parse(format!("bad NDJSON line: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_uses_local_defaults() {
        let client = Ollama::new();
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.host, DEFAULT_HOST);
    }

    #[test]
    fn test_client_with_host_trims_slash() {
        let client = Ollama::new().with_host("http://models.local:11434/");
        assert_eq!(client.host, "http://models.local:11434");
    }

    #[test]
    fn test_request_builder_chains() {
        let request = ChatRequest::new(vec![Message::user("Hello")])
            .with_model("mistral")
            .with_format(serde_json::json!({"type": "object"}))
            .with_options(ModelOptions::default().with_temperature(0.7));

        assert_eq!(request.model.as_deref(), Some("mistral"));
        assert!(request.format.is_some());
        assert_eq!(
            request.options.as_ref().and_then(|o| o.temperature),
            Some(0.7)
        );
    }

    #[test]
    fn test_message_constructors_set_roles() {
        let said = Message::user("Hello");
        assert_eq!(said.role, Role::User);
        assert!(said.tool_calls.is_empty());

        let answered = Message::tool("{\"total\": 7}");
        assert_eq!(answered.role, Role::Tool);
    }

    #[test]
    fn test_tool_definition_serializes_as_function() {
        let tool = Tool::function(
            "roll_dice",
            "Roll some dice",
            serde_json::json!({"type": "object", "properties": {}}),
        );
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "roll_dice");
    }

    #[test]
    fn test_empty_tools_omitted_from_request() {
        let client = Ollama::new();
        let api = client.build_api_request(&ChatRequest::new(vec![Message::user("hi")]), false);
        let value = serde_json::to_value(&api).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn test_parse_complete_lines() {
        let mut buffer = String::from(
            "{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"Once\"},\"done\":false}\n\
             {\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\"}\n",
        );
        let chunks = drain_complete_lines(&mut buffer);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().text(), "Once");
        assert!(chunks[1].as_ref().unwrap().done);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_keeps_incomplete_tail() {
        let mut buffer = String::from(
            "{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"a\"},\"done\":false}\n\
             {\"model\":\"m\",\"mess",
        );
        let chunks = drain_complete_lines(&mut buffer);
        assert_eq!(chunks.len(), 1);
        assert_eq!(buffer, "{\"model\":\"m\",\"mess");

        buffer.push_str("age\":{\"role\":\"assistant\",\"content\":\"b\"},\"done\":false}\n");
        let chunks = drain_complete_lines(&mut buffer);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().text(), "b");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_error_line() {
        let mut buffer = String::from("{\"error\":\"model not found\"}\n");
        let chunks = drain_complete_lines(&mut buffer);
        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            Err(Error::Api { status, message }) => {
                assert_eq!(*status, 200);
                assert_eq!(message, "model not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tool_call_chunk() {
        let mut buffer = String::from(
            "{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"\",\
             \"tool_calls\":[{\"function\":{\"name\":\"roll_dice\",\"arguments\":{\"sides\":20}}}]},\
             \"done\":true,\"done_reason\":\"stop\"}\n",
        );
        let chunks = drain_complete_lines(&mut buffer);
        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.tool_calls().len(), 1);
        assert_eq!(chunk.tool_calls()[0].function.name, "roll_dice");
        assert_eq!(chunk.tool_calls()[0].function.arguments["sides"], 20);
    }
}
