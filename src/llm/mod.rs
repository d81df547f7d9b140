//! OpenAI-compatible chat completion client, plus the two uses the pipeline
//! makes of it: rephrasing queries and answering from retrieved chunks.


use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::chunking::Chunk;
use crate::config::LlmConfig;
use crate::http::HttpTransport;
use crate::retrieval::QueryExpander;
use crate::{RagError, Result};

const EXPANSION_SYSTEM_PROMPT: &str = "You rewrite search queries for a document retrieval system. \
Reply with JSON only, exactly one key named \"revisedQuery\" holding an array of strings, \
for example {\"revisedQuery\": [\"revised query 1\", \"revised query 2\"]}.";

const ANSWER_SYSTEM_PROMPT: &str = "You answer questions using the context passages provided. \
Keep the answer concise and base it on the context; say so when the context does not contain the answer.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RevisedQueries {
    #[serde(rename = "revisedQuery")]
    revised_query: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    transport: HttpTransport,
}

impl ChatClient {
    /// Client for `config`, reading the bearer token from the configured
    /// environment variable when it is set
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config
            .endpoint_url()
            .map_err(|e| RagError::Configuration(format!("invalid LLM endpoint: {e}")))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                "{} is not set, calling {} without credentials",
                config.api_key_env, endpoint
            );
        }

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
            transport: HttpTransport::new(Duration::from_secs(config.timeout_seconds))
                .with_retry_attempts(config.retry_attempts),
        })
    }

    #[inline]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[inline]
    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    #[inline]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Assistant reply to `messages`
    #[inline]
    pub fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.send(messages, None)
    }

    /// Assistant reply constrained to a JSON object
    #[inline]
    pub fn complete_json(&self, messages: &[ChatMessage]) -> Result<String> {
        self.send(messages, Some(ResponseFormat { kind: "json_object" }))
    }

    fn send(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format,
        };
        debug!(
            "Sending {} messages to {} ({})",
            messages.len(),
            self.endpoint,
            self.model
        );

        let response_text = self
            .transport
            .post_json(&self.endpoint, &request, self.api_key.as_deref())
            .context("Chat completion request failed")
            .map_err(|e| RagError::Llm(format!("{e:#}")))?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Llm(format!("Failed to parse chat response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Llm("chat response has no message content".to_string()))
    }
}

/// Rephrases queries through the chat model using the `{"revisedQuery": [..]}` contract
#[derive(Debug, Clone)]
pub struct LlmQueryExpander {
    client: ChatClient,
    count: usize,
}

impl LlmQueryExpander {
    #[inline]
    pub fn new(client: ChatClient, count: usize) -> Self {
        Self {
            client,
            count: count.max(1),
        }
    }
}

impl QueryExpander for LlmQueryExpander {
    #[inline]
    fn expand(&self, query: &str) -> Result<Vec<String>> {
        let messages = [
            ChatMessage::system(EXPANSION_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Please provide {} revised versions of this query: {query}",
                self.count
            )),
        ];
        let content = self.client.complete_json(&messages)?;

        let mut variants = parse_revised_queries(&content)?;
        variants.truncate(self.count);
        debug!("Expanded query into {} variants", variants.len());
        Ok(variants)
    }
}

/// Parse a `{"revisedQuery": [..]}` reply, tolerating a Markdown code fence
/// around it. Blank entries are dropped.
#[inline]
pub fn parse_revised_queries(content: &str) -> Result<Vec<String>> {
    let json = strip_code_fence(content);
    let parsed: RevisedQueries = serde_json::from_str(json).map_err(|e| {
        RagError::Llm(format!(
            "expansion reply does not match {{\"revisedQuery\": [..]}}: {e}"
        ))
    })?;

    let total = parsed.revised_query.len();
    let variants: Vec<String> = parsed
        .revised_query
        .into_iter()
        .map(|variant| variant.trim().to_string())
        .filter(|variant| !variant.is_empty())
        .collect();
    if variants.len() < total {
        warn!("Discarded {} blank query variants", total - variants.len());
    }
    Ok(variants)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening fence line
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Answers a query from retrieved chunks
#[derive(Debug, Clone)]
pub struct AnswerGenerator {
    client: ChatClient,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    #[inline]
    pub fn answer(&self, query: &str, chunks: &[Chunk]) -> Result<String> {
        let messages = [
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(build_answer_prompt(query, chunks)),
        ];
        self.client.complete(&messages)
    }
}

/// User message carrying the numbered context passages followed by the question
#[inline]
pub fn build_answer_prompt(query: &str, chunks: &[Chunk]) -> String {
    let mut prompt = String::from("Context:\n");
    if chunks.is_empty() {
        prompt.push_str("(no relevant passages were found)\n");
    }
    for (position, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] {}", position + 1, chunk.raw_text.trim());
    }
    let _ = write!(prompt, "\nQuestion: {}", query.trim());
    prompt
}
