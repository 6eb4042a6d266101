use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;

use crate::error::AiError;

/// One request/response exchange with a language model.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub json_response: bool,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn text(system: &str, user: &str) -> Self {
        Prompt {
            system: system.to_string(),
            user: user.to_string(),
            json_response: false,
            max_tokens: 1000,
        }
    }

    pub fn json(system: &str, user: &str) -> Self {
        Prompt {
            json_response: true,
            ..Prompt::text(system, user)
        }
    }
}

/// Free text in, free text out. Callers validate whatever shape they expect.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AiError>;
}

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenaiClient {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
            model: model.to_string(),
            timeout,
        }
    }

    async fn create(&self, prompt: &Prompt) -> Result<String, AiError> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.as_str())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.as_str())
                .build()?
                .into(),
        ];

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(self.model.clone())
            .messages(messages)
            .max_tokens(prompt.max_tokens);
        if prompt.json_response {
            request.response_format(ResponseFormat::JsonObject);
        }
        let request = request.build()?;

        let response = self.client.chat().create(request).await?;
        log::debug!("Openai usage: {:?}", response.usage);

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionModel for OpenaiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AiError> {
        match tokio::time::timeout(self.timeout, self.create(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("Openai completion timed out after {:?}", self.timeout);
                Err(AiError::Timeout)
            }
        }
    }
}

fn strip_list_marker(line: &str) -> &str {
    let without_number = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let unmarked = match without_number.len() < line.len() {
        true => match without_number.strip_prefix(['.', ')']) {
            Some(rest) => rest,
            None => line,
        },
        false => line.trim_start_matches(['-', '*', '•']),
    };
    unmarked.trim()
}

/// Splits a newline-separated completion into clean entries, dropping list markers and quotes.
pub fn parse_lines(content: &str, limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = vec![];

    for line in content.lines() {
        let line = strip_list_marker(line.trim()).trim_matches('"').trim();
        if line.is_empty() || lines.iter().any(|l| l.eq_ignore_ascii_case(line)) {
            continue;
        }
        lines.push(line.to_string());
        if lines.len() >= limit {
            break;
        }
    }

    lines
}
