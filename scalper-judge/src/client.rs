use crate::{error::JudgeError, prompt::Prompt};
use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use scalper_integration::protocol::http::{
    HttpParser,
    public::PublicHeaders,
    rest::{RestRequest, client::RestClient},
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{borrow::Cow, sync::Arc, time::Duration};

/// Transport to an external judge model.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Model identifier, used to key the model's rate limiter & circuit breaker.
    fn model(&self) -> &str;

    /// Send the [`Prompt`] and return the raw completion text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, JudgeError>;
}

#[async_trait]
impl<Client> JudgeClient for Arc<Client>
where
    Client: JudgeClient + ?Sized,
{
    fn model(&self) -> &str {
        self.as_ref().model()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, JudgeError> {
        self.as_ref().complete(prompt).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Cow<'static, str>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionBody {
    pub model: SmolStr,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// OpenAI compatible `POST /chat/completions` [`RestRequest`].
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub body: ChatCompletionBody,
    pub timeout: Duration,
}

impl RestRequest for ChatCompletionRequest {
    type Response = ChatCompletionResponse;
    type QueryParams = ();
    type Body = ChatCompletionBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/chat/completions")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Maps chat completion API errors into [`JudgeError`]s.
#[derive(Debug, Copy, Clone)]
pub struct JudgeParser;

impl HttpParser for JudgeParser {
    type ApiError = serde_json::Value;
    type OutputError = JudgeError;

    fn parse_api_error(&self, status: StatusCode, error: Self::ApiError) -> Self::OutputError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => JudgeError::RateLimited,
            status if status.is_success() => {
                JudgeError::Validation(format!("unexpected completion payload: {error}"))
            }
            status => JudgeError::Service {
                status: status.as_u16(),
                body: error.to_string(),
            },
        }
    }
}

/// Http [`JudgeClient`] for OpenAI compatible chat completion APIs.
#[derive(Debug)]
pub struct HttpJudgeClient {
    model: SmolStr,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    rest_client: RestClient<'static, PublicHeaders, JudgeParser>,
}

impl HttpJudgeClient {
    pub fn new(
        base_url: impl Into<Cow<'static, str>>,
        api_key: Option<&str>,
        model: impl Into<SmolStr>,
        temperature: f64,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, JudgeError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|error| JudgeError::Validation(format!("invalid api key: {error}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            model: model.into(),
            temperature,
            max_tokens,
            timeout,
            rest_client: RestClient::new(base_url, PublicHeaders::new(headers), JudgeParser),
        })
    }
}

#[async_trait]
impl JudgeClient for HttpJudgeClient {
    fn model(&self) -> &str {
        self.model.as_str()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, JudgeError> {
        let request = ChatCompletionRequest {
            body: ChatCompletionBody {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage {
                        role: Cow::Borrowed("system"),
                        content: prompt.system.clone(),
                    },
                    ChatMessage {
                        role: Cow::Borrowed("user"),
                        content: prompt.user.clone(),
                    },
                ],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
            timeout: self.timeout,
        };

        let (response, _latency) = self.rest_client.execute(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| JudgeError::Validation(String::from("completion has no choices")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_maps_status() {
        struct TestCase {
            status: StatusCode,
            payload: &'static str,
            expected: JudgeError,
        }

        let cases = vec![
            // TC0: 429 json error
            TestCase {
                status: StatusCode::TOO_MANY_REQUESTS,
                payload: r#"{"error": "slow down"}"#,
                expected: JudgeError::RateLimited,
            },
            // TC1: 503 json error
            TestCase {
                status: StatusCode::SERVICE_UNAVAILABLE,
                payload: r#"{"error": "overloaded"}"#,
                expected: JudgeError::Service {
                    status: 503,
                    body: String::from(r#"{"error":"overloaded"}"#),
                },
            },
            // TC2: 502 html error page
            TestCase {
                status: StatusCode::BAD_GATEWAY,
                payload: "<html>bad gateway</html>",
                expected: JudgeError::Service {
                    status: 502,
                    body: String::from("<html>bad gateway</html>"),
                },
            },
            // TC3: 200 with the wrong shape
            TestCase {
                status: StatusCode::OK,
                payload: r#"{"unexpected": true}"#,
                expected: JudgeError::Validation(String::from(
                    r#"unexpected completion payload: {"unexpected":true}"#,
                )),
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = JudgeParser
                .parse::<ChatCompletionResponse>(test.status, test.payload.as_bytes())
                .unwrap_err();
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_parser_ok() {
        let payload = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"action\": \"HOLD\"}"}}]}"#;
        let actual = JudgeParser
            .parse::<ChatCompletionResponse>(StatusCode::OK, payload.as_bytes())
            .unwrap();
        assert_eq!(actual.choices[0].message.content, r#"{"action": "HOLD"}"#);
    }
}
