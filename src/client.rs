use std::env;
use std::fmt;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::future;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUEST_RETRIES, CLIENT_REQUESTS,
    CLIENT_RETRY_BACKOFF,
};
use crate::retry::RetryConfig;
use crate::sse::process_sse_with_idle_timeout;
use crate::types::{ApiErrorBody, ChatCompletionChunk, ChatCompletionParams};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable holding the optional organization ID.
pub const ORGANIZATION_VAR: &str = "OPENAI_ORG_ID";

/// A streamed reply as decoded chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// A streamed reply as text fragments, in order.
///
/// The stream is finite and not restartable.  Dropping it closes the underlying connection.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A service that answers a conversation with a streamed reply.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a streamed reply to `params.messages`.
    ///
    /// Errors that happen before the first fragment is available are returned here; errors
    /// after that point are items of the returned stream.
    async fn stream_chat(&self, params: ChatCompletionParams) -> Result<FragmentStream>;
}

/// Client for an OpenAI-compatible chat completion API.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    organization: Option<String>,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl OpenAi {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the `OPENAI_API_KEY` environment
    /// variable.  `OPENAI_ORG_ID` is sent along when it is set.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_VAR).map_err(|_| {
                Error::configuration(format!(
                    "Please set the {API_KEY_VAR} environment variable."
                ))
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(Error::configuration(format!(
                "{API_KEY_VAR} must not be empty."
            )));
        }

        let organization = env::var(ORGANIZATION_VAR)
            .ok()
            .filter(|org| !org.trim().is_empty());
        let base_url = normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = build_http_client(timeout)?;

        Ok(Self {
            api_key,
            organization,
            client,
            base_url,
            timeout,
            retry: RetryConfig::default(),
        })
    }

    /// Set or clear the organization sent with each request.
    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Set the timeout for connecting, for the response headers, and for each gap between
    /// stream chunks.  A reply may take longer than this in total.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_http_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Set the number of retries after a failed attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The API root every request path is joined to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The connect, first-byte and idle timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The organization sent with each request, if any.
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// The retry policy.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            Error::configuration(format!(
                "{API_KEY_VAR} contains characters that cannot be sent in a header"
            ))
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        if let Some(organization) = &self.organization {
            let value = HeaderValue::from_str(organization).map_err(|_| {
                Error::configuration(format!(
                    "{ORGANIZATION_VAR} contains characters that cannot be sent in a header"
                ))
            })?;
            headers.insert("OpenAI-Organization", value);
        }
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.trim().parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ApiErrorBody>(&error_body)
            .ok()
            .map(|body| body.error)
            .unwrap_or_default();
        let error_message = detail.message.unwrap_or_else(|| {
            if error_body.trim().is_empty() {
                format!("HTTP {status_code}")
            } else {
                error_body.clone()
            }
        });

        match status_code {
            400 => Error::bad_request(error_message, detail.param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message, request_id),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, detail.error_type, error_message, request_id),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("could not connect: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// POST `body` to `url`, retrying retryable failures with backoff.
    ///
    /// Only establishing the response is retried.  Once a successful status has arrived the
    /// body belongs to the caller and is never replayed.
    async fn post_with_retry(&self, url: &str, body: &ChatCompletionParams) -> Result<Response> {
        let headers = self.default_headers()?;
        let mut attempt: u32 = 0;
        loop {
            CLIENT_REQUESTS.click();
            let start = Instant::now();
            // Bounds the wait for response headers, not the body.
            let send = self
                .client
                .post(url)
                .headers(headers.clone())
                .json(body)
                .send();
            let result = tokio::time::timeout(self.timeout, send).await;
            CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

            let error = match result {
                Ok(Ok(response)) if response.status().is_success() => return Ok(response),
                Ok(Ok(response)) => Self::process_error_response(response).await,
                Ok(Err(e)) => self.transport_error(e),
                Err(_) => Error::timeout(
                    format!("no response within {:.1}s", self.timeout.as_secs_f64()),
                    Some(self.timeout.as_secs_f64()),
                ),
            };
            CLIENT_REQUEST_ERRORS.click();

            attempt += 1;
            if !error.is_retryable() || attempt > self.retry.max_retries {
                tracing::warn!(
                    attempt,
                    status = error.status_code(),
                    request_id = error.request_id(),
                    error = %error,
                    "chat completion request failed"
                );
                return Err(error);
            }
            let delay = self.retry.delay_for(attempt, error.retry_after());
            CLIENT_REQUEST_RETRIES.click();
            CLIENT_RETRY_BACKOFF.add(delay.as_secs_f64());
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying chat completion request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Send a conversation to the API and get a streaming response.
    ///
    /// Returns a stream of decoded chunks that can be processed incrementally.
    pub async fn stream(&self, params: ChatCompletionParams) -> Result<ChunkStream> {
        let params = params.streaming();
        let url = format!("{}chat/completions", self.base_url);
        tracing::debug!(
            model = %params.model,
            messages = params.messages.len(),
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            "opening chat completion stream"
        );

        let response = self.post_with_retry(&url, &params).await?;
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .unwrap_or("-")
            .to_string();
        tracing::debug!(status = response.status().as_u16(), request_id = %request_id, "stream opened");

        Ok(Box::pin(process_sse_with_idle_timeout(
            response.bytes_stream(),
            Some(self.timeout),
        )))
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAi {
    async fn stream_chat(&self, params: ChatCompletionParams) -> Result<FragmentStream> {
        let chunks = self.stream(params).await?;
        let fragments = chunks.filter_map(|item| {
            future::ready(match item {
                Ok(chunk) => chunk.text().map(|text| Ok(text.to_string())),
                Err(err) => Some(Err(err)),
            })
        });
        Ok(Box::pin(fragments))
    }
}

impl fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAi")
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

fn build_http_client(timeout: Duration) -> Result<ReqwestClient> {
    ReqwestClient::builder()
        .connect_timeout(timeout)
        .build()
        .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))
}

/// Parse the API root and make sure relative paths join beneath it.
fn normalize_base_url(base_url: &str) -> Result<String> {
    let parsed = url::Url::parse(base_url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::url(
            format!("unsupported scheme in base URL {base_url}"),
            None,
        ));
    }
    let mut base_url = parsed.to_string();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    Ok(base_url)
}
