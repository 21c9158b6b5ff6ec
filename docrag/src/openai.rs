//! OpenAI-compatible embedding and answering collaborators.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! types talk to any server exposing the OpenAI `/embeddings` and
//! `/chat/completions` endpoints: the public API, a compatible server behind
//! a different base URL, or an Azure OpenAI deployment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::answer::Answerer;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model used by [`OpenAIAnswerer`].
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// The Azure OpenAI REST API version used when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

const PROVIDER: &str = "OpenAI";

const SYSTEM_PROMPT: &str = "Answer the question using only the provided context. \
If the context does not contain the answer, say that you don't know.";

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const ENV_AZURE_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
const ENV_AZURE_API_KEY: &str = "AZURE_OPENAI_API_KEY";
const ENV_AZURE_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
/// Deployment read by [`OpenAIEmbeddingProvider::from_env`] in Azure mode.
pub const ENV_AZURE_EMBEDDING_DEPLOYMENT: &str = "AZURE_OPENAI_EMBEDDING_DEPLOYMENT";
/// Deployment read by [`OpenAIAnswerer::from_env`] in Azure mode.
pub const ENV_AZURE_CHAT_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";

/// Where requests go and how they authenticate.
#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    /// `{base_url}/{path}` with `Authorization: Bearer`.
    OpenAI { base_url: String },
    /// `{endpoint}/openai/deployments/{deployment}/{path}?api-version=…` with `api-key`.
    Azure { endpoint: String, deployment: String, api_version: String },
}

/// Shared connection settings for both collaborators.
#[derive(Clone)]
struct Connection {
    client: reqwest::Client,
    api_key: String,
    endpoint: Endpoint,
}

impl Connection {
    fn new(api_key: String, endpoint: Endpoint) -> Result<Self> {
        if api_key.is_empty() {
            return Err(RagError::ConfigError("API key must not be empty".into()));
        }
        if let Endpoint::Azure { endpoint, deployment, .. } = &endpoint {
            if endpoint.is_empty() || deployment.is_empty() {
                return Err(RagError::ConfigError(
                    "Azure endpoint and deployment must not be empty".into(),
                ));
            }
        }
        Ok(Self { client: reqwest::Client::new(), api_key, endpoint })
    }

    fn openai(api_key: String) -> Result<Self> {
        Self::new(api_key, Endpoint::OpenAI { base_url: DEFAULT_BASE_URL.into() })
    }

    /// Resolve settings from `lookup`: Azure mode when `AZURE_OPENAI_ENDPOINT`
    /// is set, the public OpenAI API otherwise.
    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        deployment_var: &str,
    ) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                RagError::ConfigError(format!("{key} environment variable not set"))
            })
        };

        match lookup(ENV_AZURE_ENDPOINT) {
            Some(endpoint) => {
                let endpoint = Endpoint::Azure {
                    endpoint,
                    deployment: required(deployment_var)?,
                    api_version: lookup(ENV_AZURE_API_VERSION)
                        .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                };
                Self::new(required(ENV_AZURE_API_KEY)?, endpoint)
            }
            None => {
                let base_url =
                    lookup(ENV_OPENAI_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                Self::new(required(ENV_OPENAI_API_KEY)?, Endpoint::OpenAI { base_url })
            }
        }
    }

    fn set_base_url(&mut self, base_url: String) {
        self.endpoint = Endpoint::OpenAI { base_url };
    }

    fn url(&self, path: &str) -> String {
        match &self.endpoint {
            Endpoint::OpenAI { base_url } => format!("{}/{path}", base_url.trim_end_matches('/')),
            Endpoint::Azure { endpoint, deployment, api_version } => format!(
                "{}/openai/deployments/{deployment}/{path}?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
        }
    }

    /// A POST request to `path` carrying the mode's authentication header.
    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(self.url(path));
        match self.endpoint {
            Endpoint::OpenAI { .. } => request.bearer_auth(&self.api_key),
            Endpoint::Azure { .. } => request.header("api-key", &self.api_key),
        }
    }

    /// POST `body` to `path` and decode the JSON response, describing any
    /// failure as a plain message.
    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<R, String> {
        let response = self
            .request(path)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`. Ignored by Azure, where
///   the deployment selects the model.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the environment (see [`from_env`](Self::from_env)).
/// - `base_url` – defaults to the public API; `OPENAI_BASE_URL` overrides it in `from_env`.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let azure = OpenAIEmbeddingProvider::azure(
///     "https://my-resource.openai.azure.com",
///     "azure-key",
///     "text-embedding-ada-002",
///     "2024-02-15-preview",
/// )?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    connection: Connection,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider for the public OpenAI API with the given key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_connection(Connection::openai(api_key.into())?))
    }

    /// Create a provider for an Azure OpenAI embedding deployment.
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Endpoint::Azure {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        };
        Ok(Self::with_connection(Connection::new(api_key.into(), endpoint)?))
    }

    /// Create a provider from the environment.
    ///
    /// When `AZURE_OPENAI_ENDPOINT` is set, reads `AZURE_OPENAI_API_KEY`,
    /// `AZURE_OPENAI_EMBEDDING_DEPLOYMENT` and optional `AZURE_OPENAI_API_VERSION`.
    /// Otherwise reads `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let connection =
            Connection::from_lookup(|key| std::env::var(key).ok(), ENV_AZURE_EMBEDDING_DEPLOYMENT)?;
        Ok(Self::with_connection(connection))
    }

    fn with_connection(connection: Connection) -> Self {
        Self {
            connection,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        }
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point the provider at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.connection.set_base_url(base_url.into());
        self
    }
}

/// An [`Answerer`] backed by the OpenAI chat completions API.
///
/// Sends a fixed system message telling the model to answer only from the
/// context, then one user message holding the retrieved context followed by
/// the question. Temperature is 0.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::openai::OpenAIAnswerer;
///
/// let answerer = OpenAIAnswerer::from_env()?.with_model("gpt-4o-mini");
/// ```
pub struct OpenAIAnswerer {
    connection: Connection,
    model: String,
}

impl OpenAIAnswerer {
    /// Create a new answerer for the public OpenAI API with the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_connection(Connection::openai(api_key.into())?))
    }

    /// Create an answerer for an Azure OpenAI chat deployment.
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Endpoint::Azure {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        };
        Ok(Self::with_connection(Connection::new(api_key.into(), endpoint)?))
    }

    /// Create an answerer from the environment.
    ///
    /// When `AZURE_OPENAI_ENDPOINT` is set, reads `AZURE_OPENAI_API_KEY`,
    /// `AZURE_OPENAI_DEPLOYMENT` and optional `AZURE_OPENAI_API_VERSION`.
    /// Otherwise reads `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let connection =
            Connection::from_lookup(|key| std::env::var(key).ok(), ENV_AZURE_CHAT_DEPLOYMENT)?;
        Ok(Self::with_connection(connection))
    }

    fn with_connection(connection: Connection) -> Self {
        Self { connection, model: DEFAULT_CHAT_MODEL.into() }
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the answerer at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.connection.set_base_url(base_url.into());
        self
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn user_message(query: &str, context: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {query}")
}

/// Order embeddings by their reported `index`, falling back to response order.
fn ordered_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}

// ── Collaborator implementations ───────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response: EmbeddingResponse =
            self.connection.post("embeddings", &request_body).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "embedding request failed");
                RagError::embedding(PROVIDER, message)
            })?;

        Ok(ordered_embeddings(response.data))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl Answerer for OpenAIAnswerer {
    async fn generate(&self, query: &str, context: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            context_len = context.len(),
            "generating answer"
        );

        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: user_message(query, context) },
            ],
            temperature: 0.0,
        };

        let response: ChatResponse =
            self.connection.post("chat/completions", &request_body).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "chat request failed");
                RagError::generation(PROVIDER, message)
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::generation(PROVIDER, "API returned no answer"))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::ConfigError(_))));
        assert!(matches!(OpenAIAnswerer::new(""), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn base_url_joins_paths() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.connection.url("embeddings"), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn openai_requests_use_bearer_auth() {
        let answerer = OpenAIAnswerer::new("sk-test").unwrap();
        let request = answerer.connection.request("chat/completions").build().unwrap();

        assert_eq!(request.url().as_str(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(request.headers()["authorization"], "Bearer sk-test");
        assert!(request.headers().get("api-key").is_none());
    }

    #[test]
    fn azure_requests_target_the_deployment() {
        let provider = OpenAIEmbeddingProvider::azure(
            "https://my-resource.openai.azure.com/",
            "azure-key",
            "embed-small",
            "2024-02-15-preview",
        )
        .unwrap();
        let request = provider.connection.request("embeddings").build().unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://my-resource.openai.azure.com/openai/deployments/embed-small/embeddings\
             ?api-version=2024-02-15-preview"
        );
        assert_eq!(request.headers()["api-key"], "azure-key");
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn azure_requires_endpoint_and_deployment() {
        let err = OpenAIAnswerer::azure("", "key", "chat", DEFAULT_AZURE_API_VERSION);
        assert!(matches!(err, Err(RagError::ConfigError(_))));
        let err = OpenAIAnswerer::azure("https://x.openai.azure.com", "key", "", "v");
        assert!(matches!(err, Err(RagError::ConfigError(_))));
    }

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars.to_vec();
        move |key: &str| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn environment_selects_azure_mode() {
        let connection = Connection::from_lookup(
            lookup(&[
                (ENV_AZURE_ENDPOINT, "https://my-resource.openai.azure.com"),
                (ENV_AZURE_API_KEY, "azure-key"),
                (ENV_AZURE_CHAT_DEPLOYMENT, "gpt-35"),
                (ENV_AZURE_EMBEDDING_DEPLOYMENT, "ada"),
                (ENV_OPENAI_API_KEY, "sk-ignored"),
            ]),
            ENV_AZURE_CHAT_DEPLOYMENT,
        )
        .unwrap();

        assert_eq!(
            connection.endpoint,
            Endpoint::Azure {
                endpoint: "https://my-resource.openai.azure.com".to_string(),
                deployment: "gpt-35".to_string(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        );
        assert_eq!(connection.api_key, "azure-key");
    }

    #[test]
    fn azure_mode_needs_its_deployment() {
        let err = Connection::from_lookup(
            lookup(&[(ENV_AZURE_ENDPOINT, "https://x.openai.azure.com"), (ENV_AZURE_API_KEY, "k")]),
            ENV_AZURE_EMBEDDING_DEPLOYMENT,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains(ENV_AZURE_EMBEDDING_DEPLOYMENT));
    }

    #[test]
    fn environment_defaults_to_openai() {
        let connection = Connection::from_lookup(
            lookup(&[
                (ENV_OPENAI_API_KEY, "sk-test"),
                (ENV_OPENAI_BASE_URL, "http://localhost:1234/v1"),
            ]),
            ENV_AZURE_EMBEDDING_DEPLOYMENT,
        )
        .unwrap();
        assert_eq!(connection.url("embeddings"), "http://localhost:1234/v1/embeddings");
    }

    #[test]
    fn dimension_override() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_dimensions(256);
        assert_eq!(provider.dimensions(), 256);
        assert_eq!(provider.request_dimensions, Some(256));
    }

    #[test]
    fn embeddings_follow_reported_index() {
        let data: Vec<EmbeddingData> = serde_json::from_str(
            r#"[{"index": 1, "embedding": [2.0]}, {"index": 0, "embedding": [1.0]}]"#,
        )
        .unwrap();
        assert_eq!(ordered_embeddings(data), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn user_message_puts_context_before_question() {
        let message = user_message("why?", "because");
        assert!(message.find("because").unwrap() < message.find("why?").unwrap());
    }
}
