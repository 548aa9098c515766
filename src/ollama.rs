//! Client for a local Ollama server, used both for text generation and for
//! embeddings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{Error, Result},
    strategy::Generator,
    vector_index::Embedder,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_LLM_MODEL: &str = "llama3";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    llm_model: String,
    embed_model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        llm_model: &str,
        embed_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::unavailable("ollama", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            llm_model: llm_model.to_string(),
            embed_model: embed_model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::unavailable("ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::unavailable(
                "ollama",
                format!("{url} returned {status}: {}", body.trim()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::unavailable("ollama", e))
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.llm_model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        let response: GenerateResponse =
            self.post("/api/generate", &request).await?;
        Ok(response.response)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.embed_model,
            input: texts,
        };
        let response: EmbedResponse = self.post("/api/embed", &request).await?;
        tracing::debug!(
            count = response.embeddings.len(),
            model = %self.embed_model,
            "embedded texts"
        );
        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> OllamaClient {
        // Bind and drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        OllamaClient::new(
            &format!("http://127.0.0.1:{port}/"),
            DEFAULT_LLM_MODEL,
            DEFAULT_EMBED_MODEL,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        let client = unreachable_client();
        assert!(!client.base_url().ends_with('/'));
    }

    #[test]
    fn generate_request_shape() {
        let request = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn embed_response_parses() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[0.5,1.0]]}"#)
                .unwrap();
        assert_eq!(parsed.embeddings, vec![vec![0.5, 1.0]]);
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let client = unreachable_client();

        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { collaborator: "ollama", .. }));

        let err = client.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }

    #[tokio::test]
    async fn empty_embed_skips_request() {
        let client = unreachable_client();
        assert!(client.embed(&[]).await.unwrap().is_empty());
    }
}
