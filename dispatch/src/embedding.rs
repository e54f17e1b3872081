use crate::{
    client::{Config, OpenAI},
    error::DispatchError,
};
use vantage_core::{EmbeddingModel, Result as CoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

impl EmbeddingModel for OpenAI {
    fn dim(&self) -> usize {
        self.config().embedding_dimensions
    }

    fn embed(&self, text: &str) -> impl core::future::Future<Output = CoreResult<Vec<f32>>> + Send {
        let cfg = self.config();
        let input = text.to_owned();
        async move {
            let vector = embed_once(cfg, input).await?;
            Ok(vector)
        }
    }
}

async fn embed_once(cfg: Arc<Config>, input: String) -> Result<Vec<f32>, DispatchError> {
    let request = EmbeddingRequest {
        model: &cfg.embedding_model,
        input: &input,
        dimensions: cfg.embedding_dimensions,
    };

    let mut builder = cfg
        .http()
        .post(cfg.request_url("/embeddings"))
        .header(reqwest::header::AUTHORIZATION, cfg.request_auth())
        .header(reqwest::header::USER_AGENT, "vantage-dispatch/0.1")
        .json(&request);
    if let Some(org) = &cfg.organization {
        builder = builder.header("OpenAI-Organization", org.clone());
    }

    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<crate::response::ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        return Err(if status.is_server_error() {
            DispatchError::ServerError { status: status.as_u16(), message }
        } else {
            DispatchError::ClientError { status: status.as_u16(), message }
        });
    }

    let mut parsed: EmbeddingResponse = response.json().await?;
    parsed
        .data
        .pop()
        .map(|item| item.embedding)
        .ok_or_else(|| DispatchError::Api("embedding response missing vector data".into()))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}
