use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ExtractionError;
use crate::extractor::EmbeddingExtractor;

/// Model server settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub url: String,
    pub dimension: usize,
    /// Route text queries to a separate multilingual text model.
    pub multilingual_enabled: bool,
    pub multilingual_url: Option<String>,
}

/// HTTP client for the CLIP model server's embeddings endpoint.
///
/// Image payloads travel base64-encoded; text goes as-is. When the
/// multilingual toggle is on, text extraction targets the multilingual
/// model's endpoint instead of the main one — both models share the same
/// embedding space.
#[derive(Debug)]
pub struct ClipHttpExtractor {
    client: reqwest::Client,
    image_url: String,
    text_url: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    modality: &'static str,
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl ClipHttpExtractor {
    pub fn new(config: ModelConfig) -> Result<Self, ExtractionError> {
        let text_url = if config.multilingual_enabled {
            config.multilingual_url.ok_or_else(|| {
                ExtractionError::Config(
                    "multilingual text model enabled but no URL configured".to_string(),
                )
            })?
        } else {
            config.url.clone()
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(ExtractionError::from)?;
        Ok(Self {
            client,
            image_url: config.url,
            text_url,
            dimension: config.dimension,
        })
    }

    async fn embed(
        &self,
        url: &str,
        request: EmbedRequest,
    ) -> Result<Vec<Vec<f32>>, ExtractionError> {
        let expected = request.inputs.len();
        let response = self
            .client
            .post(format!("{}/embeddings", url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractionError::Model {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: EmbedResponse = response.json().await?;
        verify_batch(expected, self.dimension, &parsed.embeddings)?;
        Ok(parsed.embeddings)
    }
}

/// Count and dimension checks on every model response; order is the model
/// server's API contract.
fn verify_batch(
    expected: usize,
    dimension: usize,
    embeddings: &[Vec<f32>],
) -> Result<(), ExtractionError> {
    if embeddings.len() != expected {
        return Err(ExtractionError::CountMismatch {
            expected,
            actual: embeddings.len(),
        });
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
        return Err(ExtractionError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }
    Ok(())
}

#[async_trait]
impl EmbeddingExtractor for ClipHttpExtractor {
    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, ExtractionError> {
        let mut batch = self
            .embed(
                &self.image_url,
                EmbedRequest {
                    modality: "image",
                    inputs: vec![BASE64.encode(image)],
                },
            )
            .await?;
        Ok(batch.remove(0))
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractionError> {
        let mut batch = self
            .embed(
                &self.text_url,
                EmbedRequest {
                    modality: "text",
                    inputs: vec![text.to_string()],
                },
            )
            .await?;
        Ok(batch.remove(0))
    }

    #[instrument(skip(self, images), fields(batch = images.len()))]
    async fn embed_image_batch(&self, images: &[Bytes]) -> Result<Vec<Vec<f32>>, ExtractionError> {
        if images.is_empty() {
            return Ok(vec![]);
        }
        debug!("Extracting image embeddings");
        self.embed(
            &self.image_url,
            EmbedRequest {
                modality: "image",
                inputs: images.iter().map(|i| BASE64.encode(i)).collect(),
            },
        )
        .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig {
            url: "http://clip.local".to_string(),
            dimension: 512,
            multilingual_enabled: false,
            multilingual_url: None,
        }
    }

    #[test]
    fn multilingual_toggle_requires_a_url() {
        let err = ClipHttpExtractor::new(ModelConfig {
            multilingual_enabled: true,
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, ExtractionError::Config(_)));
    }

    #[test]
    fn multilingual_url_takes_over_the_text_path() {
        let extractor = ClipHttpExtractor::new(ModelConfig {
            multilingual_enabled: true,
            multilingual_url: Some("http://mclip.local".to_string()),
            ..config()
        })
        .unwrap();
        assert_eq!(extractor.text_url, "http://mclip.local");
        assert_eq!(extractor.image_url, "http://clip.local");

        let plain = ClipHttpExtractor::new(config()).unwrap();
        assert_eq!(plain.text_url, plain.image_url);
    }

    #[test]
    fn verify_batch_catches_count_and_dimension_drift() {
        let ok = vec![vec![0.0; 512], vec![1.0; 512]];
        assert!(verify_batch(2, 512, &ok).is_ok());

        assert!(matches!(
            verify_batch(3, 512, &ok),
            Err(ExtractionError::CountMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let short = vec![vec![0.0; 128]];
        assert!(matches!(
            verify_batch(1, 512, &short),
            Err(ExtractionError::DimensionMismatch {
                expected: 512,
                actual: 128
            })
        ));
    }
}
