//! Environment-based configuration for the whole engine.
//!
//! Every knob has a default that matches the local compose stack, so a bare
//! `search-engine serve` works out of the box in development.

use std::env;
use std::time::Duration;

use core_config::{env_flag, env_or_default, env_parse, ConfigError, FromEnv};
use domain_embedding::ModelConfig;
use domain_storage::{BucketConfig, ObjectStoreConfig};
use domain_vectordb::VectorStoreConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: VectorStoreConfig,
    pub database: String,
    pub collection: String,
    pub store: ObjectStoreConfig,
    pub landing: BucketConfig,
    pub destination: BucketConfig,
    pub model: ModelConfig,
    pub tick_interval: Duration,
    pub top_k: usize,
}

impl FromEnv for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let batch_size: usize = env_parse("SEARCH_BATCH_SIZE", 128)?;
        let dimension: usize = env_parse("SEARCH_EMBEDDING_DIM", 512)?;
        let interval_secs: u64 = env_parse("SEARCH_TICK_INTERVAL_SECS", 10)?;

        Ok(Self {
            engine: VectorStoreConfig {
                url: env_or_default("SEARCH_ENGINE_URL", "http://localhost:19530"),
                token: env::var("SEARCH_ENGINE_TOKEN").ok(),
            },
            database: env_or_default("SEARCH_DATABASE", "aisearch"),
            collection: env_or_default("SEARCH_COLLECTION", "products"),
            store: ObjectStoreConfig {
                url: env_or_default("SEARCH_STORE_URL", "http://localhost:9000"),
                token: env::var("SEARCH_STORE_TOKEN").ok(),
            },
            landing: BucketConfig {
                bucket: env_or_default("SEARCH_LANDING_BUCKET", "import"),
                batch_size,
                public_read: false,
            },
            destination: BucketConfig {
                bucket: env_or_default("SEARCH_DESTINATION_BUCKET", "products"),
                batch_size,
                // Result locators point straight into this bucket.
                public_read: true,
            },
            model: ModelConfig {
                url: env_or_default("SEARCH_MODEL_URL", "http://localhost:8500"),
                dimension,
                multilingual_enabled: env_flag("SEARCH_MULTILINGUAL_ENABLED", false),
                multilingual_url: env::var("SEARCH_MULTILINGUAL_MODEL_URL").ok(),
            },
            tick_interval: Duration::from_secs(interval_secs),
            top_k: env_parse("SEARCH_TOP_K", 10)?,
        })
    }
}
