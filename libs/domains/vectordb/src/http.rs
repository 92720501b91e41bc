use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::client::VectorStoreClient;
use crate::error::{RpcError, RpcResult};
use crate::schema::{
    CollectionSchema, ColumnBatch, IndexDescriptor, InsertOutcome, SearchHit, SearchRequest,
};

/// Connection settings for the vector engine's REST endpoint.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub url: String,
    pub token: Option<String>,
}

/// reqwest-backed engine client.
///
/// The engine's REST control plane is served synchronously, so those calls
/// use a blocking client — callers must route them through the bridge's
/// bounded pool (blocking reqwest panics if driven directly on an async
/// runtime thread). Data-plane calls use the async client.
pub struct HttpVectorStoreClient {
    control: reqwest::blocking::Client,
    data: reqwest::Client,
    base: String,
    token: Option<String>,
}

/// Engine response envelope; a non-zero code is a remote failure status,
/// which is distinct from a transport error but normalized into the same
/// [`RpcError`] channel.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> RpcResult<Option<T>> {
        if self.code != 0 {
            return Err(RpcError::Status {
                code: self.code,
                message: self.message,
            });
        }
        Ok(self.data)
    }
}

/// Field entry as the engine describes and accepts collection schemas.
#[derive(Debug, Serialize, Deserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_id: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dim: Option<u32>,
}

impl HttpVectorStoreClient {
    pub fn new(config: VectorStoreConfig) -> RpcResult<Self> {
        let control = reqwest::blocking::Client::builder()
            .build()
            .map_err(RpcError::from)?;
        let data = reqwest::Client::builder().build().map_err(RpcError::from)?;
        Ok(Self {
            control,
            data,
            base: config.url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/vectordb/{}", self.base, path)
    }

    fn post_control<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> RpcResult<Option<T>> {
        let mut request = self.control.post(self.endpoint(path)).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;
        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "{} returned HTTP {}",
                path,
                response.status()
            )));
        }
        response.json::<Envelope<T>>()?.into_data()
    }

    async fn post_data<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> RpcResult<Option<T>> {
        let mut request = self.data.post(self.endpoint(path)).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "{} returned HTTP {}",
                path,
                response.status()
            )));
        }
        response.json::<Envelope<T>>().await?.into_data()
    }

    fn schema_fields(schema: &CollectionSchema) -> Vec<FieldSpec> {
        vec![
            FieldSpec {
                name: schema.id_field.clone(),
                field_type: "Int64".to_string(),
                primary_key: Some(true),
                auto_id: Some(true),
                max_length: None,
                dim: None,
            },
            FieldSpec {
                name: schema.identifier_field.clone(),
                field_type: "VarChar".to_string(),
                primary_key: None,
                auto_id: None,
                max_length: Some(schema.identifier_max_length),
                dim: None,
            },
            FieldSpec {
                name: schema.vector_field.clone(),
                field_type: "FloatVector".to_string(),
                primary_key: None,
                auto_id: None,
                max_length: None,
                dim: Some(schema.dimension),
            },
        ]
    }

    fn schema_from_fields(fields: Vec<FieldSpec>) -> RpcResult<CollectionSchema> {
        let mut schema = CollectionSchema::new("", "", 0);
        for field in fields {
            match field.field_type.as_str() {
                "Int64" if field.primary_key.unwrap_or(false) => schema.id_field = field.name,
                "VarChar" => {
                    schema.identifier_field = field.name;
                    schema.identifier_max_length = field.max_length.unwrap_or(0);
                }
                "FloatVector" => {
                    schema.vector_field = field.name;
                    schema.dimension = field.dim.unwrap_or(0);
                }
                other => {
                    return Err(RpcError::Decode(format!(
                        "unexpected field type '{}' in collection description",
                        other
                    )))
                }
            }
        }
        Ok(schema)
    }
}

#[async_trait]
impl VectorStoreClient for HttpVectorStoreClient {
    fn list_databases(&self) -> RpcResult<Vec<String>> {
        #[derive(Deserialize)]
        struct DbList {
            db_names: Vec<String>,
        }
        let data: Option<DbList> = self.post_control("databases/list", json!({}))?;
        Ok(data.map(|d| d.db_names).unwrap_or_default())
    }

    fn create_database(&self, name: &str) -> RpcResult<()> {
        self.post_control::<serde_json::Value>("databases/create", json!({ "db_name": name }))?;
        Ok(())
    }

    fn has_collection(&self, database: &str, collection: &str) -> RpcResult<bool> {
        #[derive(Deserialize)]
        struct Has {
            has: bool,
        }
        let data: Option<Has> = self.post_control(
            "collections/has",
            json!({ "db_name": database, "collection_name": collection }),
        )?;
        Ok(data.map(|d| d.has).unwrap_or(false))
    }

    fn describe_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> RpcResult<Option<CollectionSchema>> {
        #[derive(Deserialize)]
        struct Description {
            fields: Vec<FieldSpec>,
        }
        let data: Option<Description> = self.post_control(
            "collections/describe",
            json!({ "db_name": database, "collection_name": collection }),
        )?;
        data.map(|d| Self::schema_from_fields(d.fields)).transpose()
    }

    fn create_collection(
        &self,
        database: &str,
        collection: &str,
        schema: &CollectionSchema,
    ) -> RpcResult<()> {
        debug!(collection, "Creating collection");
        self.post_control::<serde_json::Value>(
            "collections/create",
            json!({
                "db_name": database,
                "collection_name": collection,
                "schema": { "fields": Self::schema_fields(schema) },
            }),
        )?;
        Ok(())
    }

    fn index_exists(&self, database: &str, collection: &str, index_name: &str) -> RpcResult<bool> {
        #[derive(Deserialize)]
        struct Description {
            #[serde(rename = "indexName")]
            index_name: String,
        }
        let data: Option<Description> = self.post_control(
            "indexes/describe",
            json!({
                "db_name": database,
                "collection_name": collection,
                "index_name": index_name,
            }),
        )?;
        Ok(data.map(|d| d.index_name == index_name).unwrap_or(false))
    }

    fn create_index(
        &self,
        database: &str,
        collection: &str,
        index: &IndexDescriptor,
    ) -> RpcResult<()> {
        debug!(collection, index = %index.name, "Creating index");
        self.post_control::<serde_json::Value>(
            "indexes/create",
            json!({
                "db_name": database,
                "collection_name": collection,
                "field_name": index.field,
                "index_name": index.name,
                "index_type": index.algorithm.kind(),
                "metric_type": index.metric.as_str(),
                "params": index.algorithm.params(),
            }),
        )?;
        Ok(())
    }

    fn load_collection(&self, database: &str, collection: &str) -> RpcResult<()> {
        self.post_control::<serde_json::Value>(
            "collections/load",
            json!({ "db_name": database, "collection_name": collection }),
        )?;
        Ok(())
    }

    fn release_collection(&self, database: &str, collection: &str) -> RpcResult<()> {
        self.post_control::<serde_json::Value>(
            "collections/release",
            json!({ "db_name": database, "collection_name": collection }),
        )?;
        Ok(())
    }

    fn flush(&self, database: &str, collection: &str) -> RpcResult<()> {
        self.post_control::<serde_json::Value>(
            "collections/flush",
            json!({ "db_name": database, "collection_name": collection }),
        )?;
        Ok(())
    }

    async fn insert(
        &self,
        database: &str,
        collection: &str,
        batch: ColumnBatch,
    ) -> RpcResult<InsertOutcome> {
        #[derive(Deserialize)]
        struct Inserted {
            #[serde(rename = "insertCount")]
            insert_count: u64,
        }
        let columns: Vec<serde_json::Value> = batch
            .columns()
            .iter()
            .map(|(name, values)| json!({ "name": name, "values": values }))
            .collect();
        let data: Option<Inserted> = self
            .post_data(
                "entities/insert",
                json!({
                    "db_name": database,
                    "collection_name": collection,
                    "columns": columns,
                }),
            )
            .await?;
        Ok(InsertOutcome {
            inserted: data.map(|d| d.insert_count).unwrap_or(0),
        })
    }

    async fn search(
        &self,
        database: &str,
        collection: &str,
        request: SearchRequest,
    ) -> RpcResult<Vec<Vec<SearchHit>>> {
        #[derive(Deserialize)]
        struct Results {
            results: Vec<Vec<SearchHit>>,
        }
        let data: Option<Results> = self
            .post_data(
                "entities/search",
                json!({
                    "db_name": database,
                    "collection_name": collection,
                    "anns_field": request.vector_field,
                    "vectors": request.vectors,
                    "limit": request.top_k,
                    "output_fields": request.out_fields,
                    "search_params": request.params,
                    // Just-flushed rows may not be visible yet; accepted for
                    // read-path throughput.
                    "consistency_level": "Eventually",
                }),
            )
            .await?;
        Ok(data.map(|d| d.results).unwrap_or_default())
    }
}
