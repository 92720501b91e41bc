use serde::{Deserialize, Serialize};
use serde_json::json;

/// Collection schema: auto-generated i64 primary key, a varchar identifier
/// column and one fixed-dimension float-vector column.
///
/// The dimension is fixed at creation time and must match every embedding
/// produced by the configured extractor for the lifetime of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub id_field: String,
    pub identifier_field: String,
    pub identifier_max_length: u32,
    pub vector_field: String,
    pub dimension: u32,
}

impl CollectionSchema {
    pub fn new(identifier_field: &str, vector_field: &str, dimension: u32) -> Self {
        Self {
            id_field: "id".to_string(),
            identifier_field: identifier_field.to_string(),
            identifier_max_length: 2048,
            vector_field: vector_field.to_string(),
            dimension,
        }
    }

    /// Local validation, run before any remote create call.
    pub fn validate(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("vector dimension must be greater than zero".to_string());
        }
        let names = [&self.id_field, &self.identifier_field, &self.vector_field];
        if names.iter().any(|n| n.is_empty()) {
            return Err("field names must not be empty".to_string());
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err("field names must be distinct".to_string());
        }
        Ok(())
    }

    /// Human-readable drift summary against an existing remote schema, or
    /// `None` when they agree.
    pub fn drift_against(&self, existing: &CollectionSchema) -> Option<String> {
        if self == existing {
            return None;
        }
        if self.dimension != existing.dimension {
            return Some(format!(
                "dimension {} (configured) vs {} (remote)",
                self.dimension, existing.dimension
            ));
        }
        Some(format!("configured {:?} vs remote {:?}", self, existing))
    }
}

/// Distance metric fixed at index-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Cosine,
    L2,
    Ip,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::L2 => "L2",
            DistanceMetric::Ip => "IP",
        }
    }
}

/// Index algorithm plus its build parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAlgorithm {
    IvfFlat { nlist: u32 },
    Hnsw { m: u32, ef_construction: u32 },
    AutoIndex,
}

impl IndexAlgorithm {
    pub fn kind(&self) -> &'static str {
        match self {
            IndexAlgorithm::IvfFlat { .. } => "IVF_FLAT",
            IndexAlgorithm::Hnsw { .. } => "HNSW",
            IndexAlgorithm::AutoIndex => "AUTOINDEX",
        }
    }

    pub fn params(&self) -> serde_json::Value {
        match self {
            IndexAlgorithm::IvfFlat { nlist } => json!({ "nlist": nlist }),
            IndexAlgorithm::Hnsw { m, ef_construction } => {
                json!({ "M": m, "efConstruction": ef_construction })
            }
            IndexAlgorithm::AutoIndex => json!({}),
        }
    }
}

/// Created at most once per (collection, index name) pair; re-creation with
/// the same name is a no-op even when parameters differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub field: String,
    pub name: String,
    pub algorithm: IndexAlgorithm,
    pub metric: DistanceMetric,
}

/// One named column of an insert batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValues {
    Str(Vec<String>),
    Int(Vec<i64>),
    FloatVector(Vec<Vec<f32>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Str(v) => v.len(),
            ColumnValues::Int(v) => v.len(),
            ColumnValues::FloatVector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-oriented insert payload (name → values, equal lengths required).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBatch {
    columns: Vec<(String, ColumnValues)>,
}

impl ColumnBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, values: ColumnValues) -> Self {
        self.columns.push((name.to_string(), values));
        self
    }

    pub fn columns(&self) -> &[(String, ColumnValues)] {
        &self.columns
    }

    /// Validate equal column lengths and return the row count.
    pub fn row_count(&self) -> Result<usize, String> {
        let mut rows = None;
        for (name, values) in &self.columns {
            match rows {
                None => rows = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(format!(
                        "column '{}' has {} values, expected {}",
                        name,
                        values.len(),
                        expected
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(rows.unwrap_or(0))
    }
}

/// Engine-reported insert outcome. The reported count is not guaranteed
/// atomic with visibility of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub top_k: usize,
    pub vectors: Vec<Vec<f32>>,
    pub vector_field: String,
    pub out_fields: Vec<String>,
    pub params: serde_json::Value,
}

/// One ranked neighbor. Row ordering within a result set is the engine's
/// similarity order; ties are broken by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    pub distance: f32,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SearchHit {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }
}
