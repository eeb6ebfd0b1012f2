//! JSON Schema validation and inference
//!
//! Compiles and caches validators for workflow response schemas and the
//! advisory schema-generation helper. Thread-safe for concurrent use.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during schema operations
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// One violation found while validating data against a schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Instance path of the violating value, e.g. `/count`
    pub path: String,
    pub message: String,
}

/// Outcome of validating data against a schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Human-readable description of the first violation
    pub fn describe_first(&self) -> String {
        match self.errors.first() {
            Some(issue) => {
                let path = if issue.path.is_empty() {
                    "/"
                } else {
                    issue.path.as_str()
                };
                format!("value at '{path}' {}", issue.message)
            }
            None => "no violations".to_string(),
        }
    }
}

/// A type ambiguity found while inferring a schema from samples
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAmbiguity {
    pub path: String,
    pub description: String,
    pub options: Vec<String>,
}

/// Result of inferring a schema from sample data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInferenceResult {
    pub schema: serde_json::Value,
    pub ambiguities: Vec<SchemaAmbiguity>,
}

/// Service for validating data against JSON Schemas.
///
/// Compiles and caches validators keyed by schema hash.
pub struct SchemaService {
    validators: RwLock<HashMap<u64, Arc<Validator>>>,
}

impl SchemaService {
    pub fn new() -> Self {
        Self {
            validators: RwLock::new(HashMap::new()),
        }
    }

    /// Compile a JSON Schema, returning a cached validator when available
    pub async fn compile(&self, schema: &serde_json::Value) -> Result<Arc<Validator>, SchemaError> {
        let hash = hash_schema(schema);

        {
            let cache = self.validators.read().await;
            if let Some(validator) = cache.get(&hash) {
                return Ok(Arc::clone(validator));
            }
        }

        let validator = jsonschema::validator_for(schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        let validator = Arc::new(validator);

        {
            let mut cache = self.validators.write().await;
            cache.insert(hash, Arc::clone(&validator));
        }

        Ok(validator)
    }

    /// Validate data against a schema with detailed error information
    pub async fn validate(
        &self,
        schema: &serde_json::Value,
        data: &serde_json::Value,
    ) -> Result<ValidationResult, SchemaError> {
        let validator = self.compile(schema).await?;

        let errors: Vec<ValidationIssue> = validator
            .iter_errors(data)
            .map(|e| ValidationIssue {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        Ok(ValidationResult {
            is_valid: errors.is_empty(),
            errors,
        })
    }

    /// Infer a JSON Schema from sample values.
    ///
    /// Required properties are those present in every sample; fields whose
    /// type differs across samples are reported as ambiguities.
    pub fn infer_schema(&self, samples: &[serde_json::Value]) -> SchemaInferenceResult {
        if samples.is_empty() {
            return SchemaInferenceResult {
                schema: serde_json::json!({
                    "$schema": "https://json-schema.org/draft/2020-12/schema",
                    "type": "object"
                }),
                ambiguities: Vec::new(),
            };
        }

        let mut ambiguities = Vec::new();
        let mut schema = infer_from_values(samples, "", &mut ambiguities);
        if let Some(map) = schema.as_object_mut() {
            map.insert(
                "$schema".to_string(),
                serde_json::json!("https://json-schema.org/draft/2020-12/schema"),
            );
        }

        SchemaInferenceResult {
            schema,
            ambiguities,
        }
    }
}

impl Default for SchemaService {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_schema(schema: &serde_json::Value) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    schema.to_string().hash(&mut hasher);
    hasher.finish()
}

fn infer_from_values(
    samples: &[serde_json::Value],
    path: &str,
    ambiguities: &mut Vec<SchemaAmbiguity>,
) -> serde_json::Value {
    let types: Vec<&str> = samples.iter().map(json_type).collect();
    let unique_types: Vec<&str> = types
        .iter()
        .copied()
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();

    if unique_types.len() > 1 {
        let has_null = unique_types.contains(&"null");
        let non_null: Vec<&str> = unique_types
            .iter()
            .copied()
            .filter(|t| *t != "null")
            .collect();

        if non_null.len() > 1 {
            ambiguities.push(SchemaAmbiguity {
                path: if path.is_empty() {
                    "/".to_string()
                } else {
                    path.to_string()
                },
                description: format!("field has multiple types: {}", non_null.join(", ")),
                options: non_null.iter().map(|t| (*t).to_string()).collect(),
            });
        }

        if has_null && non_null.len() == 1 {
            return serde_json::json!({"type": [non_null[0], "null"]});
        }
    }

    let primary = unique_types.first().copied().unwrap_or("object");

    match primary {
        "object" => {
            let objects: Vec<&serde_json::Map<String, serde_json::Value>> =
                samples.iter().filter_map(|v| v.as_object()).collect();

            if objects.is_empty() {
                return serde_json::json!({"type": "object"});
            }

            let all_keys: Vec<&str> = {
                let mut keys = Vec::new();
                for object in &objects {
                    for key in object.keys() {
                        if !keys.contains(&key.as_str()) {
                            keys.push(key.as_str());
                        }
                    }
                }
                keys
            };

            let required: Vec<String> = all_keys
                .iter()
                .filter(|k| objects.iter().all(|o| o.contains_key(**k)))
                .map(|k| (*k).to_string())
                .collect();

            let mut properties = serde_json::Map::new();
            for key in all_keys {
                let values: Vec<serde_json::Value> =
                    objects.iter().filter_map(|o| o.get(key).cloned()).collect();
                let child_path = format!("{path}/{key}");
                properties.insert(
                    key.to_string(),
                    infer_from_values(&values, &child_path, ambiguities),
                );
            }

            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required
            })
        }
        "array" => {
            let all_items: Vec<serde_json::Value> = samples
                .iter()
                .filter_map(|v| v.as_array())
                .flatten()
                .cloned()
                .collect();

            if all_items.is_empty() {
                return serde_json::json!({"type": "array"});
            }

            let items_schema = infer_from_values(&all_items, &format!("{path}[]"), ambiguities);
            serde_json::json!({"type": "array", "items": items_schema})
        }
        other => serde_json::json!({"type": other}),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
