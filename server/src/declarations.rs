//! Schema declarations loaded from a JSON file.
//!
//! The file holds an array of class declarations in the store's own shape:
//!
//! ```json
//! [
//!   {
//!     "className": "Post",
//!     "fields": {"title": {"type": "String", "required": true}},
//!     "indexes": {"by_title": {"title": 1}},
//!     "classLevelPermissions": {"find": {"*": true}}
//!   }
//! ]
//! ```

use converge_engine::{Cloud, SchemaDefinition};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Errors raised while loading declarations.
#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid declarations: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("class {0} is declared more than once")]
    Duplicate(String),
}

/// Parse declarations from JSON text.
pub fn parse(json: &str) -> Result<Vec<SchemaDefinition>, DeclarationError> {
    let definitions: Vec<SchemaDefinition> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for definition in &definitions {
        if !seen.insert(definition.class_name.as_str()) {
            return Err(DeclarationError::Duplicate(definition.class_name.clone()));
        }
    }
    Ok(definitions)
}

/// Read and parse the declarations file.
pub async fn load(path: &Path) -> Result<Vec<SchemaDefinition>, DeclarationError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DeclarationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse(&json)
}

/// Load the declarations file and register every class on `cloud`.
pub async fn register(cloud: &Cloud, path: &Path) -> Result<usize, DeclarationError> {
    let definitions = load(path).await?;
    let count = definitions.len();
    for definition in definitions {
        tracing::debug!(class = %definition.class_name, fields = definition.fields.len(), "declared class");
        cloud.register_schema(definition);
    }
    tracing::info!(classes = count, path = %path.display(), "loaded schema declarations");
    Ok(count)
}
