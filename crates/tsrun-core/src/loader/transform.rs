//! Interface to the external TypeScript transform service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// How JSX is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxMode {
    /// `react-jsx` runtime imports.
    Automatic,
    /// `React.createElement` calls.
    Classic,
    /// Leave JSX in the output.
    Preserve,
}

/// Options passed with every transform request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    pub sourcemap: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx: Option<JsxMode>,
}

/// A version 3 source map.
///
/// Keys not modelled here (`ignoreList`, `x_google_ignoreList`, ...) are kept
/// in `extra` so the map is re-encoded without loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One error reported by the transform service.
///
/// Services report either plain strings or structured objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformDiagnostic {
    Message(String),
    Structured(Value),
}

impl TransformDiagnostic {
    /// Human-readable text: the string itself, an object's `message` field,
    /// or the JSON text of anything else.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Message(message) => message.clone(),
            Self::Structured(value) => value
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| value.to_string(), str::to_owned),
        }
    }
}

/// Result of one transform call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    pub code: String,
    #[serde(default)]
    pub map: Option<SourceMap>,
    #[serde(default)]
    pub errors: Vec<TransformDiagnostic>,
}

impl TransformOutput {
    /// Successful output without a map.
    #[must_use]
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// The service could not be reached or answered garbage.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to spawn transform command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transform command I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Invalid transform response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("No transform service configured (set TSRUN_TRANSFORM_CMD) for {}", path.display())]
    NotConfigured { path: PathBuf },
}

/// A source-to-source TypeScript transform.
pub trait Transformer: Send + Sync {
    fn transform(
        &self,
        file_path: &str,
        source: &str,
        options: TransformOptions,
    ) -> Result<TransformOutput, TransformError>;
}

impl<F> Transformer for F
where
    F: Fn(&str, &str, TransformOptions) -> Result<TransformOutput, TransformError> + Send + Sync,
{
    fn transform(
        &self,
        file_path: &str,
        source: &str,
        options: TransformOptions,
    ) -> Result<TransformOutput, TransformError> {
        self(file_path, source, options)
    }
}

/// Used when no transform command is configured: every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransformer;

impl Transformer for NoTransformer {
    fn transform(
        &self,
        file_path: &str,
        _source: &str,
        _options: TransformOptions,
    ) -> Result<TransformOutput, TransformError> {
        Err(TransformError::NotConfigured {
            path: PathBuf::from(file_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_with_mixed_errors() {
        let output: TransformOutput = serde_json::from_value(json!({
            "code": "",
            "errors": ["plain", {"message": "structured", "line": 3}, {"code": 42}]
        }))
        .unwrap();
        let messages: Vec<_> = output.errors.iter().map(TransformDiagnostic::message).collect();
        assert_eq!(messages, vec!["plain", "structured", r#"{"code":42}"#]);
    }

    #[test]
    fn test_options_wire_shape() {
        let options = TransformOptions {
            sourcemap: true,
            jsx: Some(JsxMode::Automatic),
        };
        assert_eq!(
            serde_json::to_value(options).unwrap(),
            json!({"sourcemap": true, "jsx": "automatic"})
        );
    }

    #[test]
    fn test_source_map_accepts_minimal_shape() {
        let map: SourceMap = serde_json::from_value(json!({
            "version": 3,
            "sources": ["a.ts"],
            "mappings": "AAAA"
        }))
        .unwrap();
        assert!(map.names.is_empty());
        assert!(map.sources_content.is_none());
    }
}
