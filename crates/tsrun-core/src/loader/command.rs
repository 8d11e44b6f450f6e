//! Transform service reached through an external command.
//!
//! One process per request: the request is written to stdin as a single JSON
//! document and the response is read from stdout.

use super::transform::{TransformError, TransformOptions, TransformOutput, Transformer};
use crate::config::env_vars;
use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// Message sent to the transform command via stdin.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransformRequest<'a> {
    file_path: &'a str,
    source: &'a str,
    options: TransformOptions,
}

/// Runs a configured command line for each transform.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    program: String,
    args: Vec<String>,
    disable_cache: bool,
}

impl CommandTransformer {
    /// Parse a whitespace-separated command line. `None` if it is blank.
    #[must_use]
    pub fn new(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            disable_cache: false,
        })
    }

    /// Command from `TSRUN_TRANSFORM_CMD`, honouring `TSRUN_DISABLE_CACHE`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let command_line = std::env::var(env_vars::TRANSFORM_CMD).ok()?;
        let disable_cache = std::env::var(env_vars::DISABLE_CACHE).is_ok_and(|v| v == "1");
        Self::new(&command_line).map(|t| t.with_disable_cache(disable_cache))
    }

    /// Forward `TSRUN_DISABLE_CACHE=1` to the service.
    #[must_use]
    pub fn with_disable_cache(mut self, disable_cache: bool) -> Self {
        self.disable_cache = disable_cache;
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Transformer for CommandTransformer {
    fn transform(
        &self,
        file_path: &str,
        source: &str,
        options: TransformOptions,
    ) -> Result<TransformOutput, TransformError> {
        let request = serde_json::to_vec(&TransformRequest {
            file_path,
            source,
            options,
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.disable_cache {
            command.env(env_vars::DISABLE_CACHE, "1");
        }

        let mut child = command.spawn().map_err(|source| TransformError::Spawn {
            command: self.command_line(),
            source,
        })?;
        debug!(file = file_path, pid = child.id(), "transform");

        // Feed stdin from a thread; the child may fill stdout before it
        // finishes reading the request.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || -> std::io::Result<()> {
                stdin.write_all(&request)?;
                stdin.flush()
            })
        });

        let output = child.wait_with_output()?;
        let written = writer.map_or(Ok(Ok(())), std::thread::JoinHandle::join);

        if !output.status.success() {
            return Err(TransformError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written.map_err(|_| std::io::Error::other("transform stdin writer panicked"))??;

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandTransformer {
        CommandTransformer {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            disable_cache: false,
        }
    }

    #[test]
    fn test_parse_command_line() {
        let t = CommandTransformer::new("  node  transform.mjs --fast ").unwrap();
        assert_eq!(t.program, "node");
        assert_eq!(t.args, vec!["transform.mjs", "--fast"]);
        assert!(CommandTransformer::new("   ").is_none());
    }

    #[test]
    fn test_reads_json_response() {
        let t = sh(r#"cat >/dev/null; printf '{"code":"export {}"}'"#);
        let output = t
            .transform("/a.ts", "export {}", TransformOptions::default())
            .unwrap();
        assert_eq!(output.code, "export {}");
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_request_is_sent_on_stdin() {
        // Echo the request back inside `code` by wrapping it.
        let t = sh(r#"req=$(cat); printf '{"code":%s}' "$(printf '%s' "$req" | sed 's/\\/\\\\/g; s/"/\\"/g; s/^/"/; s/$/"/')""#);
        let output = t
            .transform("/src/a.ts", "let x", TransformOptions { sourcemap: true, jsx: None })
            .unwrap();
        assert!(output.code.contains(r#""filePath":"/src/a.ts""#));
        assert!(output.code.contains(r#""sourcemap":true"#));
    }

    #[test]
    fn test_disable_cache_forwarded() {
        let t = sh(r#"cat >/dev/null; printf '{"code":"%s"}' "$TSRUN_DISABLE_CACHE""#)
            .with_disable_cache(true);
        let output = t.transform("/a.ts", "", TransformOptions::default()).unwrap();
        assert_eq!(output.code, "1");
    }

    #[test]
    fn test_non_zero_exit() {
        let t = sh("cat >/dev/null; echo boom >&2; exit 3");
        let err = t.transform("/a.ts", "", TransformOptions::default()).unwrap_err();
        assert!(matches!(err, TransformError::Failed { ref stderr, .. } if stderr == "boom"));
    }

    #[test]
    fn test_missing_program() {
        let t = CommandTransformer::new("definitely-not-a-real-transform-cmd").unwrap();
        let err = t.transform("/a.ts", "", TransformOptions::default()).unwrap_err();
        assert!(matches!(err, TransformError::Spawn { .. }));
    }
}
