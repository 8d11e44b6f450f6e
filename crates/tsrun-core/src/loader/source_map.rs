use super::transform::SourceMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const PREFIX: &str = "//# sourceMappingURL=data:application/json;base64,";

/// Append `map` to `code` as an inline base64 data URL comment.
#[must_use]
pub fn inline_source_map(code: &str, map: &SourceMap) -> String {
    // Strings and JSON values with string keys always serialize.
    let json = serde_json::to_vec(map).unwrap_or_default();
    let encoded = STANDARD.encode(json);

    let mut out = String::with_capacity(code.len() + PREFIX.len() + encoded.len() + 2);
    out.push_str(code);
    if !code.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(PREFIX);
    out.push_str(&encoded);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::transform::TransformOutput;

    #[test]
    fn test_inline_round_trips_json() {
        let map = SourceMap {
            version: 3,
            sources: vec![Some("a.ts".into())],
            mappings: "AAAA".into(),
            ..SourceMap::default()
        };
        let out = inline_source_map("let a = 1;", &map);

        let (code, trailer) = out.split_once('\n').unwrap();
        assert_eq!(code, "let a = 1;");
        let encoded = trailer.trim_end().strip_prefix(PREFIX).unwrap();
        let decoded: SourceMap = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_null_sources_and_unknown_keys_survive() {
        let response = r#"{
            "code": "let a = 1;",
            "map": {
                "version": 3,
                "sourceRoot": "/src",
                "sources": [null, "a.ts"],
                "names": [],
                "mappings": "AAAA",
                "ignoreList": [0]
            }
        }"#;
        let output: TransformOutput = serde_json::from_str(response).unwrap();
        let map = output.map.unwrap();
        assert_eq!(map.source_root.as_deref(), Some("/src"));
        assert_eq!(map.sources, vec![None, Some("a.ts".to_string())]);

        let out = inline_source_map(&output.code, &map);
        let encoded = out.lines().nth(1).unwrap().strip_prefix(PREFIX).unwrap();
        let decoded: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded["sourceRoot"], "/src");
        assert_eq!(decoded["sources"], serde_json::json!([null, "a.ts"]));
        assert_eq!(decoded["ignoreList"], serde_json::json!([0]));
    }

    #[test]
    fn test_no_blank_line_when_code_ends_with_newline() {
        let out = inline_source_map("x\n", &SourceMap::default());
        assert!(out.starts_with("x\n//# sourceMappingURL="));
    }
}
