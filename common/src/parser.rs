//! AIレスポンスパーサー
//!
//! モデルが返したテキストからJSONオブジェクトを抽出し、
//! DefectAnalysisへ正規化する。列挙外の判定・重大度は安全側の
//! 既定値（warning / medium）へ丸め、拒否はしない。

use crate::error::{Error, Result};
use crate::types::{clamp_confidence, AnalyzedDefect, DefectAnalysis, InspectionStatus, Severity};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_OVERALL_CONFIDENCE: f64 = 85.0;
const DEFAULT_DEFECT_CONFIDENCE: f64 = 80.0;
const MAX_TYPE_LEN: usize = 100;
const MAX_LOCATION_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 500;

/// レスポンスからJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use defect_vision_common::extract_json;
///
/// let response = "Result: {\"overall_status\": \"pass\"}";
/// let json = extract_json(response).unwrap();
/// assert!(json.starts_with('{'));
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// 正規化前のレスポンス（全フィールド任意）
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
    overall_status: Option<Value>,
    confidence: Option<Value>,
    defects: Option<Vec<Value>>,
}

/// モデル出力テキストをパースして正規化
pub fn parse_defect_response(response: &str) -> Result<DefectAnalysis> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("解析結果のJSONパースエラー: {}", e)))?;
    normalize_analysis(value)
}

/// 任意のJSON値をDefectAnalysisへ正規化
///
/// オブジェクト以外はパースエラー。欠損値は既定値で補う。
pub fn normalize_analysis(value: Value) -> Result<DefectAnalysis> {
    if !value.is_object() {
        return Err(Error::Parse("解析結果がJSONオブジェクトではありません".into()));
    }
    let raw: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("解析結果の形式が不正: {}", e)))?;

    let overall_status = raw
        .overall_status
        .as_ref()
        .and_then(Value::as_str)
        .map(InspectionStatus::parse_lenient)
        .unwrap_or(InspectionStatus::Warning);

    let defects = raw
        .defects
        .unwrap_or_default()
        .iter()
        .filter(|d| d.is_object())
        .map(normalize_defect)
        .collect();

    Ok(DefectAnalysis {
        overall_status,
        confidence: number_or(raw.confidence.as_ref(), DEFAULT_OVERALL_CONFIDENCE),
        defects,
    })
}

fn normalize_defect(value: &Value) -> AnalyzedDefect {
    AnalyzedDefect {
        defect_type: text_or(value.get("type"), "Unknown Defect", MAX_TYPE_LEN),
        severity: value
            .get("severity")
            .and_then(Value::as_str)
            .map(Severity::parse_lenient)
            .unwrap_or(Severity::Medium),
        location: text_or(value.get("location"), "Unknown location", MAX_LOCATION_LEN),
        description: text_or(
            value.get("description"),
            "No description provided",
            MAX_DESCRIPTION_LEN,
        ),
        confidence: number_or(value.get("confidence"), DEFAULT_DEFECT_CONFIDENCE),
    }
}

/// 数値ならクランプ、欠損・非数値なら既定値
fn number_or(value: Option<&Value>, default: f64) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(n) => clamp_confidence(n),
        None => default,
    }
}

fn text_or(value: Option<&Value>, default: &str, max_chars: usize) -> String {
    let text = match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    };
    truncate_chars(&text, max_chars)
}

/// 文字数（バイト数ではない）で切り詰め
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================
    // extract_json テスト
    // =============================================

    #[test]
    fn test_extract_json_with_block() {
        let response = "```json\n{\"overall_status\": \"pass\", \"confidence\": 90}\n```";

        let json = extract_json(response).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let response = r#"Here is the result: {"key": "value"} done."#;

        let json = extract_json(response).unwrap();
        assert_eq!(json, r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_error() {
        let result = extract_json("No JSON here, just plain text.");
        assert!(result.is_err());
        if let Err(Error::Parse(msg)) = result {
            assert!(msg.contains("JSONが見つかりません"));
        } else {
            panic!("Expected Parse error");
        }
    }

    // =============================================
    // parse_defect_response テスト
    // =============================================

    #[test]
    fn test_parse_defect_response_full() {
        let response = r#"```json
{
  "overall_status": "warning",
  "confidence": 92,
  "defects": [
    {
      "type": "Surface Scratch",
      "severity": "low",
      "location": "upper left corner",
      "description": "light scratch",
      "confidence": 88
    }
  ]
}
```"#;

        let result = parse_defect_response(response).unwrap();
        assert_eq!(result.overall_status, InspectionStatus::Warning);
        assert_eq!(result.confidence, 92.0);
        assert_eq!(result.defects.len(), 1);
        assert_eq!(result.defects[0].defect_type, "Surface Scratch");
        assert_eq!(result.defects[0].severity, Severity::Low);
        assert_eq!(result.defects[0].location, "upper left corner");
    }

    #[test]
    fn test_parse_defect_response_coerces_enums() {
        let response = r#"{"overall_status": "failed", "confidence": 70,
            "defects": [{"type": "Dent", "severity": "severe", "location": "side", "confidence": 60}]}"#;

        let result = parse_defect_response(response).unwrap();
        assert_eq!(result.overall_status, InspectionStatus::Warning);
        assert_eq!(result.defects[0].severity, Severity::Medium);
    }

    #[test]
    fn test_parse_defect_response_clamps_confidence() {
        let response = r#"{"overall_status": "pass", "confidence": 150,
            "defects": [{"type": "Dent", "severity": "low", "location": "side", "confidence": -5}]}"#;

        let result = parse_defect_response(response).unwrap();
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.defects[0].confidence, 0.0);
    }

    #[test]
    fn test_parse_defect_response_defaults() {
        let response = r#"{"defects": [{}]}"#;

        let result = parse_defect_response(response).unwrap();
        assert_eq!(result.overall_status, InspectionStatus::Warning);
        assert_eq!(result.confidence, 85.0);
        let defect = &result.defects[0];
        assert_eq!(defect.defect_type, "Unknown Defect");
        assert_eq!(defect.severity, Severity::Medium);
        assert_eq!(defect.location, "Unknown location");
        assert_eq!(defect.description, "No description provided");
        assert_eq!(defect.confidence, 80.0);
    }

    #[test]
    fn test_parse_defect_response_missing_defects() {
        let result = parse_defect_response(r#"{"overall_status": "pass", "confidence": 99}"#).unwrap();
        assert!(result.defects.is_empty());
    }

    #[test]
    fn test_parse_defect_response_truncates_text() {
        let long_type = "X".repeat(300);
        let response = format!(
            r#"{{"overall_status": "warning", "defects": [{{"type": "{}", "severity": "low"}}]}}"#,
            long_type
        );

        let result = parse_defect_response(&response).unwrap();
        assert_eq!(result.defects[0].defect_type.chars().count(), 100);
    }

    #[test]
    fn test_parse_defect_response_malformed() {
        let result = parse_defect_response("{ not really json }");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_normalize_analysis_rejects_non_object() {
        let result = normalize_analysis(serde_json::json!([1, 2, 3]));
        assert!(result.is_err());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("傷あり表面", 2), "傷あ");
    }
}
