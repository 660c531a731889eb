//! JSON parsing for vision model responses
//!
//! Models are told to return bare JSON but regularly wrap it in markdown
//! fences or add a sentence of preamble.

use crate::analysis::AnalysisResult;
use crate::error::{Error, Result};

const RAW_SNIPPET_CHARS: usize = 200;

fn truncate(raw: &str) -> String {
    if raw.chars().count() > RAW_SNIPPET_CHARS {
        let head: String = raw.chars().take(RAW_SNIPPET_CHARS).collect();
        format!("{}...", head)
    } else {
        raw.to_string()
    }
}

/// Strip ```json fences and surrounding whitespace
pub fn strip_code_fences(response: &str) -> String {
    response.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a bill analysis from a model response
pub fn parse_analysis_response(response: &str) -> Result<AnalysisResult> {
    let cleaned = strip_code_fences(response);

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &cleaned[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid bill analysis JSON from AI: {} | Raw: {}",
                    e,
                    truncate(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI bill analysis response | Raw: {}",
            truncate(&cleaned)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json() {
        let result = parse_analysis_response(r#"{"total_amount": 88.1, "usage_kwh": 300}"#).unwrap();
        assert_eq!(result.total_amount, 88.1);
        assert_eq!(result.usage_kwh, 300.0);
    }

    #[test]
    fn test_parse_fenced_json_with_preamble() {
        let response = "Here is the analysis:\n```json\n{\"total_amount\": 120, \"action_plan\": [{\"id\": \"action-1\", \"savings\": \"$15.00\"}]}\n```";
        let result = parse_analysis_response(response).unwrap();
        assert_eq!(result.total_amount, 120.0);
        assert_eq!(result.action_plan[0].savings, "$15.00");
    }

    #[test]
    fn test_parse_no_json() {
        let err = parse_analysis_response("I cannot read this image.").unwrap_err();
        assert!(err.to_string().contains("No JSON found"));
    }

    #[test]
    fn test_parse_invalid_json_truncates_raw() {
        let body = format!("{{\"total_amount\": {}", "9".repeat(500)) + ", }";
        let err = parse_analysis_response(&body).unwrap_err().to_string();
        assert!(err.contains("Invalid bill analysis JSON"));
        assert!(err.ends_with("..."));
    }
}
