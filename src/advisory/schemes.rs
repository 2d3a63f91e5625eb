//! Parsing of scheme lists returned by the advisory service.

use std::sync::LazyLock;

use regex::Regex;

use super::AdvisoryError;
use crate::models::Scheme;

static THINKING_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<unused\d+>thought\n.*?<unused\d+>").unwrap());
static UNUSED_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<unused\d+>").unwrap());

/// Extract a JSON block from a model reply. Handles markdown fences and
/// text before or after the JSON.
pub fn extract_json_block(reply: &str) -> Result<&str, AdvisoryError> {
    let trimmed = reply.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('[') || block.starts_with('{') {
                return Ok(block);
            }
        }
    }

    // Outermost array or object, whichever opens first.
    let open = trimmed.find(['[', '{']).ok_or(AdvisoryError::NoJson)?;
    let close_char = if trimmed[open..].starts_with('[') { ']' } else { '}' };
    match trimmed.rfind(close_char) {
        Some(close) if close > open => Ok(&trimmed[open..=close]),
        _ => Err(AdvisoryError::NoJson),
    }
}

/// Parse a scheme list. Accepts a root array or an object with a
/// `schemes` array. Items missing a required field are dropped.
pub fn parse_schemes(reply: &str) -> Result<Vec<Scheme>, AdvisoryError> {
    let without_thoughts = THINKING_BLOCK_RE.replace_all(reply, "");
    let cleaned = UNUSED_TOKEN_RE.replace_all(&without_thoughts, "");
    let block = extract_json_block(&cleaned)?;
    let value: serde_json::Value = serde_json::from_str(block)
        .map_err(|e| AdvisoryError::ResponseParsing(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("schemes") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(AdvisoryError::ResponseParsing(
                    "object without a schemes array".into(),
                ))
            }
        },
        _ => {
            return Err(AdvisoryError::ResponseParsing(
                "expected an array of schemes".into(),
            ))
        }
    };

    let total = items.len();
    let schemes: Vec<Scheme> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Scheme>(item).ok())
        .filter(|s| !s.id.trim().is_empty() && !s.name.trim().is_empty())
        .collect();

    if schemes.len() < total {
        tracing::debug!(dropped = total - schemes.len(), "invalid scheme items dropped");
    }
    Ok(schemes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_SCHEME: &str = r#"[{
        "id": "pmjay",
        "name": "Ayushman Bharat PM-JAY",
        "benefits": "Cashless hospitalisation",
        "coverageAmount": "5,00,000 per family per year",
        "eligibility": "Families listed in SECC 2011",
        "matchReason": "Covers cardiac care",
        "applicationSteps": ["Check eligibility", "Visit an empanelled hospital"],
        "requiredDocuments": ["Aadhaar card", "Ration card"],
        "officialLink": "https://pmjay.gov.in"
    }]"#;

    #[test]
    fn parses_root_array() {
        let schemes = parse_schemes(ONE_SCHEME).unwrap();
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes[0].id, "pmjay");
        assert_eq!(schemes[0].application_steps.len(), 2);
        assert_eq!(schemes[0].official_link.as_deref(), Some("https://pmjay.gov.in"));
    }

    #[test]
    fn strips_code_fences() {
        let reply = format!("Here you go:\n```json\n{ONE_SCHEME}\n```\nStay healthy!");
        assert_eq!(parse_schemes(&reply).unwrap().len(), 1);

        let bare_fence = format!("```\n{ONE_SCHEME}\n```");
        assert_eq!(parse_schemes(&bare_fence).unwrap().len(), 1);
    }

    #[test]
    fn accepts_wrapped_object() {
        let reply = format!(r#"{{"schemes": {ONE_SCHEME}}}"#);
        assert_eq!(parse_schemes(&reply).unwrap().len(), 1);
    }

    #[test]
    fn drops_incomplete_items() {
        let reply = r#"[
            {"id": "a", "name": "Only a name"},
            {"id": "", "name": "Blank id", "benefits": "b", "coverageAmount": "c",
             "eligibility": "e", "matchReason": "m", "applicationSteps": [],
             "requiredDocuments": []},
            {"id": "ok", "name": "Complete", "benefits": "b", "coverageAmount": "c",
             "eligibility": "e", "matchReason": "m", "applicationSteps": ["s"],
             "requiredDocuments": ["d"]}
        ]"#;
        let schemes = parse_schemes(reply).unwrap();
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes[0].id, "ok");
        assert_eq!(schemes[0].official_link, None);
    }

    #[test]
    fn rejects_non_list_shapes() {
        assert!(matches!(parse_schemes("no json here"), Err(AdvisoryError::NoJson)));
        assert!(matches!(
            parse_schemes(r#"{"results": []}"#),
            Err(AdvisoryError::ResponseParsing(_))
        ));
        assert!(matches!(
            parse_schemes("[{\"id\": "),
            Err(AdvisoryError::ResponseParsing(_)) | Err(AdvisoryError::NoJson)
        ));
    }

    #[test]
    fn strips_thinking_prefix() {
        let reply = format!("<unused94>thought\nLet me think [about it]<unused95>{ONE_SCHEME}");
        assert_eq!(parse_schemes(&reply).unwrap().len(), 1);
    }

    #[test]
    fn empty_array_is_ok() {
        assert!(parse_schemes("[]").unwrap().is_empty());
    }
}
