use crate::error::Error;
use crate::types::GenerateContentResponse;

impl GenerateContentResponse {
    /// Text of the first candidate, or `None` when the model produced nothing.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.is_empty() { None } else { Some(text) }
    }

    pub fn into_text(self) -> Result<String, Error> {
        if let Some(text) = self.text() {
            return Ok(text);
        }

        let reason = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
            .or_else(|| {
                self.candidates
                    .first()
                    .and_then(|c| c.finish_reason.clone())
            })
            .unwrap_or_else(|| "no candidates".to_string());

        Err(Error::EmptyResponse(reason))
    }
}

/// Removes a surrounding markdown code fence (```` ```json ```` or bare
/// ```` ``` ````) from model output.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_cases() {
        let cases: &[(&str, &str)] = &[
            ("```json\n[1, 2]\n```", "[1, 2]"),
            ("```\n{\"a\": 1}\n```", "{\"a\": 1}"),
            ("  ```JSON\n[]\n```  \n", "[]"),
            ("[1]", "[1]"),
            ("not json", "not json"),
            ("```json\n[1]", "[1]"),
            ("```[1]```", "[1]"),
        ];

        for (input, expected) in cases {
            assert_eq!(strip_code_fences(input), *expected, "failed for {:?}", input);
        }
    }

    #[test]
    fn text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "Hello, " }, { "text": "counsel" }]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(response.text().as_deref(), Some("Hello, counsel"));
    }

    #[test]
    fn into_text_reports_block_reason() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();

        match response.into_text() {
            Err(Error::EmptyResponse(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected EmptyResponse, got {:?}", other),
        }
    }
}
