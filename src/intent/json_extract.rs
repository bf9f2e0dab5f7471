//! Multi-strategy JSON extraction from LLM responses. Grounded on `backend/src/memory/features/
//! message_pipeline/analyzers/chat_analyzer.rs::extract_json_from_response`:
//! try a structured "output" array, then a markdown code fence, then a raw
//! `{...}` scan, then a raw `[...]` scan.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref CODE_FENCE_RE: Regex = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap();
}

/// Returns the first JSON value extractable from `response`, trying each
/// strategy in order. `None` if nothing parses.
pub fn extract_json(response: &str) -> Option<Value> {
    if let Some(value) = extract_from_output_array(response) {
        return Some(value);
    }
    if let Some(value) = extract_from_code_fence(response) {
        return Some(value);
    }
    if let Some(value) = extract_raw_object(response) {
        return Some(value);
    }
    extract_raw_array(response)
}

/// Some providers wrap the answer in `{"output": [{"content": [{"text":
/// "<json>"}]}]}`; unwrap that before parsing the inner text as JSON.
fn extract_from_output_array(response: &str) -> Option<Value> {
    let outer: Value = serde_json::from_str(response).ok()?;
    let text = outer.get("output")?.as_array()?.iter().find_map(|item| {
        item.get("content")?.as_array()?.iter().find_map(|c| c.get("text")?.as_str().map(str::to_string))
    })?;
    serde_json::from_str(&text).ok()
}

fn extract_from_code_fence(response: &str) -> Option<Value> {
    let captured = CODE_FENCE_RE.captures(response)?.get(1)?.as_str();
    serde_json::from_str(captured.trim()).ok()
}

fn extract_raw_object(response: &str) -> Option<Value> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

fn extract_raw_array(response: &str) -> Option<Value> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_object() {
        let value = extract_json(r#"{"intent": "Factual"}"#).unwrap();
        assert_eq!(value["intent"], "Factual");
    }

    #[test]
    fn parses_json_in_code_fence() {
        let response = "Here is the result:\n```json\n{\"intent\": \"Event\"}\n```\nThanks.";
        let value = extract_json(response).unwrap();
        assert_eq!(value["intent"], "Event");
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let response = "Sure, the answer is {\"confidence\": 0.9} based on context.";
        let value = extract_json(response).unwrap();
        assert_eq!(value["confidence"], 0.9);
    }

    #[test]
    fn parses_raw_array_when_no_object_present() {
        let response = "entities: [\"Sasha\", \"Kolya\"]";
        let value = extract_json(response).unwrap();
        assert_eq!(value[0], "Sasha");
    }

    #[test]
    fn returns_none_for_unparseable_text() {
        assert!(extract_json("no json here at all").is_none());
    }
}
