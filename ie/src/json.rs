//! Recovering a JSON object from free-form model output.

use serde_json::{Map, Value};

/// How much raw model text ends up in a warning.
const LOG_EXCERPT: usize = 400;

/// Extract the JSON object a model answer is supposed to contain.
///
/// Tries, in order: the text with surrounding code fences removed, then the
/// outermost `{...}` span. Anything that does not end up as an object is
/// `None`, logged with an excerpt of the raw text under `tag`.
pub fn recover_object(raw: &str, tag: &str) -> Option<Map<String, Value>> {
	let text = strip_fences(raw);
	if text.is_empty() {
		tracing::warn!(tag, "empty model response");
		return None;
	}

	if let Ok(Value::Object(map)) = serde_json::from_str(text) {
		return Some(map);
	}

	let span = match (text.find('{'), text.rfind('}')) {
		(Some(start), Some(end)) if end > start => Some(&text[start..=end]),
		_ => None,
	};
	if let Some(Ok(Value::Object(map))) = span.map(serde_json::from_str::<Value>) {
		return Some(map);
	}

	tracing::warn!(tag, raw = %excerpt(raw), "model response is not a JSON object");
	None
}

fn strip_fences(raw: &str) -> &str {
	let text = raw.trim();
	let Some(rest) = text.strip_prefix("```") else {
		return text;
	};
	// Drop the info string (```json) along with the opening fence line.
	let rest = rest.split_once('\n').map_or("", |(_, body)| body);
	let rest = rest.trim_end();
	rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn excerpt(raw: &str) -> String {
	match raw.char_indices().nth(LOG_EXCERPT) {
		Some((i, _)) => format!("{}…", &raw[..i]),
		None => raw.to_string(),
	}
}
