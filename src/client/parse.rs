//! Upstream body decoding for plain and callback-enveloped JSON.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::error::{ResponseError, preview};

const PREVIEW_LIMIT: usize = 128;

/// Parses `body` as JSON, falling back to the content of a `callback(...)` envelope.
///
/// The envelope is the text between the first `(` and the last `)`, trimmed. When neither form
/// parses, the error from the form that was tried last is returned.
pub fn parse_value(body: &str) -> Result<Value, ResponseError> {
	match decode(body) {
		Ok(value) => Ok(value),
		Err(plain) => match envelope(body) {
			Some(inner) => decode(inner),
			None => Err(plain),
		},
	}
}

/// Parses `body` like [`parse_value`] and deserializes it into `T`.
///
/// Shape mismatches report the JSON path that failed.
pub fn parse_as<T>(body: &str) -> Result<T, ResponseError>
where
	T: DeserializeOwned,
{
	let value = parse_value(body)?;

	serde_path_to_error::deserialize(value)
		.map_err(|source| ResponseError::Json { source, preview: preview(body, PREVIEW_LIMIT) })
}

/// Returns the trimmed content of a `callback(...)` envelope, if `body` has one.
pub fn envelope(body: &str) -> Option<&str> {
	let start = body.find('(')?;
	let end = body.rfind(')')?;

	(end > start).then(|| body[start + 1..end].trim())
}

fn decode(text: &str) -> Result<Value, ResponseError> {
	let mut de = serde_json::Deserializer::from_str(text);
	let value = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| ResponseError::Json { source, preview: preview(text, PREVIEW_LIMIT) })?;

	de.end()
		.map_err(|source| ResponseError::Trailing { source, preview: preview(text, PREVIEW_LIMIT) })?;

	Ok(value)
}
