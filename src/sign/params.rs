//! Canonical query parameter sets, endpoint template rendering, and URL joining.

// crates.io
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
// self
use crate::{_prelude::*, error::ConfigError};

// Everything but alphanumerics and `_ . - ~` is escaped; spaces are rendered as `+` afterwards.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Query parameters kept sorted ascending by key (byte-lexicographic).
///
/// Insertion order never affects the encoded query, so two sets with the same pairs always
/// serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);
impl QueryParams {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Fixed parameters sent by the Android client on every signed request.
	pub fn android_defaults() -> Self {
		Self::new()
			.with("build", 507_000)
			.with("device", "android")
			.with("platform", "android")
			.with("mobi_app", "android")
	}

	/// Adds a parameter, replacing any earlier value under the same key.
	pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.insert(key, value);

		self
	}

	/// Adds a parameter when `value` is present. Absent values are dropped.
	pub fn with_opt<V>(mut self, key: impl Into<String>, value: Option<V>) -> Self
	where
		V: ToString,
	{
		if let Some(value) = value {
			self.insert(key, value);
		}

		self
	}

	/// Inserts a parameter and returns the value it replaced.
	pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> Option<String> {
		self.0.insert(key.into(), value.to_string())
	}

	/// Overlays every pair from `other`; later values win.
	pub fn extend_from(&mut self, other: &QueryParams) {
		self.0.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
	}

	/// Returns the value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Returns true if `key` is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Number of parameters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no parameters are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates over the pairs in ascending key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Serializes the pairs as an `application/x-www-form-urlencoded` query string.
	///
	/// Spaces become `+`; `~` is kept and `*` is escaped.
	pub fn encode(&self) -> String {
		self.iter()
			.map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
			.collect::<Vec<_>>()
			.join("&")
	}
}
impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: ToString,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.to_string())).collect())
	}
}
impl<K, V, const N: usize> From<[(K, V); N]> for QueryParams
where
	K: Into<String>,
	V: ToString,
{
	fn from(pairs: [(K, V); N]) -> Self {
		pairs.into_iter().collect()
	}
}

// `%` only ever starts an escape triplet in the output, so `%20` is always an encoded space.
fn encode_component(raw: &str) -> String {
	utf8_percent_encode(raw, QUERY_COMPONENT).to_string().replace("%20", "+")
}

/// Renders `{name}` placeholders in an endpoint template from `params`.
///
/// `{{` and `}}` produce literal braces. Placeholders stay in the query as well.
pub fn render_endpoint(template: &str, params: &QueryParams) -> Result<String, ConfigError> {
	let malformed = || ConfigError::MalformedTemplate { template: template.to_owned() };
	let mut rendered = String::with_capacity(template.len());
	let mut chars = template.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			'{' if chars.peek() == Some(&'{') => {
				chars.next();
				rendered.push('{');
			},
			'}' if chars.peek() == Some(&'}') => {
				chars.next();
				rendered.push('}');
			},
			'{' => {
				let mut name = String::new();

				loop {
					match chars.next() {
						Some('}') => break,
						Some('{') | None => return Err(malformed()),
						Some(c) => name.push(c),
					}
				}

				let value = params.get(&name).ok_or_else(|| ConfigError::UnresolvedPlaceholder {
					template: template.to_owned(),
					placeholder: name.clone(),
				})?;

				rendered.push_str(value);
			},
			'}' => return Err(malformed()),
			c => rendered.push(c),
		}
	}

	Ok(rendered)
}

/// Joins `base` with a rendered endpoint path and the encoded `params`.
///
/// The base host's own path, query, and fragment are replaced.
pub fn join(base: &Url, template: &str, params: &QueryParams) -> Result<Url, ConfigError> {
	let path = render_endpoint(template, params)?;
	let mut url = base.clone();

	url.set_path(&path);
	url.set_fragment(None);

	if params.is_empty() {
		url.set_query(None);
	} else {
		url.set_query(Some(&params.encode()));
	}

	Ok(url)
}
