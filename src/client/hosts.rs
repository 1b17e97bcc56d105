//! Source-tag to upstream base-host table.

// self
use crate::{_prelude::*, error::ConfigError};

/// Fixed mapping from source tag to upstream base host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTable {
	hosts: BTreeMap<String, Url>,
	default_tag: String,
}
impl HostTable {
	/// Tag resolved when an endpoint names no source.
	pub const DEFAULT_TAG: &'static str = "app";

	const BILIBILI: [(&'static str, &'static str); 8] = [
		("app", "https://app.bilibili.com"),
		("api", "https://api.bilibili.com"),
		("interface", "https://interface.bilibili.com"),
		("main", "https://www.bilibili.com"),
		("bgm", "https://bangumi.bilibili.com"),
		("comment", "https://comment.bilibili.com"),
		("search", "https://s.search.bilibili.com"),
		("mobile", "https://m.bilibili.com"),
	];

	/// Creates an empty table whose default tag is [`HostTable::DEFAULT_TAG`].
	pub fn empty() -> Self {
		Self { hosts: BTreeMap::new(), default_tag: Self::DEFAULT_TAG.to_owned() }
	}

	/// Returns the built-in Bilibili host table.
	pub fn bilibili() -> Result<Self, ConfigError> {
		Self::BILIBILI.into_iter().try_fold(Self::empty(), |table, (tag, host)| table.with_host(tag, host))
	}

	/// Adds or replaces the host for `tag`.
	pub fn with_host(mut self, tag: impl Into<String>, host: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(host)
			.map_err(|source| ConfigError::InvalidHost { host: host.to_owned(), source })?;

		self.hosts.insert(tag.into(), url);

		Ok(self)
	}

	/// Points every known tag at `host`, which is how tests aim the table at a mock server.
	pub fn redirect_all(mut self, host: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(host)
			.map_err(|source| ConfigError::InvalidHost { host: host.to_owned(), source })?;

		self.hosts.values_mut().for_each(|slot| *slot = url.clone());
		self.hosts.entry(self.default_tag.clone()).or_insert(url);

		Ok(self)
	}

	/// Changes the tag used when an endpoint names no source.
	pub fn with_default_tag(mut self, tag: impl Into<String>) -> Self {
		self.default_tag = tag.into();

		self
	}

	/// Resolves `tag`, or the default tag when `None`.
	pub fn resolve(&self, tag: Option<&str>) -> Result<&Url, ConfigError> {
		let tag = tag.unwrap_or(&self.default_tag);

		self.hosts.get(tag).ok_or_else(|| ConfigError::UnknownSource { tag: tag.to_owned() })
	}

	/// Iterates over `(tag, host)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Url)> {
		self.hosts.iter().map(|(tag, url)| (tag.as_str(), url))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bilibili_table_resolves_known_tags() {
		let table = HostTable::bilibili().expect("Built-in table should parse.");

		assert_eq!(
			table.resolve(None).expect("Default tag should resolve.").as_str(),
			"https://app.bilibili.com/"
		);
		assert_eq!(
			table.resolve(Some("search")).expect("Search tag should resolve.").host_str(),
			Some("s.search.bilibili.com")
		);
		assert_eq!(table.iter().count(), 8);
		assert!(matches!(
			table.resolve(Some("nope")),
			Err(ConfigError::UnknownSource { tag }) if tag == "nope"
		));
	}

	#[test]
	fn redirect_all_and_invalid_hosts() {
		let table = HostTable::bilibili()
			.expect("Built-in table should parse.")
			.redirect_all("http://127.0.0.1:9000")
			.expect("Mock host should parse.");

		assert!(table.iter().all(|(_, url)| url.port() == Some(9000)));
		assert!(matches!(
			HostTable::empty().with_host("x", "not a url"),
			Err(ConfigError::InvalidHost { .. })
		));
	}
}
