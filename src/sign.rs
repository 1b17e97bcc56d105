//! Reproducible MD5 request signing for upstreams that authenticate query strings.
//!
//! Signing merges three parameter sources in a fixed order: caller parameters first, then the
//! signer's fixed defaults, then `access_key`, `appkey`, and `ts`. Later sources win. The merged
//! set is sorted by key, form-encoded, and hashed together with the secret:
//!
//! ```text
//! sign = lowercase_hex(md5(query ++ secret))
//! ```
//!
//! The final URL is the canonical query with `&sign=<sign>` appended.

pub mod params;

pub use params::*;

// crates.io
use md5::{Digest, Md5};
// self
use crate::{
	_prelude::*,
	auth::Secret,
	clock::{Clock, SystemClock},
	error::ConfigError,
};

/// Keys and fixed parameters bound into a [`RequestSigner`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningCredentials {
	/// Sent as `access_key`.
	pub access_key: String,
	/// Sent as `appkey`.
	pub app_key: String,
	/// Appended to the query before hashing; never sent.
	pub secret: Secret,
	/// Merged into every signed request after the caller's parameters.
	#[serde(default = "QueryParams::android_defaults")]
	pub fixed_defaults: QueryParams,
}
impl SigningCredentials {
	/// Validates and builds credentials with the Android fixed defaults.
	pub fn new(
		access_key: impl Into<String>,
		app_key: impl Into<String>,
		secret: impl Into<Secret>,
	) -> Result<Self, ConfigError> {
		let credentials = Self {
			access_key: access_key.into(),
			app_key: app_key.into(),
			secret: secret.into(),
			fixed_defaults: QueryParams::android_defaults(),
		};

		credentials.validate()?;

		Ok(credentials)
	}

	/// Replaces the fixed defaults.
	pub fn with_fixed_defaults(mut self, defaults: QueryParams) -> Self {
		self.fixed_defaults = defaults;

		self
	}

	/// Fails when any key or the secret is blank.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.access_key.trim().is_empty() {
			return Err(ConfigError::MissingSigningField { field: "access_key" });
		}
		if self.app_key.trim().is_empty() {
			return Err(ConfigError::MissingSigningField { field: "app_key" });
		}
		if self.secret.is_blank() {
			return Err(ConfigError::MissingSigningField { field: "secret" });
		}

		Ok(())
	}
}

/// Outbound request with a canonical parameter set and its signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
	/// Upstream base host.
	pub base_host: Url,
	/// Endpoint template as supplied by the caller.
	pub endpoint_template: String,
	/// Merged parameters, sorted ascending by key, excluding `sign`.
	pub parameters: QueryParams,
	/// Unix seconds stamped into `ts`.
	pub timestamp: i64,
	/// Lowercase hex MD5 digest.
	pub signature: String,
}
impl SignedRequest {
	/// Returns the canonical query string that was hashed.
	pub fn canonical_query(&self) -> String {
		self.parameters.encode()
	}

	/// Builds the final URL with `sign` appended after the canonical query.
	pub fn url(&self) -> Result<Url, ConfigError> {
		let mut url = join(&self.base_host, &self.endpoint_template, &self.parameters)?;
		let query = format!("{}&sign={}", self.canonical_query(), self.signature);

		url.set_query(Some(&query));

		Ok(url)
	}
}

/// Signs outbound parameter sets with a bound secret and an injectable clock.
#[derive(Clone, Debug)]
pub struct RequestSigner {
	credentials: SigningCredentials,
	clock: Arc<dyn Clock>,
}
impl RequestSigner {
	/// Creates a signer using the system clock.
	pub fn new(credentials: SigningCredentials) -> Result<Self, ConfigError> {
		credentials.validate()?;

		Ok(Self { credentials, clock: Arc::new(SystemClock) })
	}

	/// Overrides the clock used for `ts`.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the bound credentials.
	pub fn credentials(&self) -> &SigningCredentials {
		&self.credentials
	}

	/// Merges, canonicalizes, and signs `params` for `endpoint_template` on `base_host`.
	///
	/// The endpoint template is rendered once here so unresolved placeholders fail before any
	/// network traffic.
	pub fn sign(
		&self,
		base_host: &Url,
		endpoint_template: &str,
		params: QueryParams,
	) -> Result<SignedRequest, ConfigError> {
		let timestamp = self.clock.unix_seconds();
		let mut parameters = params;

		parameters.extend_from(&self.credentials.fixed_defaults);
		parameters.insert("access_key", &self.credentials.access_key);
		parameters.insert("appkey", &self.credentials.app_key);
		parameters.insert("ts", timestamp);

		render_endpoint(endpoint_template, &parameters)?;

		let signature = self.digest(&parameters.encode());

		Ok(SignedRequest {
			base_host: base_host.clone(),
			endpoint_template: endpoint_template.to_owned(),
			parameters,
			timestamp,
			signature,
		})
	}

	/// Recomputes the digest of `request` and compares it with the stored signature.
	pub fn verify(&self, request: &SignedRequest) -> bool {
		self.digest(&request.canonical_query()) == request.signature
	}

	fn digest(&self, query: &str) -> String {
		let mut hasher = Md5::new();

		hasher.update(query.as_bytes());
		hasher.update(self.credentials.secret.expose().as_bytes());

		hex::encode(hasher.finalize())
	}
}
