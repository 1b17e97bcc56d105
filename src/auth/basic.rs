//! HTTP Basic credential checks against a static allow-list.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, auth::Secret};

/// Header value sent back with a `401` so clients know to retry with Basic credentials.
pub const WWW_AUTHENTICATE_BASIC: &str = "Basic";

/// A username/password pair allowed through the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
	/// Account name.
	pub username: String,
	/// Account password.
	pub password: Secret,
}
impl BasicCredentials {
	/// Builds a credential pair.
	pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
		Self { username: username.into(), password: password.into() }
	}

	/// Decodes an `Authorization: Basic <base64>` header value.
	pub fn from_header(value: &str) -> Result<Self> {
		// Auth schemes are case-insensitive.
		let encoded = value
			.trim()
			.split_once(' ')
			.filter(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
			.map(|(_, encoded)| encoded)
			.ok_or_else(|| invalid("authorization scheme is not Basic"))?;
		let decoded = STANDARD
			.decode(encoded.trim())
			.map_err(|_| invalid("authorization payload is not valid base64"))?;
		let decoded =
			String::from_utf8(decoded).map_err(|_| invalid("authorization payload is not UTF-8"))?;
		let (username, password) = decoded
			.split_once(':')
			.ok_or_else(|| invalid("authorization payload is missing a colon"))?;

		Ok(Self::new(username, password))
	}

	/// Encodes the pair as an `Authorization` header value.
	pub fn to_header(&self) -> String {
		format!("Basic {}", STANDARD.encode(format!("{}:{}", self.username, self.password.expose())))
	}
}

/// Checks presented credentials against the configured allow-list.
///
/// A disabled authenticator accepts every request, including ones without credentials.
#[derive(Clone, Debug, Default)]
pub struct BasicAuthenticator {
	enabled: bool,
	allowed: Vec<BasicCredentials>,
}
impl BasicAuthenticator {
	/// Builds an enabled authenticator over `allowed`.
	pub fn new(allowed: Vec<BasicCredentials>) -> Self {
		Self { enabled: true, allowed }
	}

	/// Builds an authenticator that lets every request through.
	pub fn disabled() -> Self {
		Self { enabled: false, allowed: Vec::new() }
	}

	/// Returns true if credentials are checked.
	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Verifies a raw `Authorization` header value.
	///
	/// Returns the authenticated username, or `None` when the authenticator is disabled.
	pub fn authorize_header(&self, header: Option<&str>) -> Result<Option<String>> {
		if !self.enabled {
			return Ok(None);
		}

		let header = header.ok_or_else(|| invalid("authorization header is missing"))?;
		let presented = BasicCredentials::from_header(header)?;

		self.authorize(&presented).map(Some)
	}

	/// Verifies decoded credentials, comparing every field in constant time.
	pub fn authorize(&self, presented: &BasicCredentials) -> Result<String> {
		if !self.enabled {
			return Ok(presented.username.clone());
		}

		// Every entry is compared so timing does not reveal which one matched.
		let matched = self.allowed.iter().fold(false, |matched, allowed| {
			let user = constant_time_eq(allowed.username.as_bytes(), presented.username.as_bytes());
			let pass = constant_time_eq(
				allowed.password.expose().as_bytes(),
				presented.password.expose().as_bytes(),
			);

			matched | (user & pass)
		});

		if matched {
			Ok(presented.username.clone())
		} else {
			Err(invalid(format!("invalid credentials for user {:?}", presented.username)))
		}
	}
}

fn invalid(reason: impl Into<String>) -> Error {
	Error::InvalidCredentials { reason: reason.into() }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
	if left.len() != right.len() {
		return false;
	}

	left.iter().zip(right).fold(0_u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{Classify, ErrorKind};

	fn authenticator() -> BasicAuthenticator {
		BasicAuthenticator::new(vec![
			BasicCredentials::new("alice", "wonderland"),
			BasicCredentials::new("bob", "builder"),
		])
	}

	#[test]
	fn header_round_trips_through_base64() {
		let credentials = BasicCredentials::new("alice", "wonderland");
		let header = credentials.to_header();

		assert_eq!(header, "Basic YWxpY2U6d29uZGVybGFuZA==");
		assert_eq!(
			BasicCredentials::from_header(&header).expect("Header should decode."),
			credentials
		);
	}

	#[test]
	fn allowed_credentials_pass() {
		let username = authenticator()
			.authorize_header(Some("Basic Ym9iOmJ1aWxkZXI="))
			.expect("Known credentials should pass.");

		assert_eq!(username.as_deref(), Some("bob"));
	}

	#[test]
	fn scheme_matches_in_any_case() {
		for scheme in ["Basic", "basic", "BASIC", "bAsIc"] {
			let credentials = BasicCredentials::from_header(&format!("{scheme} Ym9iOmJ1aWxkZXI="))
				.expect("Scheme should match regardless of case.");

			assert_eq!(credentials.username, "bob");
		}

		assert!(BasicCredentials::from_header("BasicYm9iOmJ1aWxkZXI=").is_err());
		assert!(BasicCredentials::from_header("Basically Ym9iOmJ1aWxkZXI=").is_err());
	}

	#[test]
	fn wrong_password_is_rejected_as_authentication_failure() {
		let err = authenticator()
			.authorize(&BasicCredentials::new("alice", "wonderlan"))
			.expect_err("Wrong password should be rejected.");

		assert_eq!(err.kind(), ErrorKind::Authentication);
		assert!(err.to_string().contains("alice"));
	}

	#[test]
	fn missing_or_malformed_headers_are_rejected() {
		let auth = authenticator();

		assert!(auth.authorize_header(None).is_err());
		assert!(auth.authorize_header(Some("Bearer abc")).is_err());
		assert!(auth.authorize_header(Some("Basic !!!")).is_err());
	}

	#[test]
	fn disabled_authenticator_allows_everything() {
		let auth = BasicAuthenticator::disabled();

		assert!(!auth.is_enabled());
		assert_eq!(auth.authorize_header(None).expect("Disabled auth should allow."), None);
	}
}
