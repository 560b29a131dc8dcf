use crate::{
	client::{
		AccountType,
		Timeout,
	},
	Result,
};
use serde::Deserialize;

/// Settings of a `Service` / `GoogleService`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceConfig {
	/// Application name, sent in the `User-Agent` header (and as `source` on login)
	pub application_name: String,
	/// Value of the `GData-Version` header
	pub protocol_version: Option<String>,
	/// Connect timeout in milliseconds (`0` waits indefinitely)
	pub connect_timeout: Option<i64>,
	/// Read timeout in milliseconds (`0` waits indefinitely)
	pub read_timeout: Option<i64>,
	/// Validate extensions after parsing and before generating
	pub strict_validation: bool,
	/// Capture unrecognized markup instead of rejecting it
	pub arbitrary_xml: bool,
	/// Store and send cookies (GoogleService only)
	pub handle_cookies: bool,
	/// ClientLogin settings (GoogleService only)
	pub login: LoginConfig,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			application_name: String::from("gdata-rust"),
			protocol_version: None,
			connect_timeout: None,
			read_timeout: None,
			strict_validation: true,
			arbitrary_xml: true,
			handle_cookies: true,
			login: LoginConfig::default(),
		}
	}
}

impl ServiceConfig {
	/// Configured connect timeout (fails for negative values)
	pub fn connect_timeout(&self) -> Result<Option<Timeout>> {
		self.connect_timeout.map(Timeout::from_millis).transpose()
	}

	/// Configured read timeout (fails for negative values)
	pub fn read_timeout(&self) -> Result<Option<Timeout>> {
		self.read_timeout.map(Timeout::from_millis).transpose()
	}

	/// `User-Agent` header value
	pub fn user_agent(&self) -> String {
		format!("{} GData-Rust/{}", self.application_name, env!("CARGO_PKG_VERSION"))
	}
}

/// Where and how to log in with ClientLogin
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoginConfig {
	/// `https` (or `http` for testing)
	pub protocol: String,
	/// Host of the login service
	pub domain: String,
	/// Account type to log in with
	pub account_type: AccountType,
}

impl Default for LoginConfig {
	fn default() -> Self {
		Self {
			protocol: String::from("https"),
			domain: String::from("www.google.com"),
			account_type: AccountType::default(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn deserialize_partial() {
		let config: ServiceConfig = serde_json::from_str(
			r#"{
				"application-name": "contacts-sync",
				"protocol-version": "3.0",
				"read-timeout": 0,
				"strict-validation": false,
				"login": { "account-type": "HOSTED" }
			}"#,
		)
		.unwrap();
		assert_eq!(config.application_name, "contacts-sync");
		assert_eq!(config.protocol_version.as_deref(), Some("3.0"));
		assert_eq!(config.read_timeout().unwrap(), Some(Timeout::Infinite));
		assert_eq!(config.connect_timeout().unwrap(), None);
		assert!(!config.strict_validation);
		assert!(config.arbitrary_xml);
		assert_eq!(config.login.account_type, AccountType::Hosted);
		assert_eq!(config.login.domain, "www.google.com");
		assert!(config.user_agent().starts_with("contacts-sync GData-Rust/"));
	}

	#[test]
	fn negative_timeout_rejected() {
		let config: ServiceConfig = serde_json::from_str(r#"{ "connect-timeout": -5 }"#).unwrap();
		assert!(config.connect_timeout().is_err());
	}
}
