//! Credentials for Google services
//!
//! A token produces the `Authorization` header of each request.  [`GoogleAuthTokenFactory`]
//! obtains and holds the token of a service, and re-authenticates when the server reports an
//! expired session.

use crate::{
	client::{
		request::read_response,
		ContentType,
		GDataRequestFactory,
		LoginConfig,
		RequestType,
	},
	errors::{
		self,
		AuthFailure,
	},
	Error,
	Result,
};
use base64::Engine;
use serde::Deserialize;
use std::{
	collections::HashMap,
	fmt,
	io::Write,
	sync::Arc,
};
use tracing::{
	debug,
	info,
};
use url::Url;

/// Credential attached to requests
pub trait AuthToken: fmt::Debug + Send + Sync {
	/// Value of the `Authorization` header for a request
	fn authorization_header(&self, url: &Url, method: &str) -> Result<String>;

	/// Whether every `401 Unauthorized` means the token expired
	fn expires_on_unauthorized(&self) -> bool {
		false
	}

	/// Refresh an expired token; returns whether a new token was obtained
	fn refresh(&self) -> Result<bool> {
		Ok(false)
	}
}

/// Token obtained with ClientLogin (user name and password)
#[derive(Clone, PartialEq, Eq)]
pub struct UserToken(String);

impl UserToken {
	/// Wrap token value
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	/// Token value
	pub fn value(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for UserToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("UserToken(..)")
	}
}

impl AuthToken for UserToken {
	fn authorization_header(&self, _url: &Url, _method: &str) -> Result<String> {
		Ok(format!("GoogleLogin auth={}", self.0))
	}
}

/// Signs AuthSub requests in secure mode (usually RSA-SHA1 with a registered private key)
pub trait RequestSigner: Send + Sync {
	/// Name of the signature algorithm (`sigalg`), e.g. `rsa-sha1`
	fn algorithm(&self) -> &str;

	/// Sign data
	fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// AuthSub token, optionally with a signer for secure mode
#[derive(Clone)]
pub struct AuthSubToken {
	token: String,
	signer: Option<Arc<dyn RequestSigner>>,
}

impl AuthSubToken {
	/// Token; requests are signed if a signer is passed
	pub fn new(token: impl Into<String>, signer: Option<Arc<dyn RequestSigner>>) -> Self {
		Self {
			token: token.into(),
			signer,
		}
	}

	/// Token value
	pub fn value(&self) -> &str {
		&self.token
	}

	fn signed_header(&self, signer: &dyn RequestSigner, url: &Url, method: &str, timestamp: i64, nonce: u64) -> Result<String> {
		let data = format!("{} {} {} {}", method, url, timestamp, nonce);
		let signature = base64::engine::general_purpose::STANDARD.encode(signer.sign(data.as_bytes())?);
		Ok(format!(
			"AuthSub token=\"{}\" data=\"{}\" sig=\"{}\" sigalg=\"{}\"",
			self.token,
			data,
			signature,
			signer.algorithm()
		))
	}
}

impl fmt::Debug for AuthSubToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthSubToken").field("signed", &self.signer.is_some()).finish()
	}
}

impl AuthToken for AuthSubToken {
	fn authorization_header(&self, url: &Url, method: &str) -> Result<String> {
		match &self.signer {
			None => Ok(format!("AuthSub token=\"{}\"", self.token)),
			Some(signer) => {
				let timestamp = chrono::Utc::now().timestamp();
				let nonce = uuid::Uuid::new_v4().as_u128() as u64;
				self.signed_header(&**signer, url, method, timestamp, nonce)
			},
		}
	}
}

/// Creates OAuth 1.0 authorization headers from previously negotiated parameters
pub trait OAuthSigner: Send + Sync {
	/// Signed `Authorization` header value for a request
	fn authorization_header(&self, url: &Url, method: &str) -> Result<String>;
}

/// OAuth 1.0 (two- or three-legged) credentials
#[derive(Clone)]
pub struct OAuthToken {
	signer: Arc<dyn OAuthSigner>,
}

impl OAuthToken {
	/// Token signing requests through `signer`
	pub fn new(signer: Arc<dyn OAuthSigner>) -> Self {
		Self { signer }
	}
}

impl fmt::Debug for OAuthToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("OAuthToken(..)")
	}
}

impl AuthToken for OAuthToken {
	fn authorization_header(&self, url: &Url, method: &str) -> Result<String> {
		self.signer.authorization_header(url, method)
	}
}

/// Externally managed OAuth 2.0 credential
pub trait OAuth2Credential: Send + Sync {
	/// Current access token
	fn access_token(&self) -> Result<String>;

	/// Obtain a new access token; returns whether that worked
	fn refresh_token(&self) -> Result<bool>;
}

/// OAuth 2.0 bearer token
#[derive(Clone)]
pub struct OAuth2Token {
	credential: Arc<dyn OAuth2Credential>,
}

impl OAuth2Token {
	/// Token backed by `credential`
	pub fn new(credential: Arc<dyn OAuth2Credential>) -> Self {
		Self { credential }
	}
}

impl fmt::Debug for OAuth2Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("OAuth2Token(..)")
	}
}

impl AuthToken for OAuth2Token {
	fn authorization_header(&self, _url: &Url, _method: &str) -> Result<String> {
		Ok(format!("Bearer {}", self.credential.access_token()?))
	}

	fn expires_on_unauthorized(&self) -> bool {
		true
	}

	fn refresh(&self) -> Result<bool> {
		self.credential.refresh_token().map_err(|e| {
			errors::authentication(
				AuthFailure::SessionExpired,
				format!("Failed to refresh access token: {}", e),
			)
		})
	}
}

/// Account type for ClientLogin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
	/// Try a hosted (Google Apps) account first, then a Google account
	HostedOrGoogle,
	/// Google account
	Google,
	/// Hosted (Google Apps) account
	Hosted,
}

impl Default for AccountType {
	fn default() -> Self {
		Self::HostedOrGoogle
	}
}

impl AccountType {
	/// Value of the `accountType` parameter
	pub fn as_str(self) -> &'static str {
		match self {
			Self::HostedOrGoogle => "HOSTED_OR_GOOGLE",
			Self::Google => "GOOGLE",
			Self::Hosted => "HOSTED",
		}
	}
}

/// Answer to a CAPTCHA challenge from a previous login attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptchaAnswer {
	/// `CaptchaToken` of the challenge
	pub token: String,
	/// What the user read
	pub answer: String,
}

/// Obtains and holds the token of a service
pub trait AuthTokenFactory: Send + Sync {
	/// Current token
	fn auth_token(&self) -> Option<Arc<dyn AuthToken>>;

	/// Replace token
	fn set_auth_token(&mut self, token: Option<Arc<dyn AuthToken>>);

	/// React to an expired session: re-authenticate or return `expired` as error
	fn handle_session_expired(&mut self, transport: &dyn GDataRequestFactory, expired: Error) -> Result<()>;

	/// The factory as [`GoogleAuthTokenFactory`], if it is one
	fn as_google(&mut self) -> Option<&mut GoogleAuthTokenFactory> {
		None
	}
}

struct Credentials {
	username: String,
	password: String,
	account_type: AccountType,
}

/// Token factory for Google services: ClientLogin, AuthSub, OAuth and OAuth 2.0
pub struct GoogleAuthTokenFactory {
	service_name: String,
	application_name: String,
	login: LoginConfig,
	credentials: Option<Credentials>,
	token: Option<Arc<dyn AuthToken>>,
}

impl GoogleAuthTokenFactory {
	/// Factory for the named service (e.g. `cp` for contacts)
	pub fn new(service_name: impl Into<String>, application_name: impl Into<String>, login: LoginConfig) -> Self {
		Self {
			service_name: service_name.into(),
			application_name: application_name.into(),
			login,
			credentials: None,
			token: None,
		}
	}

	/// Name of the service tokens are requested for
	pub fn service_name(&self) -> &str {
		&self.service_name
	}

	/// Log in with user name and password; the credentials are kept to log in again when the
	/// session expires
	pub fn set_user_credentials(
		&mut self,
		transport: &dyn GDataRequestFactory,
		username: &str,
		password: &str,
		captcha: Option<&CaptchaAnswer>,
		account_type: Option<AccountType>,
	) -> Result<()> {
		let account_type = account_type.unwrap_or(self.login.account_type);
		self.credentials = Some(Credentials {
			username: username.to_string(),
			password: password.to_string(),
			account_type,
		});
		let token = self.client_login(transport, username, password, captcha, account_type)?;
		self.set_user_token(token);
		Ok(())
	}

	/// Use a ClientLogin token obtained elsewhere
	pub fn set_user_token(&mut self, token: impl Into<String>) {
		self.token = Some(Arc::new(UserToken::new(token)));
	}

	/// Use an AuthSub token (signed if `signer` is set)
	pub fn set_auth_sub_token(&mut self, token: impl Into<String>, signer: Option<Arc<dyn RequestSigner>>) {
		self.credentials = None;
		self.token = Some(Arc::new(AuthSubToken::new(token, signer)));
	}

	/// Use OAuth 1.0 credentials
	pub fn set_oauth_credentials(&mut self, signer: Arc<dyn OAuthSigner>) {
		self.credentials = None;
		self.token = Some(Arc::new(OAuthToken::new(signer)));
	}

	/// Use an OAuth 2.0 credential
	pub fn set_oauth2_credentials(&mut self, credential: Arc<dyn OAuth2Credential>) {
		self.credentials = None;
		self.token = Some(Arc::new(OAuth2Token::new(credential)));
	}

	fn login_url(&self) -> Result<Url> {
		Ok(Url::parse(&format!("{}://{}/accounts/ClientLogin", self.login.protocol, self.login.domain))?)
	}

	/// Request a token with ClientLogin
	pub fn client_login(
		&self,
		transport: &dyn GDataRequestFactory,
		username: &str,
		password: &str,
		captcha: Option<&CaptchaAnswer>,
		account_type: AccountType,
	) -> Result<String> {
		let mut params = vec![
			("Email", username),
			("Passwd", password),
			("source", self.application_name.as_str()),
			("service", self.service_name.as_str()),
			("accountType", account_type.as_str()),
		];
		if let Some(captcha) = captcha {
			params.push(("logintoken", captcha.token.as_str()));
			params.push(("logincaptcha", captcha.answer.as_str()));
		}
		let body = params
			.iter()
			.map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
			.collect::<Vec<_>>()
			.join("&");

		let url = self.login_url()?;
		debug!(%url, service = %self.service_name, "requesting ClientLogin token");
		let mut request = transport.request(RequestType::Insert, &url, &ContentType::form())?;
		request.request_stream()?.write_all(body.as_bytes())?;
		request.execute()?;
		let response = String::from_utf8_lossy(&read_response(&mut *request)?).into_owned();

		let pairs = parse_pairs(&response);
		match pairs.get("Auth") {
			Some(token) => Ok(token.to_string()),
			None => Err(self.login_error(&pairs)),
		}
	}

	fn login_error(&self, pairs: &HashMap<&str, &str>) -> Error {
		let code = pairs.get("Error").copied().unwrap_or_default();
		let (reason, message) = match code {
			"BadAuthentication" => (AuthFailure::InvalidCredentials, "Invalid credentials"),
			"AccountDeleted" => (AuthFailure::AccountDeleted, "Account deleted"),
			"AccountDisabled" => (AuthFailure::AccountDisabled, "Account disabled"),
			"NotVerified" => (AuthFailure::NotVerified, "Not verified"),
			"TermsNotAgreed" => (AuthFailure::TermsNotAgreed, "Terms not agreed"),
			"ServiceUnavailable" => (AuthFailure::ServiceUnavailable, "Service unavailable"),
			"CaptchaRequired" => {
				let url = format!(
					"{}://{}/accounts/{}",
					self.login.protocol,
					self.login.domain,
					pairs.get("CaptchaUrl").copied().unwrap_or_default()
				);
				let token = pairs.get("CaptchaToken").copied().unwrap_or_default().to_string();
				(AuthFailure::CaptchaRequired { url, token }, "Captcha required")
			},
			other => (
				AuthFailure::Other(other.to_string()),
				"Error authenticating (check service name)",
			),
		};
		errors::authentication(reason, message)
	}
}

impl AuthTokenFactory for GoogleAuthTokenFactory {
	fn auth_token(&self) -> Option<Arc<dyn AuthToken>> {
		self.token.clone()
	}

	fn set_auth_token(&mut self, token: Option<Arc<dyn AuthToken>>) {
		self.credentials = None;
		self.token = token;
	}

	fn handle_session_expired(&mut self, transport: &dyn GDataRequestFactory, expired: Error) -> Result<()> {
		if let Some(credentials) = &self.credentials {
			info!(service = %self.service_name, "session expired, logging in again");
			let token = self.client_login(
				transport,
				&credentials.username,
				&credentials.password,
				None,
				credentials.account_type,
			)?;
			self.set_user_token(token);
			return Ok(());
		}
		match &self.token {
			Some(token) if token.refresh()? => {
				info!(service = %self.service_name, "session expired, refreshed token");
				Ok(())
			},
			_ => Err(expired),
		}
	}

	fn as_google(&mut self) -> Option<&mut GoogleAuthTokenFactory> {
		Some(self)
	}
}

// `key=value` lines; surrounding whitespace is stripped
fn parse_pairs(body: &str) -> HashMap<&str, &str> {
	body.lines()
		.filter_map(|line| {
			let pos = line.find('=')?;
			Some((line[..pos].trim(), line[pos + 1..].trim()))
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::client::testing::{
		MockFactory,
		MockResponse,
	};
	use std::sync::atomic::{
		AtomicUsize,
		Ordering,
	};

	fn factory(login: &str) -> (MockFactory, GoogleAuthTokenFactory) {
		let transport = MockFactory::new();
		transport.push(MockResponse::new(200, "text/plain", login));
		let auth = GoogleAuthTokenFactory::new("cp", "test-app", LoginConfig::default());
		(transport, auth)
	}

	#[test]
	fn client_login_success() {
		let (transport, mut auth) = factory("SID=abc\nLSID=def\nAuth=TOKEN123\n");
		auth.set_user_credentials(&transport, "jo@example.com", "s3cret&=", None, None).unwrap();
		let header = auth.auth_token().unwrap().authorization_header(&Url::parse("http://x/").unwrap(), "GET").unwrap();
		assert_eq!(header, "GoogleLogin auth=TOKEN123");

		let sent = transport.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].method, "POST");
		assert_eq!(sent[0].url.as_str(), "https://www.google.com/accounts/ClientLogin");
		assert_eq!(
			String::from_utf8(sent[0].body.clone()).unwrap(),
			"Email=jo%40example.com&Passwd=s3cret%26%3D&source=test-app&service=cp&accountType=HOSTED_OR_GOOGLE"
		);
	}

	#[test]
	fn client_login_errors() {
		let (transport, auth) = factory("Error=BadAuthentication\n");
		match auth.client_login(&transport, "a", "b", None, AccountType::Google) {
			Err(Error::Authentication(e)) => assert_eq!(e.reason, AuthFailure::InvalidCredentials),
			other => panic!("unexpected result: {:?}", other),
		}

		let (transport, auth) = factory("Error=CaptchaRequired\nCaptchaToken=ct\nCaptchaUrl=Captcha?ctoken=x\n");
		match auth.client_login(&transport, "a", "b", None, AccountType::Google) {
			Err(Error::Authentication(e)) => assert_eq!(e.reason, AuthFailure::CaptchaRequired {
				url: "https://www.google.com/accounts/Captcha?ctoken=x".to_string(),
				token: "ct".to_string(),
			}),
			other => panic!("unexpected result: {:?}", other),
		}

		let (transport, auth) = factory("Error=Weird\n");
		match auth.client_login(&transport, "a", "b", None, AccountType::Google) {
			Err(Error::Authentication(e)) => assert_eq!(e.reason, AuthFailure::Other("Weird".into())),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn captcha_answer_is_sent() {
		let (transport, auth) = factory("Auth=T\n");
		let captcha = CaptchaAnswer {
			token: "ct".into(),
			answer: "hello".into(),
		};
		auth.client_login(&transport, "a", "b", Some(&captcha), AccountType::Hosted).unwrap();
		let body = String::from_utf8(transport.sent()[0].body.clone()).unwrap();
		assert!(body.ends_with("accountType=HOSTED&logintoken=ct&logincaptcha=hello"));
	}

	struct FixedSigner;

	impl RequestSigner for FixedSigner {
		fn algorithm(&self) -> &str {
			"rsa-sha1"
		}

		fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
			Ok(data.iter().rev().copied().collect())
		}
	}

	#[test]
	fn auth_sub_headers() {
		let url = Url::parse("http://x/feed").unwrap();
		let plain = AuthSubToken::new("tok", None);
		assert_eq!(plain.authorization_header(&url, "GET").unwrap(), "AuthSub token=\"tok\"");

		let signed = AuthSubToken::new("tok", Some(Arc::new(FixedSigner)));
		let header = signed.signed_header(&FixedSigner, &url, "GET", 1300000000, 42).unwrap();
		let signature = base64::engine::general_purpose::STANDARD.encode("24 0000000031 deef/x//:ptth TEG");
		assert_eq!(
			header,
			format!(
				"AuthSub token=\"tok\" data=\"GET http://x/feed 1300000000 42\" sig=\"{}\" sigalg=\"rsa-sha1\"",
				signature
			)
		);
		assert!(signed.authorization_header(&url, "PUT").unwrap().contains("data=\"PUT http://x/feed "));
	}

	struct Credential {
		refreshes: AtomicUsize,
		refreshable: bool,
	}

	impl OAuth2Credential for Credential {
		fn access_token(&self) -> Result<String> {
			Ok(format!("access-{}", self.refreshes.load(Ordering::SeqCst)))
		}

		fn refresh_token(&self) -> Result<bool> {
			self.refreshes.fetch_add(1, Ordering::SeqCst);
			Ok(self.refreshable)
		}
	}

	fn expired() -> Error {
		errors::authentication(AuthFailure::SessionExpired, "Token expired")
	}

	#[test]
	fn session_expiry_refreshes_oauth2() {
		let transport = MockFactory::new();
		let mut auth = GoogleAuthTokenFactory::new("cp", "test-app", LoginConfig::default());
		let credential = Arc::new(Credential {
			refreshes: AtomicUsize::new(0),
			refreshable: true,
		});
		auth.set_oauth2_credentials(credential.clone());
		let url = Url::parse("http://x/").unwrap();
		let token = auth.auth_token().unwrap();
		assert!(token.expires_on_unauthorized());
		assert_eq!(token.authorization_header(&url, "GET").unwrap(), "Bearer access-0");
		auth.handle_session_expired(&transport, expired()).unwrap();
		assert_eq!(auth.auth_token().unwrap().authorization_header(&url, "GET").unwrap(), "Bearer access-1");

		auth.set_oauth2_credentials(Arc::new(Credential {
			refreshes: AtomicUsize::new(0),
			refreshable: false,
		}));
		assert!(auth.handle_session_expired(&transport, expired()).unwrap_err().is_session_expired());
	}

	#[test]
	fn session_expiry_logs_in_again() {
		let (transport, mut auth) = factory("Auth=FIRST\n");
		auth.set_user_credentials(&transport, "a", "b", None, None).unwrap();
		transport.push(MockResponse::new(200, "text/plain", "Auth=SECOND\n"));
		auth.handle_session_expired(&transport, expired()).unwrap();
		let url = Url::parse("http://x/").unwrap();
		assert_eq!(auth.auth_token().unwrap().authorization_header(&url, "GET").unwrap(), "GoogleLogin auth=SECOND");

		// a plain token can't be renewed
		auth.set_auth_token(Some(Arc::new(UserToken::new("t"))));
		assert!(auth.handle_session_expired(&transport, expired()).is_err());
	}
}
