//! Google services: credentials, cookies and the retry policy

use crate::{
	client::{
		auth::{
			AccountType,
			AuthToken,
			AuthTokenFactory,
			CaptchaAnswer,
			GoogleAuthTokenFactory,
			OAuth2Credential,
			OAuthSigner,
			RequestSigner,
			UserToken,
		},
		cookie::{
			CookieStore,
			GoogleCookie,
		},
		service::{
			token_expired,
			Precondition,
			RequestHook,
			Service,
		},
		GDataRequest,
		GDataRequestFactory,
		LoginConfig,
		Query,
		ServiceConfig,
	},
	data::{
		media::MediaSource,
		EntryType,
		Feed,
	},
	errors::{
		self,
		ResponseInfo,
	},
	Error,
	Result,
};
use parking_lot::RwLock;
use std::{
	fmt,
	sync::{
		atomic::{
			AtomicBool,
			Ordering,
		},
		Arc,
	},
};
use tracing::{
	info,
	trace,
};
use url::Url;

struct GoogleSession {
	auth: RwLock<Box<dyn AuthTokenFactory>>,
	cookies: CookieStore,
	handle_cookies: AtomicBool,
}

impl GoogleSession {
	fn handles_cookies(&self) -> bool {
		self.handle_cookies.load(Ordering::Relaxed)
	}
}

impl RequestHook for GoogleSession {
	fn prepare(&self, request: &mut dyn GDataRequest) -> Result<()> {
		let token = self.auth.read().auth_token();
		if let Some(token) = token {
			let header = token.authorization_header(request.url(), request.request_type().method())?;
			trace!(name = "Authorization", value = "<not logged>", "setting header");
			request.set_private_header("Authorization", &header);
		}
		if self.handles_cookies() {
			if let Some(cookies) = self.cookies.cookie_header(request.url()) {
				trace!(name = "Cookie", value = %cookies, "setting header");
				request.set_header("Cookie", &cookies);
			}
		}
		Ok(())
	}

	fn response(&self, request: &dyn GDataRequest) {
		if self.handles_cookies() {
			self.cookies.add_headers(request.url(), &request.response_headers("Set-Cookie"));
		}
	}

	fn session_expired(&self, response: &ResponseInfo) -> bool {
		if token_expired(response) {
			return true;
		}
		self.auth.read().auth_token().map_or(false, |token| token.expires_on_unauthorized())
	}
}

/// Client for a Google service
///
/// Adds authentication and cookie handling to [`Service`].  Every operation is attempted once
/// more if the service redirects (at the new location) or reports an expired session (after
/// authenticating again); a failure of the retried call is returned as is.
pub struct GoogleService {
	service: Service,
	session: Arc<GoogleSession>,
}

impl GoogleService {
	/// Client for the named service (e.g. `cl` for calendar); authenticates with ClientLogin
	/// at www.google.com
	pub fn new(service_name: &str, factory: impl GDataRequestFactory + 'static) -> Result<Self> {
		Self::with_config(service_name, factory, &ServiceConfig::default())
	}

	/// Client configured by `config`
	pub fn with_config(
		service_name: &str,
		factory: impl GDataRequestFactory + 'static,
		config: &ServiceConfig,
	) -> Result<Self> {
		let auth = GoogleAuthTokenFactory::new(service_name, config.application_name.clone(), config.login.clone());
		let mut service = Service::with_config(factory, config)?;
		let session = Arc::new(GoogleSession {
			auth: RwLock::new(Box::new(auth)),
			cookies: CookieStore::new(),
			handle_cookies: AtomicBool::new(config.handle_cookies),
		});
		let hook: Arc<dyn RequestHook> = session.clone();
		service.set_hook(Some(hook));
		Ok(Self { service, session })
	}

	/// Client with default ClientLogin settings but another login host
	pub fn with_login(service_name: &str, factory: impl GDataRequestFactory + 'static, login: LoginConfig) -> Result<Self> {
		let config = ServiceConfig {
			login,
			..ServiceConfig::default()
		};
		Self::with_config(service_name, factory, &config)
	}

	/// The underlying protocol client
	pub fn service(&self) -> &Service {
		&self.service
	}

	/// Modify the underlying protocol client
	pub fn service_mut(&mut self) -> &mut Service {
		&mut self.service
	}

	/// Replace the token factory (for other authentication schemes)
	pub fn set_auth_token_factory(&mut self, factory: Box<dyn AuthTokenFactory>) {
		*self.session.auth.write() = factory;
		self.session.cookies.clear();
	}

	/// Current token
	pub fn auth_token(&self) -> Option<Arc<dyn AuthToken>> {
		self.session.auth.read().auth_token()
	}

	/// Replace the token
	pub fn set_auth_token(&mut self, token: Option<Arc<dyn AuthToken>>) {
		self.session.auth.write().set_auth_token(token);
		self.session.cookies.clear();
	}

	fn with_google_auth<F>(&mut self, f: F) -> Result<()>
	where
		F: FnOnce(&mut GoogleAuthTokenFactory, &dyn GDataRequestFactory) -> Result<()>,
	{
		let mut auth = self.session.auth.write();
		let google = auth
			.as_google()
			.ok_or_else(|| errors::invalid_state("token factory doesn't support Google credentials"))?;
		let result = f(google, self.service.factory());
		drop(auth);
		self.session.cookies.clear();
		result
	}

	/// Log in with user name and password (ClientLogin)
	///
	/// The credentials are kept to log in again when the session expires.
	pub fn set_user_credentials(&mut self, username: &str, password: &str) -> Result<()> {
		self.with_google_auth(|auth, transport| auth.set_user_credentials(transport, username, password, None, None))
	}

	/// Log in with user name, password, an answered CAPTCHA challenge and account type
	pub fn set_user_credentials_with(
		&mut self,
		username: &str,
		password: &str,
		captcha: Option<&CaptchaAnswer>,
		account_type: Option<AccountType>,
	) -> Result<()> {
		self.with_google_auth(|auth, transport| {
			auth.set_user_credentials(transport, username, password, captcha, account_type)
		})
	}

	/// Use a ClientLogin token obtained elsewhere
	pub fn set_user_token(&mut self, token: &str) {
		self.set_auth_token(Some(Arc::new(UserToken::new(token))));
	}

	/// Use an AuthSub token (signed if `signer` is set)
	pub fn set_auth_sub_token(&mut self, token: &str, signer: Option<Arc<dyn RequestSigner>>) -> Result<()> {
		self.with_google_auth(|auth, _| {
			auth.set_auth_sub_token(token, signer);
			Ok(())
		})
	}

	/// Use OAuth 1.0 credentials
	pub fn set_oauth_credentials(&mut self, signer: Arc<dyn OAuthSigner>) -> Result<()> {
		self.with_google_auth(|auth, _| {
			auth.set_oauth_credentials(signer);
			Ok(())
		})
	}

	/// Use an OAuth 2.0 credential
	pub fn set_oauth2_credentials(&mut self, credential: Arc<dyn OAuth2Credential>) -> Result<()> {
		self.with_google_auth(|auth, _| {
			auth.set_oauth2_credentials(credential);
			Ok(())
		})
	}

	/// Whether cookies are stored and sent
	pub fn handles_cookies(&self) -> bool {
		self.session.handles_cookies()
	}

	/// Enable or disable cookie handling; disabling drops stored cookies
	pub fn set_handle_cookies(&mut self, handle: bool) {
		self.session.handle_cookies.store(handle, Ordering::Relaxed);
		if !handle {
			self.session.cookies.clear();
		}
	}

	/// Stored cookies (expired ones are evicted first)
	pub fn cookies(&self) -> Vec<GoogleCookie> {
		self.session.cookies.cookies()
	}

	/// Store a cookie
	pub fn add_cookie(&self, cookie: GoogleCookie) {
		self.session.cookies.add(cookie);
	}

	fn with_retry<T, F>(&self, url: &Url, call: F) -> Result<T>
	where
		F: Fn(&Url) -> Result<T>,
	{
		match call(url) {
			Err(Error::RedirectRequired { location }) => {
				let target = url.join(&location)?;
				info!(from = %url, to = %target, "following redirect");
				call(&target)
			},
			Err(error) if error.is_session_expired() => {
				info!(%url, "session expired, authenticating again");
				self.session.auth.write().handle_session_expired(self.service.factory(), error)?;
				call(url)
			},
			result => result,
		}
	}

	/// Retrieve a feed (see [`Service::get_feed`])
	pub fn get_feed<E: EntryType>(&self, url: &Url, precondition: Option<&Precondition>) -> Result<Feed<E>> {
		self.with_retry(url, |url| self.service.get_feed(url, precondition))
	}

	/// Retrieve the feed a query selects
	pub fn query<E: EntryType>(&self, query: &Query, precondition: Option<&Precondition>) -> Result<Feed<E>> {
		self.get_feed(&query.url()?, precondition)
	}

	/// Retrieve an entry (see [`Service::get_entry`])
	pub fn get_entry<E: EntryType>(&self, url: &Url, precondition: Option<&Precondition>) -> Result<E> {
		self.with_retry(url, |url| self.service.get_entry(url, precondition))
	}

	/// Download media (see [`Service::get_media`])
	pub fn get_media(&self, url: &Url, precondition: Option<&Precondition>) -> Result<MediaSource> {
		self.with_retry(url, |url| self.service.get_media(url, precondition))
	}

	/// Insert an entry (see [`Service::insert`])
	pub fn insert<E: EntryType>(&self, feed_url: &Url, entry: &E) -> Result<E> {
		self.with_retry(feed_url, |url| self.service.insert(url, entry))
	}

	/// Upload media (see [`Service::insert_media`])
	pub fn insert_media<E: EntryType>(&self, feed_url: &Url, media: &MediaSource) -> Result<E> {
		self.with_retry(feed_url, |url| self.service.insert_media(url, media))
	}

	/// Replace an entry (see [`Service::update`])
	pub fn update<E: EntryType>(&self, url: &Url, entry: &E) -> Result<E> {
		self.with_retry(url, |url| self.service.update(url, entry))
	}

	/// Replace metadata and media (see [`Service::update_media`])
	pub fn update_media<E: EntryType>(&self, url: &Url, entry: &E) -> Result<E> {
		self.with_retry(url, |url| self.service.update_media(url, entry))
	}

	/// Replace media (see [`Service::update_media_source`])
	pub fn update_media_source<E: EntryType>(&self, url: &Url, media: &MediaSource) -> Result<E> {
		self.with_retry(url, |url| self.service.update_media_source(url, media))
	}

	/// Delete an entry (see [`Service::delete`])
	pub fn delete(&self, url: &Url, etag: Option<&str>) -> Result<()> {
		self.with_retry(url, |url| self.service.delete(url, etag))
	}

	/// Execute a batch feed (see [`Service::batch`])
	pub fn batch<E: EntryType>(&self, url: &Url, feed: &Feed<E>) -> Result<Feed<E>> {
		self.with_retry(url, |url| self.service.batch(url, feed))
	}
}

impl fmt::Debug for GoogleService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GoogleService")
			.field("service", &self.service)
			.field("cookies", &self.session.cookies)
			.finish()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		client::testing::{
			MockFactory,
			MockResponse,
		},
		data::Entry,
		errors::AuthFailure,
	};
	use std::sync::atomic::AtomicUsize;

	const ENTRY: &str = r#"<entry xmlns="http://www.w3.org/2005/Atom"><id>http://x/1</id></entry>"#;

	fn url(s: &str) -> Url {
		Url::parse(s).unwrap()
	}

	fn service() -> (MockFactory, GoogleService) {
		let transport = MockFactory::new();
		let service = GoogleService::new("cp", transport.clone()).unwrap();
		(transport, service)
	}

	fn urls(transport: &MockFactory) -> Vec<String> {
		transport.sent().iter().map(|r| r.url.to_string()).collect()
	}

	#[test]
	fn redirect_is_followed_once() {
		let (transport, service) = service();
		transport.push(MockResponse::redirect("http://b/feed"));
		transport.push(MockResponse::atom(ENTRY));
		let entry: Entry = service.get_entry(&url("http://a/feed"), None).unwrap();
		assert_eq!(entry.source_url, Some(url("http://b/feed")));
		assert_eq!(urls(&transport), vec!["http://a/feed", "http://b/feed"]);
	}

	#[test]
	fn media_download_follows_redirect() {
		let (transport, service) = service();
		transport.push(MockResponse::redirect("http://cdn/media/1"));
		transport.push(MockResponse::new(200, "image/jpeg", &b"JPEG"[..]));
		let media = service.get_media(&url("http://a/media/1"), None).unwrap();
		assert_eq!(media.content_type, mime::IMAGE_JPEG);
		assert_eq!(media.data, b"JPEG".to_vec());
		assert_eq!(urls(&transport), vec!["http://a/media/1", "http://cdn/media/1"]);
	}

	#[test]
	fn second_redirect_propagates() {
		let (transport, service) = service();
		transport.push(MockResponse::redirect("http://b/feed"));
		transport.push(MockResponse::redirect("http://c/feed"));
		transport.push(MockResponse::atom(ENTRY));
		match service.get_entry::<Entry>(&url("http://a/feed"), None) {
			Err(Error::RedirectRequired { location }) => assert_eq!(location, "http://c/feed"),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(urls(&transport), vec!["http://a/feed", "http://b/feed"]);
		assert_eq!(transport.pending(), 1);
	}

	#[test]
	fn relative_redirect_resolved_against_request() {
		let (transport, service) = service();
		transport.push(MockResponse::redirect("/other/1?gsessionid=x"));
		transport.push(MockResponse::new(200, "", ""));
		service.delete(&url("http://a/feed/1"), None).unwrap();
		assert_eq!(urls(&transport), vec!["http://a/feed/1", "http://a/other/1?gsessionid=x"]);
	}

	#[test]
	fn expired_session_logs_in_again() {
		let (transport, mut service) = service();
		transport.push(MockResponse::new(200, "text/plain", "Auth=ONE\n"));
		service.set_user_credentials("jo@example.com", "secret").unwrap();

		transport.push(MockResponse::new(401, "text/html", "Token expired"));
		transport.push(MockResponse::new(200, "text/plain", "Auth=TWO\n"));
		transport.push(MockResponse::atom(ENTRY));
		let entry: Entry = service.get_entry(&url("http://x/1"), None).unwrap();
		assert_eq!(entry.id.as_deref(), Some("http://x/1"));

		let sent = transport.sent();
		assert_eq!(sent.len(), 4);
		assert_eq!(sent[0].url.path(), "/accounts/ClientLogin");
		assert_eq!(sent[0].header("Authorization"), None);
		assert_eq!(sent[1].header("Authorization"), Some("GoogleLogin auth=ONE"));
		assert_eq!(sent[2].url.path(), "/accounts/ClientLogin");
		assert_eq!(sent[3].header("Authorization"), Some("GoogleLogin auth=TWO"));
	}

	#[test]
	fn expired_session_retried_once() {
		let (transport, mut service) = service();
		transport.push(MockResponse::new(200, "text/plain", "Auth=ONE\n"));
		service.set_user_credentials("jo@example.com", "secret").unwrap();
		transport.push(MockResponse::new(401, "text/html", "Token expired"));
		transport.push(MockResponse::new(200, "text/plain", "Auth=TWO\n"));
		transport.push(MockResponse::new(401, "text/html", "Token expired"));
		transport.push(MockResponse::atom(ENTRY));
		assert!(service.get_entry::<Entry>(&url("http://x/1"), None).unwrap_err().is_session_expired());
		assert_eq!(transport.pending(), 1);
	}

	#[test]
	fn expired_token_without_credentials_propagates() {
		let (transport, mut service) = service();
		service.set_user_token("STATIC");
		transport.push(MockResponse::new(401, "text/html", "Token expired"));
		assert!(service.delete(&url("http://x/1"), None).unwrap_err().is_session_expired());
		assert_eq!(transport.sent().len(), 1);
	}

	#[test]
	fn unauthorized_is_not_retried() {
		let (transport, mut service) = service();
		service.set_user_token("STATIC");
		transport.push(MockResponse::new(401, "text/html", "Denied"));
		match service.delete(&url("http://x/1"), None) {
			Err(Error::Authentication(e)) => assert_eq!(e.reason, AuthFailure::Unauthorized),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(transport.sent().len(), 1);
	}

	struct Credential(AtomicUsize);

	impl OAuth2Credential for Credential {
		fn access_token(&self) -> Result<String> {
			Ok(format!("token{}", self.0.load(Ordering::SeqCst)))
		}

		fn refresh_token(&self) -> Result<bool> {
			self.0.fetch_add(1, Ordering::SeqCst);
			Ok(true)
		}
	}

	#[test]
	fn oauth2_refreshes_on_unauthorized() {
		let (transport, mut service) = service();
		service.set_oauth2_credentials(Arc::new(Credential(AtomicUsize::new(0)))).unwrap();
		transport.push(MockResponse::new(401, "text/plain", "Invalid Credentials"));
		transport.push(MockResponse::new(200, "", ""));
		service.delete(&url("http://x/1"), None).unwrap();
		let sent = transport.sent();
		assert_eq!(sent[0].header("Authorization"), Some("Bearer token0"));
		assert_eq!(sent[1].header("Authorization"), Some("Bearer token1"));
	}

	#[test]
	fn cookies_are_recorded_and_sent() {
		let (transport, mut service) = service();
		transport.push(MockResponse::new(200, "", "").with_header("Set-Cookie", "S=abc; path=/feeds"));
		transport.push(MockResponse::new(200, "", ""));
		transport.push(MockResponse::new(200, "", ""));
		service.delete(&url("http://x/feeds/1"), None).unwrap();
		service.delete(&url("http://x/feeds/2"), None).unwrap();
		service.delete(&url("http://x/other"), None).unwrap();
		let sent = transport.sent();
		assert_eq!(sent[0].header("Cookie"), None);
		assert_eq!(sent[1].header("Cookie"), Some("S=abc"));
		assert_eq!(sent[2].header("Cookie"), None);
		assert_eq!(service.cookies().len(), 1);

		// new principal, no cookies
		service.set_user_token("OTHER");
		assert!(service.cookies().is_empty());

		service.add_cookie(GoogleCookie::parse(&url("http://x/"), "T=1").unwrap());
		service.set_handle_cookies(false);
		assert!(!service.handles_cookies());
		assert!(service.cookies().is_empty());
		transport.push(MockResponse::new(200, "", "").with_header("Set-Cookie", "U=2"));
		service.delete(&url("http://x/feeds/3"), None).unwrap();
		assert!(service.cookies().is_empty());
	}

	struct Fixed;

	impl AuthTokenFactory for Fixed {
		fn auth_token(&self) -> Option<Arc<dyn AuthToken>> {
			Some(Arc::new(UserToken::new("FIXED")))
		}

		fn set_auth_token(&mut self, _token: Option<Arc<dyn AuthToken>>) {}

		fn handle_session_expired(&mut self, _transport: &dyn GDataRequestFactory, expired: Error) -> Result<()> {
			Err(expired)
		}
	}

	#[test]
	fn custom_token_factory() {
		let (transport, mut service) = service();
		service.set_auth_token_factory(Box::new(Fixed));
		assert!(matches!(service.set_user_credentials("a", "b"), Err(Error::InvalidState(_))));
		transport.push(MockResponse::new(200, "", ""));
		service.delete(&url("http://x/1"), None).unwrap();
		assert_eq!(transport.sent()[0].header("Authorization"), Some("GoogleLogin auth=FIXED"));
	}
}
