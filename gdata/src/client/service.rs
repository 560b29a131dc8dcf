//! GData protocol verbs on top of a transport

use crate::{
	client::{
		request::read_response,
		ContentType,
		GDataRequest,
		GDataRequestFactory,
		Query,
		RequestType,
		ServiceConfig,
		Timeout,
	},
	data::{
		batch,
		generate_entry,
		generate_feed,
		media::{
			multipart_content_type,
			multipart_related,
			MediaSource,
		},
		parse_entry,
		parse_feed,
		EntryType,
		Feed,
	},
	errors::{
		self,
		AuthFailure,
		BatchInterruptedError,
		ResponseInfo,
	},
	extension::{
		ExtensionProfile,
		Kind,
	},
	Error,
	Result,
};
use chrono::{
	DateTime,
	Utc,
};
use parking_lot::{
	RwLock,
	RwLockReadGuard,
	RwLockWriteGuard,
};
use std::{
	fmt,
	io::Write,
	sync::Arc,
};
use tracing::{
	debug,
	trace,
};
use url::Url;

/// Condition for conditional retrieval
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
	/// Only if modified after the date (`If-Modified-Since`)
	IfModifiedSince(DateTime<Utc>),
	/// Only if the current etag differs (`If-None-Match`)
	IfNoneMatch(String),
}

impl Precondition {
	fn apply(&self, request: &mut dyn GDataRequest) {
		match self {
			Self::IfModifiedSince(date) => {
				trace!(%date, "If-Modified-Since");
				request.set_if_modified_since(*date);
			},
			Self::IfNoneMatch(etag) => set_header(request, "If-None-Match", etag),
		}
	}
}

/// Intercepts requests of a [`Service`]
///
/// Used to attach credentials and cookies, and to record cookies from responses.
pub trait RequestHook: Send + Sync {
	/// Called after a request was created
	fn prepare(&self, request: &mut dyn GDataRequest) -> Result<()>;

	/// Called after a request was executed (before the status is checked)
	fn response(&self, _request: &dyn GDataRequest) {}

	/// Whether a `401 Unauthorized` response means the session expired
	fn session_expired(&self, response: &ResponseInfo) -> bool {
		token_expired(response)
	}
}

/// Whether the body of a `401` response reports an expired token
pub fn token_expired(response: &ResponseInfo) -> bool {
	response.body.contains("Token expired")
}

fn set_header(request: &mut dyn GDataRequest, name: &str, value: &str) {
	trace!(name, value, "setting header");
	request.set_header(name, value);
}

/// Client for a GData service
///
/// Entry and feed types are declared in the extension profile on first use.
pub struct Service {
	factory: Box<dyn GDataRequestFactory>,
	profile: RwLock<ExtensionProfile>,
	content_type: ContentType,
	connect_timeout: Option<Timeout>,
	read_timeout: Option<Timeout>,
	hook: Option<Arc<dyn RequestHook>>,
}

impl Service {
	/// Service with default settings
	pub fn new(factory: impl GDataRequestFactory + 'static) -> Self {
		Self {
			factory: Box::new(factory),
			profile: RwLock::new(ExtensionProfile::new()),
			content_type: ContentType::atom(),
			connect_timeout: None,
			read_timeout: None,
			hook: None,
		}
	}

	/// Service configured by `config`
	pub fn with_config(mut factory: impl GDataRequestFactory + 'static, config: &ServiceConfig) -> Result<Self> {
		factory.set_header("User-Agent", &config.user_agent());
		if let Some(version) = &config.protocol_version {
			factory.set_header("GData-Version", version);
		}
		let mut service = Self::new(factory);
		service.connect_timeout = config.connect_timeout()?;
		service.read_timeout = config.read_timeout()?;
		{
			let profile = service.profile.get_mut();
			profile.set_strict_validation(config.strict_validation);
			profile.set_arbitrary_xml(config.arbitrary_xml);
		}
		Ok(service)
	}

	pub(crate) fn factory(&self) -> &dyn GDataRequestFactory {
		&*self.factory
	}

	/// Set header sent with all requests created afterwards
	pub fn set_header(&mut self, name: &str, value: &str) {
		self.factory.set_header(name, value);
	}

	/// Set header (whose value isn't logged) sent with all requests created afterwards
	pub fn set_private_header(&mut self, name: &str, value: &str) {
		self.factory.set_private_header(name, value);
	}

	/// Set hook called for every request
	pub fn set_hook(&mut self, hook: Option<Arc<dyn RequestHook>>) {
		self.hook = hook;
	}

	/// The extension profile
	pub fn profile(&self) -> RwLockReadGuard<'_, ExtensionProfile> {
		self.profile.read()
	}

	/// Modify the extension profile
	pub fn profile_mut(&self) -> RwLockWriteGuard<'_, ExtensionProfile> {
		self.profile.write()
	}

	/// Declare the extensions of a feed, entry or other container type
	pub fn declare<C: Kind>(&self) {
		if !self.profile.read().is_declared::<C>() {
			self.profile.write().add_declarations::<C>();
		}
	}

	/// Content type of entries sent to the service
	pub fn content_type(&self) -> &ContentType {
		&self.content_type
	}

	/// Change content type of entries sent to the service
	pub fn set_content_type(&mut self, content_type: ContentType) {
		self.content_type = content_type;
	}

	/// Set connect timeout for requests
	pub fn set_connect_timeout(&mut self, timeout: Timeout) {
		self.connect_timeout = Some(timeout);
	}

	/// Set read timeout for requests
	pub fn set_read_timeout(&mut self, timeout: Timeout) {
		self.read_timeout = Some(timeout);
	}

	/// Create a request with timeouts and hook applied
	pub fn create_request(
		&self,
		request_type: RequestType,
		url: &Url,
		content_type: &ContentType,
	) -> Result<Box<dyn GDataRequest>> {
		let mut request = self.factory.request(request_type, url, content_type)?;
		if let Some(timeout) = self.connect_timeout {
			request.set_connect_timeout(timeout);
		}
		if let Some(timeout) = self.read_timeout {
			request.set_read_timeout(timeout);
		}
		if let Some(hook) = &self.hook {
			hook.prepare(&mut *request)?;
		}
		Ok(request)
	}

	/// Execute request; responses with status 300 or above become errors
	pub fn execute(&self, request: &mut dyn GDataRequest) -> Result<()> {
		request.execute()?;
		let status = request.response_status();
		debug!(method = %request.request_type(), url = %request.url(), status, "executed request");
		if let Some(hook) = &self.hook {
			hook.response(&*request);
		}
		if status < 300 {
			return Ok(());
		}
		Err(self.status_error(request))
	}

	fn status_error(&self, request: &mut dyn GDataRequest) -> Error {
		let status = request.response_status();
		if let 301 | 302 | 303 | 307 = status {
			if let Some(location) = request.response_header("Location") {
				return Error::RedirectRequired { location };
			}
		}
		let content_type = request.response_header("Content-Type");
		let body = match read_response(request) {
			Ok(body) => String::from_utf8_lossy(&body).into_owned(),
			Err(error) => {
				debug!(%error, "failed reading error response");
				String::new()
			},
		};
		let info = ResponseInfo {
			status,
			content_type,
			body,
		};
		match status {
			304 => Error::NotModified(info),
			400 => Error::InvalidEntry(info),
			401 => {
				let expired = match &self.hook {
					Some(hook) => hook.session_expired(&info),
					None => token_expired(&info),
				};
				let reason = if expired { AuthFailure::SessionExpired } else { AuthFailure::Unauthorized };
				errors::authentication(reason, info.body)
			},
			403 => Error::Forbidden(info),
			404 => Error::ResourceNotFound(info),
			409 => Error::VersionConflict(info),
			412 => Error::PreconditionFailed(info),
			501 => Error::NotImplemented(info),
			_ => Error::Service(info),
		}
	}

	// a body is only parsed if it claims to be XML (or doesn't claim anything)
	fn read_xml(&self, request: &mut dyn GDataRequest) -> Result<Vec<u8>> {
		if let Some(value) = request.response_header("Content-Type") {
			let is_xml = value.parse::<ContentType>().map_or(false, |ct| ct.is_xml());
			if !is_xml {
				return Err(Error::InvalidContentType { content_type: value });
			}
		}
		read_response(request)
	}

	fn send(&self, request_type: RequestType, url: &Url, content_type: &ContentType, body: &[u8]) -> Result<Vec<u8>> {
		let mut request = self.create_request(request_type, url, content_type)?;
		request.request_stream()?.write_all(body)?;
		self.execute(&mut *request)?;
		self.read_xml(&mut *request)
	}

	fn send_entry<E: EntryType>(
		&self,
		request_type: RequestType,
		url: &Url,
		entry: &E,
		etag: Option<&str>,
	) -> Result<Vec<u8>> {
		let xml = generate_entry(entry, &self.profile.read())?;
		let mut request = self.create_request(request_type, url, &self.content_type)?;
		if let Some(etag) = etag {
			set_header(&mut *request, "If-Match", etag);
		}
		request.request_stream()?.write_all(xml.as_bytes())?;
		self.execute(&mut *request)?;
		self.read_xml(&mut *request)
	}

	fn send_multipart<E: EntryType>(
		&self,
		request_type: RequestType,
		url: &Url,
		entry: &E,
		media: &MediaSource,
	) -> Result<Vec<u8>> {
		let xml = generate_entry(entry, &self.profile.read())?;
		let body = multipart_related(&self.content_type.to_string(), xml.as_bytes(), media);
		let content_type: ContentType = multipart_content_type().parse()?;
		let mut request = self.create_request(request_type, url, &content_type)?;
		if let Some(slug) = media.slug() {
			set_header(&mut *request, "Slug", &slug);
		}
		if let Some(etag) = &entry.entry().etag {
			if request_type == RequestType::Update {
				set_header(&mut *request, "If-Match", etag);
			}
		}
		request.request_stream()?.write_all(&body)?;
		self.execute(&mut *request)?;
		self.read_xml(&mut *request)
	}

	fn send_media(&self, request_type: RequestType, url: &Url, media: &MediaSource) -> Result<Vec<u8>> {
		let content_type = ContentType::new(media.content_type.clone());
		let mut request = self.create_request(request_type, url, &content_type)?;
		if let Some(slug) = media.slug() {
			set_header(&mut *request, "Slug", &slug);
		}
		request.request_stream()?.write_all(&media.data)?;
		self.execute(&mut *request)?;
		self.read_xml(&mut *request)
	}

	fn parse_entry_response<E: EntryType>(&self, body: &[u8], url: &Url) -> Result<E> {
		let mut entry: E = parse_entry(body, &self.profile.read())?;
		entry.entry_mut().source_url = Some(url.clone());
		Ok(entry)
	}

	fn parse_feed_response<E: EntryType>(&self, body: &[u8], url: &Url) -> Result<Feed<E>> {
		let mut feed: Feed<E> = parse_feed(body, &self.profile.read())?;
		for entry in &mut feed.entries {
			entry.entry_mut().source_url = Some(url.clone());
		}
		feed.source_url = Some(url.clone());
		Ok(feed)
	}

	fn query_request(&self, url: &Url, precondition: Option<&Precondition>) -> Result<Vec<u8>> {
		let mut request = self.create_request(RequestType::Query, url, &self.content_type)?;
		if let Some(precondition) = precondition {
			precondition.apply(&mut *request);
		}
		self.execute(&mut *request)?;
		self.read_xml(&mut *request)
	}

	/// Retrieve a feed
	///
	/// Fails with `Error::NotModified` if the precondition didn't match.
	pub fn get_feed<E: EntryType>(&self, url: &Url, precondition: Option<&Precondition>) -> Result<Feed<E>> {
		self.declare::<Feed<E>>();
		let body = self.query_request(url, precondition)?;
		self.parse_feed_response(&body, url)
	}

	/// Retrieve the feed a query selects
	pub fn query<E: EntryType>(&self, query: &Query, precondition: Option<&Precondition>) -> Result<Feed<E>> {
		self.get_feed(&query.url()?, precondition)
	}

	/// Retrieve an entry
	pub fn get_entry<E: EntryType>(&self, url: &Url, precondition: Option<&Precondition>) -> Result<E> {
		self.declare::<E>();
		let body = self.query_request(url, precondition)?;
		self.parse_entry_response(&body, url)
	}

	/// Insert an entry into a feed; returns the entry as stored by the service
	///
	/// If the entry has a media source, metadata and media are sent together as
	/// `multipart/related` body.
	pub fn insert<E: EntryType>(&self, feed_url: &Url, entry: &E) -> Result<E> {
		self.declare::<E>();
		let body = match &entry.entry().media {
			Some(media) => self.send_multipart(RequestType::Insert, feed_url, entry, media)?,
			None => self.send_entry(RequestType::Insert, feed_url, entry, None)?,
		};
		self.parse_entry_response(&body, feed_url)
	}

	/// Upload media into a feed; returns the media entry the service created
	pub fn insert_media<E: EntryType>(&self, feed_url: &Url, media: &MediaSource) -> Result<E> {
		self.declare::<E>();
		let body = self.send_media(RequestType::Insert, feed_url, media)?;
		self.parse_entry_response(&body, feed_url)
	}

	/// Replace an entry (usually at its edit link)
	///
	/// The entry etag is sent as `If-Match`.
	pub fn update<E: EntryType>(&self, url: &Url, entry: &E) -> Result<E> {
		self.declare::<E>();
		let body = self.send_entry(RequestType::Update, url, entry, entry.entry().etag.as_deref())?;
		self.parse_entry_response(&body, url)
	}

	/// Replace metadata and media of a media entry (usually at its media edit link)
	///
	/// Without a media source on the entry this is the same as `update`.
	pub fn update_media<E: EntryType>(&self, url: &Url, entry: &E) -> Result<E> {
		match &entry.entry().media {
			Some(media) => {
				self.declare::<E>();
				let body = self.send_multipart(RequestType::Update, url, entry, media)?;
				self.parse_entry_response(&body, url)
			},
			None => self.update(url, entry),
		}
	}

	/// Replace only the media of a media entry
	pub fn update_media_source<E: EntryType>(&self, url: &Url, media: &MediaSource) -> Result<E> {
		self.declare::<E>();
		let body = self.send_media(RequestType::Update, url, media)?;
		self.parse_entry_response(&body, url)
	}

	/// Download media (the `src` of out-of-line content or a media link)
	///
	/// The body is returned as is, typed with the response content type
	/// (`application/octet-stream` if the service didn't send one).
	pub fn get_media(&self, url: &Url, precondition: Option<&Precondition>) -> Result<MediaSource> {
		let mut request = self.create_request(RequestType::Query, url, &self.content_type)?;
		if let Some(precondition) = precondition {
			precondition.apply(&mut *request);
		}
		self.execute(&mut *request)?;
		let content_type = request
			.response_content_type()
			.map_or(mime::APPLICATION_OCTET_STREAM, |ct| ct.mime().clone());
		let data = read_response(&mut *request)?;
		Ok(MediaSource::new(content_type, data))
	}

	/// Delete an entry; with an etag only if it still matches
	pub fn delete(&self, url: &Url, etag: Option<&str>) -> Result<()> {
		let mut request = self.create_request(RequestType::Delete, url, &self.content_type)?;
		if let Some(etag) = etag {
			set_header(&mut *request, "If-Match", etag);
		}
		self.execute(&mut *request)
	}

	/// Execute a batch feed
	///
	/// The result feed contains one entry per processed input entry, each with its own
	/// `batch:status`; failed operations are not reported as error.  If the last result entry
	/// carries `batch:interrupted` the batch was aborted and `Error::BatchInterrupted` is
	/// returned.
	pub fn batch<E: EntryType>(&self, url: &Url, feed: &Feed<E>) -> Result<Feed<E>> {
		self.declare::<Feed<E>>();
		let xml = generate_feed(feed, &self.profile.read())?;
		let body = self.send(RequestType::Batch, url, &self.content_type, xml.as_bytes())?;
		let result: Feed<E> = self.parse_feed_response(&body, url)?;
		let interrupted = result
			.entries
			.last()
			.and_then(|entry| batch::interrupted(entry.entry()))
			.cloned();
		match interrupted {
			Some(interrupted) => {
				let position = result.entries.len() - 1;
				debug!(%url, position, reason = ?interrupted.reason, "batch interrupted");
				Err(Error::BatchInterrupted(Box::new(BatchInterruptedError::new(position, interrupted, result))))
			},
			None => Ok(result),
		}
	}
}

impl fmt::Debug for Service {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Service")
			.field("content_type", &self.content_type)
			.field("connect_timeout", &self.connect_timeout)
			.field("read_timeout", &self.read_timeout)
			.finish()
	}
}
