use crate::{
	client::ContentType,
	errors,
	Result,
};
use chrono::{
	DateTime,
	Utc,
};
use std::{
	fmt,
	io::{
		Read,
		Write,
	},
	time::Duration,
};
use url::Url;

/// Kind of a GData request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestType {
	/// Retrieve a feed or entry
	Query,
	/// Insert a new entry
	Insert,
	/// Replace an existing entry
	Update,
	/// Delete an entry
	Delete,
	/// Execute several operations at once
	Batch,
}

impl RequestType {
	/// HTTP method for the request type
	pub fn method(self) -> &'static str {
		match self {
			Self::Query => "GET",
			Self::Insert | Self::Batch => "POST",
			Self::Update => "PUT",
			Self::Delete => "DELETE",
		}
	}

	/// Whether the request carries a body
	pub fn has_body(self) -> bool {
		matches!(self, Self::Insert | Self::Update | Self::Batch)
	}
}

impl fmt::Display for RequestType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.method())
	}
}

/// Connect or read timeout of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
	/// Wait indefinitely
	Infinite,
	/// Give up after the duration
	After(Duration),
}

impl Timeout {
	/// Timeout from milliseconds: `0` means infinite, negative values are rejected
	pub fn from_millis(millis: i64) -> Result<Self> {
		match millis {
			0 => Ok(Self::Infinite),
			m if m < 0 => Err(errors::invalid_argument(format!("timeout must not be negative: {}", m))),
			m => Ok(Self::After(Duration::from_millis(m as u64))),
		}
	}

	/// Timeout in milliseconds (`0` for infinite)
	pub fn as_millis(self) -> u128 {
		match self {
			Self::Infinite => 0,
			Self::After(duration) => duration.as_millis(),
		}
	}
}

/// A single request to a GData service
///
/// Headers and the body are set up first; `execute` performs the call.  The response is then
/// available through the `response_*` methods.  Status codes are exposed as is; turning them into
/// errors is up to the caller.
pub trait GDataRequest: Send {
	/// Request type
	fn request_type(&self) -> RequestType;

	/// Target URL
	fn url(&self) -> &Url;

	/// Set connect timeout
	fn set_connect_timeout(&mut self, timeout: Timeout);

	/// Set read timeout
	fn set_read_timeout(&mut self, timeout: Timeout);

	/// Only return content modified after the given date (`If-Modified-Since`)
	fn set_if_modified_since(&mut self, date: DateTime<Utc>) {
		self.set_header("If-Modified-Since", &date.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
	}

	/// Set request header
	fn set_header(&mut self, name: &str, value: &str);

	/// Set request header whose value must not be logged (credentials)
	fn set_private_header(&mut self, name: &str, value: &str);

	/// Stream to write the request body to
	fn request_stream(&mut self) -> Result<&mut dyn Write>;

	/// Perform the request
	fn execute(&mut self) -> Result<()>;

	/// HTTP status code of the response
	fn response_status(&self) -> u16;

	/// All values of a response header (names are case-insensitive)
	fn response_headers(&self, name: &str) -> Vec<String>;

	/// First value of a response header
	fn response_header(&self, name: &str) -> Option<String> {
		self.response_headers(name).into_iter().next()
	}

	/// Content type of the response body
	fn response_content_type(&self) -> Option<ContentType> {
		self.response_header("Content-Type").and_then(|value| value.parse().ok())
	}

	/// Stream to read the response body from
	fn response_stream(&mut self) -> Result<Box<dyn Read + '_>>;
}

/// Creates requests; the single seam to the HTTP transport
pub trait GDataRequestFactory: Send + Sync {
	/// Set header added to all requests created afterwards
	fn set_header(&mut self, name: &str, value: &str);

	/// Set header (whose value must not be logged) added to all requests created afterwards
	fn set_private_header(&mut self, name: &str, value: &str);

	/// Create request
	fn request(&self, request_type: RequestType, url: &Url, content_type: &ContentType) -> Result<Box<dyn GDataRequest>>;
}

/// Read the complete response body
pub fn read_response(request: &mut dyn GDataRequest) -> Result<Vec<u8>> {
	let mut body = Vec::new();
	request.response_stream()?.read_to_end(&mut body)?;
	Ok(body)
}
