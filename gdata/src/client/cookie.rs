//! Session cookies set by Google services

use crate::{
	errors,
	Result,
};
use chrono::{
	DateTime,
	NaiveDateTime,
	Utc,
};
use dashmap::DashMap;
use std::fmt;
use tracing::debug;
use url::Url;

const EXPIRES_FORMATS: [&str; 2] = ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d %b %Y %H:%M:%S GMT"];

/// A cookie received in a `Set-Cookie` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoogleCookie {
	name: String,
	value: String,
	domain: String,
	path: String,
	expires: Option<DateTime<Utc>>,
}

impl GoogleCookie {
	/// Parse a `Set-Cookie` header value received from `url`
	///
	/// Domain defaults to the host of `url`, path to `/`.  A domain not covering the host of `url`
	/// is rejected.
	pub fn parse(url: &Url, header: &str) -> Result<Self> {
		let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
		let mut parts = header.split(';');
		let (name, value) = parts
			.next()
			.and_then(|pair| {
				let pos = pair.find('=')?;
				Some((pair[..pos].trim(), pair[pos + 1..].trim()))
			})
			.ok_or_else(|| errors::invalid_argument("Cookie is not a name/value pair"))?;

		let mut cookie = Self {
			name: name.to_string(),
			value: value.to_string(),
			domain: host.clone(),
			path: String::from("/"),
			expires: None,
		};

		for attribute in parts {
			let (key, value) = match attribute.find('=') {
				Some(pos) => (attribute[..pos].trim(), attribute[pos + 1..].trim()),
				None => continue,
			};
			if key.eq_ignore_ascii_case("domain") {
				let mut domain = value.to_ascii_lowercase();
				if url.port().is_some() {
					if let Some(pos) = domain.find(':') {
						domain.truncate(pos);
					}
				}
				if domain != host && !match_domain(&host, &domain) {
					return Err(errors::invalid_argument(format!("Trying to set foreign cookie for {}", domain)));
				}
				cookie.domain = domain;
			} else if key.eq_ignore_ascii_case("path") {
				cookie.path = value.to_string();
			} else if key.eq_ignore_ascii_case("expires") {
				cookie.expires = Some(parse_expires(value)?);
			}
		}
		Ok(cookie)
	}

	/// Cookie name
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Cookie value
	pub fn value(&self) -> &str {
		&self.value
	}

	/// Domain the cookie is sent to
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Path prefix the cookie is sent for
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Expiration date (session cookies have none)
	pub fn expires(&self) -> Option<DateTime<Utc>> {
		self.expires
	}

	/// Whether the cookie expired
	pub fn has_expired(&self) -> bool {
		self.expires.map_or(false, |expires| expires < Utc::now())
	}

	/// Whether the cookie should be sent with a request to `url`
	pub fn matches(&self, url: &Url) -> bool {
		if self.has_expired() {
			return false;
		}
		let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
		if !match_domain(&host, &self.domain) {
			return false;
		}
		let path = match url.path() {
			"" => "/",
			path => path,
		};
		path.starts_with(&self.path)
	}

	/// `name=value` for the `Cookie` header
	pub fn header_value(&self) -> String {
		format!("{}={}", self.name, self.value)
	}

	fn identity(&self) -> CookieId {
		CookieId {
			name: self.name.clone(),
			domain: self.domain.clone(),
			path: self.path.clone(),
		}
	}
}

impl fmt::Display for GoogleCookie {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}={} (domain={}, path={})", self.name, self.value, self.domain, self.path)
	}
}

// `tail` covers `test` if they are equal, or `tail` ends at a label boundary of `test`
fn match_domain(test: &str, tail: &str) -> bool {
	if !test.ends_with(tail) {
		return false;
	}
	if test.len() == tail.len() || tail.starts_with('.') {
		return true;
	}
	test.as_bytes()[test.len() - tail.len() - 1] == b'.'
}

fn parse_expires(value: &str) -> Result<DateTime<Utc>> {
	EXPIRES_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
		.map(|date| date.and_utc())
		.ok_or_else(|| errors::invalid_value("expires", value))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CookieId {
	name: String,
	domain: String,
	path: String,
}

/// Concurrent cookie cache
///
/// Cookies are keyed by name, domain and path; adding a cookie replaces an older one with the
/// same key.  Expired cookies are evicted when the store is read.
#[derive(Default)]
pub struct CookieStore {
	cookies: DashMap<CookieId, GoogleCookie>,
}

impl CookieStore {
	/// Empty store
	pub fn new() -> Self {
		Self::default()
	}

	/// Add (or replace) cookie
	pub fn add(&self, cookie: GoogleCookie) {
		debug!(%cookie, "adding cookie");
		self.cookies.insert(cookie.identity(), cookie);
	}

	/// Parse `Set-Cookie` header values received from `url` and store them
	///
	/// Invalid cookies are skipped.
	pub fn add_headers(&self, url: &Url, headers: &[String]) {
		for header in headers {
			match GoogleCookie::parse(url, header) {
				Ok(cookie) => self.add(cookie),
				Err(error) => debug!(%url, %error, "ignoring cookie"),
			}
		}
	}

	fn evict_expired(&self) {
		self.cookies.retain(|_, cookie| {
			let keep = !cookie.has_expired();
			if !keep {
				debug!(%cookie, "evicting expired cookie");
			}
			keep
		});
	}

	/// All cookies that didn't expire yet
	pub fn cookies(&self) -> Vec<GoogleCookie> {
		self.evict_expired();
		let mut cookies: Vec<_> = self.cookies.iter().map(|entry| entry.value().clone()).collect();
		cookies.sort_by(|a, b| (&a.name, &a.domain, &a.path).cmp(&(&b.name, &b.domain, &b.path)));
		cookies
	}

	/// Value of the `Cookie` header for a request to `url`, if any cookie matches
	pub fn cookie_header(&self, url: &Url) -> Option<String> {
		let pairs: Vec<_> = self
			.cookies()
			.iter()
			.filter(|cookie| cookie.matches(url))
			.map(GoogleCookie::header_value)
			.collect();
		if pairs.is_empty() {
			None
		} else {
			Some(pairs.join("; "))
		}
	}

	/// Remove all cookies
	pub fn clear(&self) {
		self.cookies.clear();
	}

	/// Number of cookies (including expired ones not yet evicted)
	pub fn len(&self) -> usize {
		self.cookies.len()
	}

	/// Whether the store is empty
	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty()
	}
}

impl fmt::Debug for CookieStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CookieStore").field("len", &self.len()).finish()
	}
}
