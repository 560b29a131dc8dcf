//! Scripted in-memory transport

use crate::{
	client::{
		ContentType,
		GDataRequest,
		GDataRequestFactory,
		RequestType,
		Timeout,
	},
	Result,
};
use parking_lot::Mutex;
use std::{
	collections::VecDeque,
	io::{
		self,
		Read,
		Write,
	},
	sync::Arc,
};
use url::Url;

#[derive(Clone, Debug)]
pub struct MockResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl MockResponse {
	pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
		let mut headers = Vec::new();
		if !content_type.is_empty() {
			headers.push(("Content-Type".to_string(), content_type.to_string()));
		}
		Self {
			status,
			headers,
			body: body.into(),
		}
	}

	pub fn atom(body: &str) -> Self {
		Self::new(200, "application/atom+xml; charset=UTF-8", body)
	}

	pub fn redirect(location: &str) -> Self {
		Self::new(302, "", "").with_header("Location", location)
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		self.headers.push((name.to_string(), value.to_string()));
		self
	}
}

#[derive(Clone, Debug)]
pub struct SentRequest {
	pub request_type: RequestType,
	pub method: &'static str,
	pub url: Url,
	pub content_type: String,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl SentRequest {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().rev().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	pub fn body_str(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

#[derive(Default)]
struct Script {
	responses: VecDeque<MockResponse>,
	sent: Vec<SentRequest>,
}

#[derive(Clone, Default)]
pub struct MockFactory {
	script: Arc<Mutex<Script>>,
	headers: Vec<(String, String)>,
}

impl MockFactory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, response: MockResponse) {
		self.script.lock().responses.push_back(response);
	}

	pub fn sent(&self) -> Vec<SentRequest> {
		self.script.lock().sent.clone()
	}

	pub fn pending(&self) -> usize {
		self.script.lock().responses.len()
	}
}

impl GDataRequestFactory for MockFactory {
	fn set_header(&mut self, name: &str, value: &str) {
		self.headers.push((name.to_string(), value.to_string()));
	}

	fn set_private_header(&mut self, name: &str, value: &str) {
		self.set_header(name, value);
	}

	fn request(&self, request_type: RequestType, url: &Url, content_type: &ContentType) -> Result<Box<dyn GDataRequest>> {
		Ok(Box::new(MockRequest {
			script: self.script.clone(),
			sent: SentRequest {
				request_type,
				method: request_type.method(),
				url: url.clone(),
				content_type: content_type.to_string(),
				headers: self.headers.clone(),
				body: Vec::new(),
			},
			response: None,
		}))
	}
}

struct MockRequest {
	script: Arc<Mutex<Script>>,
	sent: SentRequest,
	response: Option<MockResponse>,
}

impl GDataRequest for MockRequest {
	fn request_type(&self) -> RequestType {
		self.sent.request_type
	}

	fn url(&self) -> &Url {
		&self.sent.url
	}

	fn set_connect_timeout(&mut self, timeout: Timeout) {
		self.set_header("X-Connect-Timeout", &timeout.as_millis().to_string());
	}

	fn set_read_timeout(&mut self, timeout: Timeout) {
		self.set_header("X-Read-Timeout", &timeout.as_millis().to_string());
	}

	fn set_header(&mut self, name: &str, value: &str) {
		self.sent.headers.push((name.to_string(), value.to_string()));
	}

	fn set_private_header(&mut self, name: &str, value: &str) {
		self.set_header(name, value);
	}

	fn request_stream(&mut self) -> Result<&mut dyn Write> {
		Ok(&mut self.sent.body)
	}

	fn execute(&mut self) -> Result<()> {
		let mut script = self.script.lock();
		script.sent.push(self.sent.clone());
		match script.responses.pop_front() {
			Some(response) => {
				self.response = Some(response);
				Ok(())
			},
			None => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "no scripted response").into()),
		}
	}

	fn response_status(&self) -> u16 {
		self.response.as_ref().map_or(0, |response| response.status)
	}

	fn response_headers(&self, name: &str) -> Vec<String> {
		self.response
			.iter()
			.flat_map(|response| response.headers.iter())
			.filter(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.clone())
			.collect()
	}

	fn response_stream(&mut self) -> Result<Box<dyn Read + '_>> {
		match &self.response {
			Some(response) => Ok(Box::new(&response.body[..])),
			None => Err(io::Error::new(io::ErrorKind::NotConnected, "request not executed").into()),
		}
	}
}
