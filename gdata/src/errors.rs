#![allow(missing_docs)] // names should be good enough
//! Error types and helper functions to generate common errors

use std::{
	any::Any,
	fmt,
};
use thiserror::Error;

/// Failures while binding XML to data (or data back to XML)
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("unexpected eof: {msg}")]
	UnexpectedEof { msg: String },
	#[error("Unexpected end tag")]
	UnexpectedEnd,
	#[error("Unexpected decl <?xml ... ?>")]
	UnexpectedDecl,
	#[error("Unexpected <!DOCTYPE ...>")]
	UnexpectedDocType,
	#[error("Unexpected processing instructions <?...?>")]
	UnexpectedPI,
	#[error("Unexpected (non-whitespace) text/CDATA")]
	UnexpectedText,
	#[error("Unexpected element: {tag}")]
	UnexpectedElement { tag: String },
	#[error("Unexpected attribute: {key}")]
	UnexpectedAttribute { key: String },
	#[error("Unknown namespace prefix {prefix:?}")]
	UnknownPrefix { prefix: String },
	#[error("Inner element {tag:?} wasn't fully parsed")]
	InnerElementNotParsed { tag: String },
	#[error("Required extension element {tag} not found.")]
	MissingElement { tag: String },
	#[error("Missing attribute {attribute:?} on element {element:?}")]
	MissingAttribute { element: String, attribute: String },
	#[error("Invalid value {value:?} for {key:?}")]
	InvalidValue { key: String, value: String },
	#[error("Duplicate extension element {tag}")]
	DuplicateExtension { tag: String },
}

/// Reason an authentication attempt (or an authenticated request) failed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthFailure {
	/// Username or password rejected
	InvalidCredentials,
	/// The account was deleted
	AccountDeleted,
	/// The account was disabled
	AccountDisabled,
	/// The account email address wasn't verified
	NotVerified,
	/// The user hasn't agreed to the terms of service
	TermsNotAgreed,
	/// Authentication service temporarily unavailable
	ServiceUnavailable,
	/// A CAPTCHA challenge has to be solved out-of-band before retrying
	CaptchaRequired {
		/// Absolute URL of the challenge image
		url: String,
		/// Token identifying the challenge; pass back with the answer
		token: String,
	},
	/// The server side session (token) expired
	SessionExpired,
	/// The request wasn't authorized
	Unauthorized,
	/// Unrecognized failure code reported by the login service
	Other(String),
}

impl fmt::Display for AuthFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidCredentials => f.write_str("invalid credentials"),
			Self::AccountDeleted => f.write_str("account deleted"),
			Self::AccountDisabled => f.write_str("account disabled"),
			Self::NotVerified => f.write_str("account not verified"),
			Self::TermsNotAgreed => f.write_str("terms not agreed"),
			Self::ServiceUnavailable => f.write_str("service unavailable"),
			Self::CaptchaRequired { url, .. } => write!(f, "captcha required ({})", url),
			Self::SessionExpired => f.write_str("session expired"),
			Self::Unauthorized => f.write_str("unauthorized"),
			Self::Other(code) => write!(f, "error {}", code),
		}
	}
}

/// Authentication failure with reason and server supplied message
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("authentication failed: {reason}: {message}")]
pub struct AuthenticationError {
	/// Why it failed
	pub reason: AuthFailure,
	/// Message from the server (might be empty)
	pub message: String,
}

impl AuthenticationError {
	/// New authentication error
	pub fn new(reason: AuthFailure, message: impl Into<String>) -> Self {
		Self {
			reason,
			message: message.into(),
		}
	}
}

/// Snapshot of a failed response
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ResponseInfo {
	/// HTTP status code
	pub status: u16,
	/// Response content type (if the server sent one)
	pub content_type: Option<String>,
	/// Response body, decoded lossy as UTF-8
	pub body: String,
}

impl fmt::Display for ResponseInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.body.is_empty() {
			write!(f, "status {}", self.status)
		} else {
			write!(f, "status {}: {}", self.status, self.body)
		}
	}
}

/// A batch response feed ended with an interrupted marker
///
/// The complete response feed is kept; use `feed` with the entry type the batch was sent with to
/// inspect results of the entries processed before the interruption.
pub struct BatchInterruptedError {
	/// Index of the marker entry in the response feed; input entries at or after it weren't
	/// processed.
	pub position: usize,
	/// The interruption details
	pub interrupted: crate::data::batch::BatchInterrupted,
	feed: Box<dyn Any + Send + Sync>,
}

impl BatchInterruptedError {
	pub(crate) fn new<F: Any + Send + Sync>(
		position: usize,
		interrupted: crate::data::batch::BatchInterrupted,
		feed: F,
	) -> Self {
		Self {
			position,
			interrupted,
			feed: Box::new(feed),
		}
	}

	/// Response feed (the `E` must match the entry type passed to `batch`)
	pub fn feed<E: crate::data::EntryType>(&self) -> Option<&crate::data::Feed<E>> {
		self.feed.downcast_ref()
	}
}

impl fmt::Debug for BatchInterruptedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BatchInterruptedError")
			.field("position", &self.position)
			.field("interrupted", &self.interrupted)
			.finish()
	}
}

/// All errors of this crate
#[derive(Debug, Error)]
pub enum Error {
	/// XML (data binding) failure
	#[error(transparent)]
	Parse(#[from] ParseError),
	/// Low-level XML syntax failure
	#[error("xml: {0}")]
	Xml(#[from] quick_xml::Error),
	/// I/O failure in the transport
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Malformed URL
	#[error("invalid url: {0}")]
	InvalidUrl(#[from] url::ParseError),
	/// Serialized data wasn't UTF-8
	#[error("invalid utf-8: {0}")]
	Utf8(#[from] std::string::FromUtf8Error),
	/// Invalid argument passed by the caller
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	/// Operation not possible in the current state
	#[error("invalid state: {0}")]
	InvalidState(String),
	/// Mutation of a frozen value
	#[error("{element} instance is read only")]
	Immutable {
		/// Local name of the frozen element
		element: &'static str,
	},
	/// Response with a content type that can't be parsed
	#[error("unexpected response content type {content_type:?}")]
	InvalidContentType {
		/// Content type the server sent
		content_type: String,
	},
	/// Resource wasn't modified since the given precondition
	///
	/// Not really a failure; callers should branch on it.
	#[error("not modified")]
	NotModified(ResponseInfo),
	/// Resource not found
	#[error("resource not found: {0}")]
	ResourceNotFound(ResponseInfo),
	/// Access forbidden
	#[error("forbidden: {0}")]
	Forbidden(ResponseInfo),
	/// Server rejected the submitted entry
	#[error("invalid entry: {0}")]
	InvalidEntry(ResponseInfo),
	/// Version (etag) conflict
	#[error("version conflict: {0}")]
	VersionConflict(ResponseInfo),
	/// Precondition (etag) failed
	#[error("precondition failed: {0}")]
	PreconditionFailed(ResponseInfo),
	/// Server doesn't implement the operation
	#[error("not implemented: {0}")]
	NotImplemented(ResponseInfo),
	/// Request needs to be sent to another location
	#[error("redirect required to {location}")]
	RedirectRequired {
		/// Value of the location header
		location: String,
	},
	/// Generic service failure
	#[error("service error: {0}")]
	Service(ResponseInfo),
	/// Authentication failure
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// Batch processing stopped early
	#[error("batch interrupted: {}", .0.interrupted.reason.as_deref().unwrap_or("unknown reason"))]
	BatchInterrupted(Box<BatchInterruptedError>),
}

impl Error {
	/// Whether this is an authentication failure because the session expired
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::Authentication(AuthenticationError { reason: AuthFailure::SessionExpired, .. }))
	}

	/// The response snapshot for protocol errors
	pub fn response(&self) -> Option<&ResponseInfo> {
		match self {
			Self::NotModified(info)
			| Self::ResourceNotFound(info)
			| Self::Forbidden(info)
			| Self::InvalidEntry(info)
			| Self::VersionConflict(info)
			| Self::PreconditionFailed(info)
			| Self::NotImplemented(info)
			| Self::Service(info) => Some(info),
			_ => None,
		}
	}
}

pub fn unexpected_eof(msg: &str) -> Error {
	ParseError::UnexpectedEof { msg: msg.into() }.into()
}

pub fn unexpected_end() -> Error {
	ParseError::UnexpectedEnd.into()
}

pub fn unexpected_decl() -> Error {
	ParseError::UnexpectedDecl.into()
}

pub fn unexpected_doctype() -> Error {
	ParseError::UnexpectedDocType.into()
}

pub fn unexpected_pi() -> Error {
	ParseError::UnexpectedPI.into()
}

pub fn unexpected_text() -> Error {
	ParseError::UnexpectedText.into()
}

pub fn unexpected_element(tag: &str) -> Error {
	ParseError::UnexpectedElement { tag: tag.into() }.into()
}

pub fn unexpected_attribute(key: &str) -> Error {
	ParseError::UnexpectedAttribute { key: key.into() }.into()
}

pub fn unknown_prefix(prefix: &str) -> Error {
	ParseError::UnknownPrefix { prefix: prefix.into() }.into()
}

pub fn inner_element_not_parsed(tag: &str) -> Error {
	ParseError::InnerElementNotParsed { tag: tag.into() }.into()
}

pub fn missing_element(tag: &str) -> Error {
	ParseError::MissingElement { tag: tag.into() }.into()
}

pub fn missing_content(element: &str) -> Error {
	missing_element(&format!("{} (text content)", element))
}

pub fn missing_attribute(element: &str, attribute: &str) -> Error {
	ParseError::MissingAttribute {
		element: element.into(),
		attribute: attribute.into(),
	}
	.into()
}

pub fn invalid_value(key: &str, value: &str) -> Error {
	ParseError::InvalidValue {
		key: key.into(),
		value: value.into(),
	}
	.into()
}

pub fn duplicate_extension(tag: &str) -> Error {
	ParseError::DuplicateExtension { tag: tag.into() }.into()
}

pub fn immutable(element: &'static str) -> Error {
	Error::Immutable { element }
}

pub fn invalid_argument(msg: impl Into<String>) -> Error {
	Error::InvalidArgument(msg.into())
}

pub fn invalid_state(msg: impl Into<String>) -> Error {
	Error::InvalidState(msg.into())
}

pub fn authentication(reason: AuthFailure, message: impl Into<String>) -> Error {
	AuthenticationError::new(reason, message).into()
}
