use crate::{
	errors,
	Error,
	Result,
};
use mime::Mime;
use std::{
	fmt,
	str::FromStr,
};

/// Media type of a request or response body
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentType(Mime);

impl ContentType {
	fn known(value: &'static str) -> Self {
		Self(value.parse().expect("static content types are valid"))
	}

	/// `application/atom+xml; charset=UTF-8`
	pub fn atom() -> Self {
		Self::known("application/atom+xml; charset=UTF-8")
	}

	/// `text/xml`
	pub fn xml() -> Self {
		Self(mime::TEXT_XML)
	}

	/// `application/x-www-form-urlencoded`
	pub fn form() -> Self {
		Self(mime::APPLICATION_WWW_FORM_URLENCODED)
	}

	/// Wrap a parsed media type
	pub fn new(mime: Mime) -> Self {
		Self(mime)
	}

	/// The media type
	pub fn mime(&self) -> &Mime {
		&self.0
	}

	/// Whether type and subtype are equal (parameters are ignored)
	pub fn matches(&self, other: &ContentType) -> bool {
		self.0.type_() == other.0.type_() && self.0.subtype() == other.0.subtype()
	}

	/// Whether the body is XML (`*/xml` or `*/*+xml`)
	pub fn is_xml(&self) -> bool {
		self.0.subtype() == mime::XML || self.0.suffix() == Some(mime::XML)
	}
}

impl Default for ContentType {
	fn default() -> Self {
		Self::atom()
	}
}

impl FromStr for ContentType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		s.parse().map(Self).map_err(|_| errors::invalid_value("content-type", s))
	}
}

impl fmt::Display for ContentType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn xml_detection() {
		assert!(ContentType::atom().is_xml());
		assert!(ContentType::xml().is_xml());
		assert!("application/rss+xml".parse::<ContentType>().unwrap().is_xml());
		assert!(!"image/png".parse::<ContentType>().unwrap().is_xml());
		assert!(!ContentType::form().is_xml());
		assert!("no type".parse::<ContentType>().is_err());
	}

	#[test]
	fn matching_ignores_parameters() {
		let plain: ContentType = "application/atom+xml".parse().unwrap();
		assert!(plain.matches(&ContentType::atom()));
		assert_ne!(plain, ContentType::atom());
		assert!(ContentType::atom().to_string().starts_with("application/atom+xml;"));
	}
}
