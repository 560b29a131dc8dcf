use crate::{
	errors,
	namespace::{
		Namespace,
		QName,
	},
	Result,
};
use std::str::FromStr;

/// Attributes and text content of an element, handed to an extension to consume
///
/// Each consumed attribute is removed; after an extension consumed what it knows the remaining
/// attributes can be checked with `assert_all_consumed` or kept as unrecognized.
#[derive(Clone, Debug)]
pub struct AttributeHelper {
	element: &'static str,
	attributes: Vec<(QName, String)>,
	content: Option<String>,
}

impl AttributeHelper {
	/// Helper for the named element (name is used in error messages)
	pub fn new(element: &'static str) -> Self {
		Self {
			element,
			attributes: Vec::new(),
			content: None,
		}
	}

	pub(crate) fn add(&mut self, name: QName, value: String) {
		self.attributes.push((name, value));
	}

	pub(crate) fn set_content(&mut self, content: String) {
		self.content = Some(content);
	}

	/// Take attribute without namespace
	pub fn consume(&mut self, name: &str) -> Option<String> {
		let pos = self.attributes.iter().position(|(n, _)| n.uri().is_empty() && n.local_name() == name)?;
		Some(self.attributes.remove(pos).1)
	}

	/// Take namespaced attribute
	pub fn consume_ns(&mut self, ns: &Namespace, name: &str) -> Option<String> {
		let pos = self.attributes.iter().position(|(n, _)| n.is(ns, name))?;
		Some(self.attributes.remove(pos).1)
	}

	/// Take attribute which must be present
	pub fn consume_required(&mut self, name: &str) -> Result<String> {
		let element = self.element;
		self.consume(name).ok_or_else(|| errors::missing_attribute(element, name))
	}

	/// Take attribute and parse it
	pub fn consume_parsed<T: FromStr>(&mut self, name: &str) -> Result<Option<T>> {
		match self.consume(name) {
			None => Ok(None),
			Some(value) => match value.trim().parse() {
				Ok(v) => Ok(Some(v)),
				Err(_) => Err(errors::invalid_value(name, &value)),
			},
		}
	}

	/// Take attribute which must be present and parse it
	pub fn consume_required_parsed<T: FromStr>(&mut self, name: &str) -> Result<T> {
		let element = self.element;
		self.consume_parsed(name)?.ok_or_else(|| errors::missing_attribute(element, name))
	}

	/// Take boolean attribute (`true`/`false`, `1`/`0`)
	pub fn consume_bool(&mut self, name: &str, default: bool) -> Result<bool> {
		match self.consume(name).as_deref() {
			None => Ok(default),
			Some("true") | Some("1") => Ok(true),
			Some("false") | Some("0") => Ok(false),
			Some(other) => Err(errors::invalid_value(name, other)),
		}
	}

	/// Take the text content of the element
	///
	/// If `required` is set missing or empty content is an error.
	pub fn consume_content(&mut self, required: bool) -> Result<Option<String>> {
		match self.content.take() {
			Some(content) if !content.is_empty() => Ok(Some(content)),
			_ if required => Err(errors::missing_content(self.element)),
			_ => Ok(None),
		}
	}

	/// Fails if not all attributes without namespace were consumed
	pub fn assert_all_consumed(&self) -> Result<()> {
		match self.attributes.iter().find(|(name, _)| name.uri().is_empty()) {
			None => Ok(()),
			Some((name, _)) => Err(errors::unexpected_attribute(&name.to_string())),
		}
	}

	pub(crate) fn into_remaining(self) -> Vec<(QName, String)> {
		self.attributes
	}
}
