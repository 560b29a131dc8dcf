use crate::namespace::Namespace;
use std::{
	borrow::Cow,
	fmt,
};

/// Collects attributes and text content of an element to be written
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeGenerator {
	attributes: Vec<(Option<Namespace>, Cow<'static, str>, String)>,
	content: Option<String>,
}

impl AttributeGenerator {
	/// Add attribute without namespace
	pub fn put(&mut self, name: &'static str, value: impl fmt::Display) {
		self.attributes.push((None, Cow::Borrowed(name), value.to_string()));
	}

	/// Add attribute if value is present
	pub fn put_option<V: fmt::Display>(&mut self, name: &'static str, value: Option<V>) {
		if let Some(value) = value {
			self.put(name, value);
		}
	}

	/// Add namespaced attribute
	pub fn put_ns(&mut self, ns: &Namespace, name: impl Into<Cow<'static, str>>, value: impl fmt::Display) {
		self.attributes.push((Some(ns.clone()), name.into(), value.to_string()));
	}

	/// Set text content of the element
	pub fn set_content(&mut self, content: impl Into<String>) {
		self.content = Some(content.into());
	}

	/// Text content
	pub fn content(&self) -> Option<&str> {
		self.content.as_deref()
	}

	/// All attributes in insertion order
	pub fn attributes(&self) -> impl Iterator<Item = (Option<&Namespace>, &str, &str)> {
		self.attributes.iter().map(|(ns, name, value)| (ns.as_ref(), &**name, value.as_str()))
	}
}
