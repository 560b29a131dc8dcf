use crate::{
	namespace::QName,
	parser::{
		Child,
		ElementState,
	},
	Result,
};
use std::borrow::Cow;

/// Collects the text content of an element; nested elements are rejected.
///
/// Attributes are ignored, read them through `Child::attributes` first if needed.
#[derive(Default)]
pub struct TextState {
	/// Collected (unescaped) text
	pub text: String,
}

impl ElementState for TextState {
	fn parse_element_attribute(&mut self, _name: &QName, _value: String) -> Result<()> {
		Ok(())
	}

	fn parse_element_inner_text(&mut self, text: Cow<'_, str>) -> Result<()> {
		self.text.push_str(&text);
		Ok(())
	}
}

/// Collects mixed content: text and nested markup
///
/// `text` contains only the unescaped text parts; `markup` contains escaped text and nested
/// elements captured verbatim (suitable for writing back as raw XML).
#[derive(Default)]
pub struct MarkupState {
	/// Unescaped text content
	pub text: String,
	/// Escaped text and captured nested elements
	pub markup: String,
	/// Whether nested elements were found
	pub has_elements: bool,
}

impl ElementState for MarkupState {
	fn parse_element_attribute(&mut self, _name: &QName, _value: String) -> Result<()> {
		Ok(())
	}

	fn parse_element_inner_text(&mut self, text: Cow<'_, str>) -> Result<()> {
		self.markup.push_str(&String::from_utf8_lossy(&quick_xml::escape::escape(text.as_bytes())));
		self.text.push_str(&text);
		Ok(())
	}

	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		self.has_elements = true;
		let xml = child.capture()?;
		self.markup.push_str(&xml);
		Ok(())
	}
}
