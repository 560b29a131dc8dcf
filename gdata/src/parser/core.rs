use crate::{
	errors,
	namespace::QName,
	parser::Child,
	Result,
};
use std::borrow::Cow;

/// A state to parse exactly one element
///
/// The parser calls `parse_element_attribute` for all attributes on the element (namespace
/// declarations excluded), then `parse_element_inner_text` and `parse_element_inner_node` until
/// the closing tag of the element is hit, upon which it calls `parse_element_finish`.
pub trait ElementState {
	/// Parse attribute into state
	///
	/// The default implementation will fail with "unexpected attribute".
	fn parse_element_attribute(&mut self, name: &QName, value: String) -> Result<()> {
		let _ = value;
		Err(errors::unexpected_attribute(&name.to_string()))
	}

	/// Parse text or CDATA into state.
	///
	/// The default implementation will ignore whitespace and fail otherwise.
	fn parse_element_inner_text(&mut self, text: Cow<'_, str>) -> Result<()> {
		if !text.trim().is_empty() {
			return Err(errors::unexpected_text());
		}
		Ok(())
	}

	/// Parse inner elements.
	///
	/// The child must be consumed; the default implementation will fail with "unexpected element".
	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		Err(errors::unexpected_element(&child.name().to_string()))
	}

	/// Finish parsing an element.
	///
	/// Called after the closing tag was consumed.
	fn parse_element_finish(&mut self) -> Result<()> {
		Ok(())
	}
}
