use crate::{
	namespace::QName,
	parser::{
		Child,
		ElementState,
	},
	Result,
};
use std::borrow::Cow;

/// State skipping an element: attributes, text and nested elements are all dropped
pub struct IgnoreElement;

impl ElementState for IgnoreElement {
	fn parse_element_attribute(&mut self, _name: &QName, _value: String) -> Result<()> {
		Ok(())
	}

	fn parse_element_inner_text(&mut self, _text: Cow<'_, str>) -> Result<()> {
		Ok(())
	}

	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		// stateless; nested elements reuse it
		child.parse(self)
	}
}
