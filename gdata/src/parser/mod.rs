//! Traits and helper structs to parse XML
//!
//! Parsing works with "state" types implementing `ElementState`, which receive the parts of an
//! element (attributes, text, nested elements) incrementally.  Nested elements are handed over as
//! `Child`, which must be consumed (parsed, skipped or captured) before returning.
//!
//! Extensions don't implement `ElementState` directly; they receive their attributes and text
//! content through an `AttributeHelper`.

mod attributes;
mod core;
mod ignore;
mod text;

pub use crate::quick_xml::Child;

pub use self::{
	attributes::AttributeHelper,
	core::ElementState,
	ignore::IgnoreElement,
	text::{
		MarkupState,
		TextState,
	},
};
