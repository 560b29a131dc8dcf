//! Helpers to serialize data to XML
//!
//! Extensions put their attributes and text content into an `AttributeGenerator`; the element
//! itself (and nested extensions) is written through an `ElementSerializer`.

mod attributes;

pub use crate::quick_xml::ElementSerializer;

pub use self::attributes::AttributeGenerator;
