//! Extension binding engine
//!
//! Containers (feeds, entries and extensions which are themselves containers) carry an
//! [`ExtensionPoint`] storing extension values by type.  Which extensions are legal on which
//! container is recorded in an [`ExtensionProfile`]: each container type implements [`Kind`] and
//! declares its extensions (as [`ExtensionDescription`]s) once per profile.
//!
//! ```
//! use gdata::extension::{Extension, ExtensionDescription, ExtensionProfile, Kind};
//! use gdata::namespace::Namespace;
//! use gdata::parser::AttributeHelper;
//! use gdata::serializer::AttributeGenerator;
//!
//! const CONTACTS: Namespace = Namespace::new_static("gContact", "http://schemas.google.com/contact/2008");
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Nickname(String);
//!
//! impl Extension for Nickname {
//! 	const NAMESPACE: Namespace = CONTACTS;
//! 	const LOCAL_NAME: &'static str = "nickname";
//!
//! 	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> gdata::Result<()> {
//! 		self.0 = helper.consume_content(true)?.unwrap_or_default();
//! 		Ok(())
//! 	}
//!
//! 	fn put_attributes(&self, generator: &mut AttributeGenerator) {
//! 		generator.set_content(self.0.clone());
//! 	}
//! }
//!
//! struct Contact;
//!
//! impl Kind for Contact {
//! 	fn declare_extensions(profile: &mut ExtensionProfile) {
//! 		profile.declare::<Contact>(ExtensionDescription::of::<Nickname>());
//! 	}
//! }
//!
//! let mut profile = ExtensionProfile::new();
//! profile.add_declarations::<Contact>();
//! assert!(profile.is_declared::<Contact>());
//! ```

mod blob;
mod description;
mod frozen;
mod point;
mod profile;

pub use self::{
	blob::XmlBlob,
	description::ExtensionDescription,
	frozen::Frozen,
	point::ExtensionPoint,
	profile::ExtensionProfile,
};

use crate::{
	errors,
	namespace::{
		Namespace,
		QName,
	},
	parser::{
		AttributeHelper,
		Child,
		ElementState,
	},
	serializer::{
		AttributeGenerator,
		ElementSerializer,
	},
	Result,
};
use std::{
	any::{
		Any,
		TypeId,
	},
	borrow::Cow,
	fmt,
};
use tracing::trace;

/// A container type with declared extensions
///
/// `declare_extensions` is called at most once per profile through
/// `ExtensionProfile::add_declarations`; containers referencing each other (even cyclic) just call
/// `add_declarations` for the other type.
pub trait Kind: 'static {
	/// Declare extensions of this container type
	fn declare_extensions(profile: &mut ExtensionProfile);
}

/// An extension element
///
/// Values are created with `Default` when parsing; `consume_attributes` then receives the
/// attributes and text content.  Extensions which can contain other extensions return their
/// `ExtensionPoint` and declare their nested extensions in `declare_extensions`.
pub trait Extension: Clone + Default + fmt::Debug + PartialEq + Send + Sync + 'static {
	/// Namespace of the element
	const NAMESPACE: Namespace;
	/// Local name of the element
	const LOCAL_NAME: &'static str;

	/// Read attributes and text content
	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		let _ = helper;
		Ok(())
	}

	/// Write attributes and text content
	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		let _ = generator;
	}

	/// Check required attributes and elements are present
	fn validate(&self) -> Result<()> {
		Ok(())
	}

	/// Nested extensions (if this extension is a container)
	fn extension_point(&self) -> Option<&ExtensionPoint> {
		None
	}

	/// Nested extensions (if this extension is a container)
	fn extension_point_mut(&mut self) -> Option<&mut ExtensionPoint> {
		None
	}

	/// Declare nested extensions (if this extension is a container)
	fn declare_extensions(profile: &mut ExtensionProfile) {
		let _ = profile;
	}
}

/// Object safe view of a single extension value
pub(crate) trait DynExtension: fmt::Debug + Send + Sync {
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
	fn into_any(self: Box<Self>) -> Box<dyn Any>;
	fn clone_box(&self) -> Box<dyn DynExtension>;
	fn eq_dyn(&self, other: &dyn DynExtension) -> bool;
	fn generate(&self, element: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()>;
}

impl<T: Extension> DynExtension for T {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn into_any(self: Box<Self>) -> Box<dyn Any> {
		self
	}

	fn clone_box(&self) -> Box<dyn DynExtension> {
		Box::new(self.clone())
	}

	fn eq_dyn(&self, other: &dyn DynExtension) -> bool {
		other.as_any().downcast_ref::<T>().map_or(false, |other| self == other)
	}

	fn generate(&self, element: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()> {
		generate_extension(self, element, profile)
	}
}

/// Object safe view of a list of repeated extension values
pub(crate) trait DynExtensionList: fmt::Debug + Send + Sync {
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
	fn clone_box(&self) -> Box<dyn DynExtensionList>;
	fn eq_dyn(&self, other: &dyn DynExtensionList) -> bool;
	fn is_empty(&self) -> bool;
	fn generate(&self, element: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()>;
}

impl<T: Extension> DynExtensionList for Vec<T> {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn clone_box(&self) -> Box<dyn DynExtensionList> {
		Box::new(self.clone())
	}

	fn eq_dyn(&self, other: &dyn DynExtensionList) -> bool {
		other.as_any().downcast_ref::<Vec<T>>().map_or(false, |other| self == other)
	}

	fn is_empty(&self) -> bool {
		Vec::is_empty(self)
	}

	fn generate(&self, element: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()> {
		for value in self {
			generate_extension(value, element, profile)?;
		}
		Ok(())
	}
}

struct ExtensionState<'a, T> {
	value: T,
	helper: AttributeHelper,
	content: String,
	profile: &'a ExtensionProfile,
}

impl<T: Extension> ElementState for ExtensionState<'_, T> {
	fn parse_element_attribute(&mut self, name: &QName, value: String) -> Result<()> {
		self.helper.add(name.clone(), value);
		Ok(())
	}

	fn parse_element_inner_text(&mut self, text: Cow<'_, str>) -> Result<()> {
		self.content.push_str(&text);
		Ok(())
	}

	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		let profile = self.profile;
		match self.value.extension_point_mut() {
			Some(point) => point.parse_child(&[TypeId::of::<T>()], profile, child),
			None => {
				trace!(element = T::LOCAL_NAME, child = %child.name(), "skipping nested element");
				child.skip()
			},
		}
	}
}

/// Parse extension `T` from the passed element
pub fn parse_extension<T: Extension>(profile: &ExtensionProfile, child: Child<'_, '_>) -> Result<T> {
	let mut state = ExtensionState {
		value: T::default(),
		helper: AttributeHelper::new(T::LOCAL_NAME),
		content: String::new(),
		profile,
	};
	child.parse(&mut state)?;
	let ExtensionState {
		mut value,
		mut helper,
		content,
		..
	} = state;
	if !content.trim().is_empty() {
		helper.set_content(content);
	}
	value.consume_attributes(&mut helper)?;
	helper.assert_all_consumed()?;
	let remaining = helper.into_remaining();
	if let Some(point) = value.extension_point_mut() {
		for (name, attr_value) in remaining {
			point.add_attribute(name, attr_value);
		}
	}
	if let Some(point) = value.extension_point() {
		point.check_required(&[TypeId::of::<T>()], profile)?;
	}
	if profile.strict_validation() {
		value.validate()?;
	}
	Ok(value)
}

/// Write extension `value` as nested element
pub fn generate_extension<T: Extension>(
	value: &T,
	element: &mut ElementSerializer<'_>,
	profile: &ExtensionProfile,
) -> Result<()> {
	if profile.strict_validation() {
		value.validate()?;
	}
	let mut generator = AttributeGenerator::default();
	value.put_attributes(&mut generator);
	element.element(&T::NAMESPACE, T::LOCAL_NAME, |el| {
		for (ns, name, attr_value) in generator.attributes() {
			match ns {
				Some(ns) => el.attribute_ns(ns, name, attr_value)?,
				None => el.attribute(name, attr_value)?,
			}
		}
		if let Some(point) = value.extension_point() {
			point.generate_attributes(el)?;
		}
		if let Some(content) = generator.content() {
			el.text(content)?;
		}
		if let Some(point) = value.extension_point() {
			point.generate(el, profile)?;
		}
		Ok(())
	})
}

pub(crate) fn qualified_name(ns: &Namespace, local: &str) -> String {
	format!("{}:{}", ns.uri(), local)
}

pub(crate) fn duplicate(ns: &Namespace, local: &str) -> crate::Error {
	errors::duplicate_extension(&qualified_name(ns, local))
}
