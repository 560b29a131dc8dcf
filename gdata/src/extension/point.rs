use crate::{
	errors,
	extension::{
		DynExtension,
		DynExtensionList,
		Extension,
		ExtensionProfile,
		XmlBlob,
	},
	namespace::QName,
	parser::Child,
	serializer::ElementSerializer,
	Result,
};
use std::any::TypeId;
use tracing::trace;

/// Extension storage of a container
///
/// Holds single values (non-repeatable extensions), ordered lists (repeatable extensions),
/// unrecognized attributes and captured unrecognized markup.  Values are keyed by type;
/// insertion order is kept and used when generating XML.
#[derive(Debug, Default)]
pub struct ExtensionPoint {
	single: Vec<(TypeId, Box<dyn DynExtension>)>,
	repeating: Vec<(TypeId, Box<dyn DynExtensionList>)>,
	attributes: Vec<(QName, String)>,
	blob: XmlBlob,
}

impl ExtensionPoint {
	/// Empty extension point
	pub fn new() -> Self {
		Self::default()
	}

	fn single_index<T: Extension>(&self) -> Option<usize> {
		self.single.iter().position(|(id, _)| *id == TypeId::of::<T>())
	}

	fn repeating_index<T: Extension>(&self) -> Option<usize> {
		self.repeating.iter().position(|(id, _)| *id == TypeId::of::<T>())
	}

	/// Get non-repeatable extension value
	pub fn extension<T: Extension>(&self) -> Option<&T> {
		let pos = self.single_index::<T>()?;
		self.single[pos].1.as_any().downcast_ref()
	}

	/// Get non-repeatable extension value for modification
	pub fn extension_mut<T: Extension>(&mut self) -> Option<&mut T> {
		let pos = self.single_index::<T>()?;
		self.single[pos].1.as_any_mut().downcast_mut()
	}

	/// Set (replace) non-repeatable extension value
	pub fn set_extension<T: Extension>(&mut self, value: T) {
		match self.single_index::<T>() {
			Some(pos) => self.single[pos].1 = Box::new(value),
			None => self.single.push((TypeId::of::<T>(), Box::new(value))),
		}
	}

	/// Remove non-repeatable extension value
	pub fn remove_extension<T: Extension>(&mut self) -> Option<T> {
		let pos = self.single_index::<T>()?;
		let (_, value) = self.single.remove(pos);
		value.into_any().downcast().ok().map(|value| *value)
	}

	/// Whether a non-repeatable extension value is present
	pub fn has_extension<T: Extension>(&self) -> bool {
		self.single_index::<T>().is_some()
	}

	/// All values of a repeatable extension (in order)
	pub fn repeating_extension<T: Extension>(&self) -> &[T] {
		self.repeating_index::<T>()
			.and_then(|pos| self.repeating[pos].1.as_any().downcast_ref::<Vec<T>>())
			.map_or(&[][..], |list| list.as_slice())
	}

	/// Live list of a repeatable extension; modifications change the container
	///
	/// Creates an empty list if none is present yet.
	pub fn repeating_extension_mut<T: Extension>(&mut self) -> &mut Vec<T> {
		let pos = match self.repeating_index::<T>() {
			Some(pos) => pos,
			None => {
				self.repeating.push((TypeId::of::<T>(), Box::new(Vec::<T>::new())));
				self.repeating.len() - 1
			},
		};
		self.repeating[pos]
			.1
			.as_any_mut()
			.downcast_mut::<Vec<T>>()
			.expect("lists are keyed by the TypeId of their element type")
	}

	/// Append value to a repeatable extension
	pub fn add_repeating_extension<T: Extension>(&mut self, value: T) {
		self.repeating_extension_mut::<T>().push(value);
	}

	/// Remove first value equal to `value` from a repeatable extension
	pub fn remove_repeating_extension<T: Extension>(&mut self, value: &T) -> bool {
		let pos = match self.repeating_index::<T>() {
			Some(pos) => pos,
			None => return false,
		};
		let list = match self.repeating[pos].1.as_any_mut().downcast_mut::<Vec<T>>() {
			Some(list) => list,
			None => return false,
		};
		match list.iter().position(|v| v == value) {
			Some(index) => {
				list.remove(index);
				true
			},
			None => false,
		}
	}

	/// Whether a repeatable extension has at least one value
	pub fn has_repeating_extension<T: Extension>(&self) -> bool {
		!self.repeating_extension::<T>().is_empty()
	}

	fn has_type(&self, type_id: TypeId, repeatable: bool) -> bool {
		if repeatable {
			self.repeating.iter().any(|(id, list)| *id == type_id && !list.is_empty())
		} else {
			self.single.iter().any(|(id, _)| *id == type_id)
		}
	}

	/// Unrecognized attributes
	pub fn attributes(&self) -> &[(QName, String)] {
		&self.attributes
	}

	/// Add unrecognized attribute (written back unchanged)
	pub fn add_attribute(&mut self, name: QName, value: String) {
		self.attributes.push((name, value));
	}

	/// Captured unrecognized markup
	pub fn xml_blob(&self) -> &XmlBlob {
		&self.blob
	}

	/// Captured unrecognized markup for modification
	pub fn xml_blob_mut(&mut self) -> &mut XmlBlob {
		&mut self.blob
	}

	/// Parse nested element of a container
	///
	/// `kinds` is the container type chain (most specific first) used to look up declared
	/// extensions.  Unknown elements are captured in the blob if the profile allows arbitrary XML
	/// for the container, otherwise rejected.
	pub fn parse_child(&mut self, kinds: &[TypeId], profile: &ExtensionProfile, child: Child<'_, '_>) -> Result<()> {
		if let Some(description) = profile.lookup(kinds, child.name()) {
			return (description.parse)(description, self, profile, child);
		}
		if profile.allows_arbitrary_xml(kinds) {
			trace!(element = %child.name(), "capturing unrecognized element");
			let fragment = child.capture()?;
			self.blob.push(fragment);
			Ok(())
		} else {
			Err(errors::unexpected_element(&child.name().to_string()))
		}
	}

	/// Check all required extensions declared for the container are present
	pub fn check_required(&self, kinds: &[TypeId], profile: &ExtensionProfile) -> Result<()> {
		for description in profile.descriptions(kinds) {
			if description.is_required() && !self.has_type(description.type_id(), description.is_repeatable()) {
				return Err(errors::missing_element(&description.qualified_name()));
			}
		}
		Ok(())
	}

	/// Write unrecognized attributes
	pub fn generate_attributes(&self, element: &mut ElementSerializer<'_>) -> Result<()> {
		for (name, value) in &self.attributes {
			element.attribute_qname(name, value)?;
		}
		Ok(())
	}

	/// Write extensions: non-repeatable first, then repeatable, then captured markup
	pub fn generate(&self, element: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()> {
		for (_, value) in &self.single {
			value.generate(element, profile)?;
		}
		for (_, list) in &self.repeating {
			list.generate(element, profile)?;
		}
		self.blob.generate(element)
	}
}

impl Clone for ExtensionPoint {
	fn clone(&self) -> Self {
		Self {
			single: self.single.iter().map(|(id, v)| (*id, v.clone_box())).collect(),
			repeating: self.repeating.iter().map(|(id, v)| (*id, v.clone_box())).collect(),
			attributes: self.attributes.clone(),
			blob: self.blob.clone(),
		}
	}
}

// same values regardless of insertion order; empty lists count as absent
impl PartialEq for ExtensionPoint {
	fn eq(&self, other: &Self) -> bool {
		fn lists(point: &ExtensionPoint) -> impl Iterator<Item = &(TypeId, Box<dyn DynExtensionList>)> {
			point.repeating.iter().filter(|(_, list)| !list.is_empty())
		}

		self.single.len() == other.single.len()
			&& self.single.iter().all(|(id, value)| {
				other.single.iter().any(|(other_id, other_value)| id == other_id && value.eq_dyn(&**other_value))
			})
			&& lists(self).count() == lists(other).count()
			&& lists(self).all(|(id, list)| {
				lists(other).any(|(other_id, other_list)| id == other_id && list.eq_dyn(&**other_list))
			})
			&& self.attributes == other.attributes
			&& self.blob == other.blob
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::test_struct::*;

	#[test]
	fn single_values() {
		let mut point = ExtensionPoint::new();
		assert!(!point.has_extension::<Rating>());
		point.set_extension(Rating::new(3));
		point.set_extension(Rating::new(4));
		assert_eq!(point.extension::<Rating>().map(|r| r.value), Some(4));
		assert_eq!(point.remove_extension::<Rating>().map(|r| r.value), Some(4));
		assert!(point.extension::<Rating>().is_none());
	}

	#[test]
	fn repeating_list_is_live() {
		let mut point = ExtensionPoint::new();
		assert!(!point.has_repeating_extension::<Tag>());
		assert!(point.repeating_extension::<Tag>().is_empty());
		point.add_repeating_extension(Tag::new("a"));
		point.repeating_extension_mut::<Tag>().push(Tag::new("b"));
		assert_eq!(point.repeating_extension::<Tag>(), &[Tag::new("a"), Tag::new("b")]);
		assert!(point.remove_repeating_extension(&Tag::new("a")));
		assert!(!point.remove_repeating_extension(&Tag::new("a")));
		point.repeating_extension_mut::<Tag>().clear();
		assert!(!point.has_repeating_extension::<Tag>());
	}

	#[test]
	fn equality_ignores_order_and_empty_lists() {
		let mut a = ExtensionPoint::new();
		a.set_extension(Rating::new(1));
		a.add_repeating_extension(Tag::new("x"));
		let mut b = ExtensionPoint::new();
		b.repeating_extension_mut::<Rating>();
		b.add_repeating_extension(Tag::new("x"));
		b.set_extension(Rating::new(1));
		assert_eq!(a, b);
		b.add_repeating_extension(Tag::new("y"));
		assert_ne!(a, b.clone());
	}
}
