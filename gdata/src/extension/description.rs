use crate::{
	extension::{
		parse_extension,
		qualified_name,
		Extension,
		ExtensionPoint,
		ExtensionProfile,
	},
	namespace::{
		Namespace,
		QName,
	},
	parser::Child,
	Result,
};
use std::{
	any::TypeId,
	fmt,
};

type ParseFn = fn(&ExtensionDescription, &mut ExtensionPoint, &ExtensionProfile, Child<'_, '_>) -> Result<()>;

fn parse_into<T: Extension>(
	description: &ExtensionDescription,
	point: &mut ExtensionPoint,
	profile: &ExtensionProfile,
	child: Child<'_, '_>,
) -> Result<()> {
	let value = parse_extension::<T>(profile, child)?;
	if description.repeatable {
		point.add_repeating_extension(value);
	} else {
		if point.has_extension::<T>() {
			return Err(super::duplicate(&description.namespace, &description.local_name));
		}
		point.set_extension(value);
	}
	Ok(())
}

fn declare_nested<T: Extension>(profile: &mut ExtensionProfile) {
	profile.declare_kind(TypeId::of::<T>(), T::declare_extensions);
}

/// Describes an extension legal on a container: which type, which element, and cardinality
#[derive(Clone)]
pub struct ExtensionDescription {
	type_id: TypeId,
	type_name: &'static str,
	namespace: Namespace,
	local_name: &'static str,
	required: bool,
	repeatable: bool,
	pub(crate) parse: ParseFn,
	pub(crate) declare: fn(&mut ExtensionProfile),
}

impl ExtensionDescription {
	/// Optional, non-repeatable description for extension `T`
	pub fn of<T: Extension>() -> Self {
		Self {
			type_id: TypeId::of::<T>(),
			type_name: std::any::type_name::<T>(),
			namespace: T::NAMESPACE,
			local_name: T::LOCAL_NAME,
			required: false,
			repeatable: false,
			parse: parse_into::<T>,
			declare: declare_nested::<T>,
		}
	}

	/// Mark extension as required
	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	/// Mark extension as repeatable
	pub fn repeatable(mut self) -> Self {
		self.repeatable = true;
		self
	}

	/// Type tag of the extension
	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	/// Namespace of the element
	pub fn namespace(&self) -> &Namespace {
		&self.namespace
	}

	/// Local name of the element
	pub fn local_name(&self) -> &'static str {
		self.local_name
	}

	/// Whether the extension must be present
	pub fn is_required(&self) -> bool {
		self.required
	}

	/// Whether the extension can appear multiple times
	pub fn is_repeatable(&self) -> bool {
		self.repeatable
	}

	pub(crate) fn matches(&self, name: &QName) -> bool {
		name.is(&self.namespace, self.local_name)
	}

	pub(crate) fn qualified_name(&self) -> String {
		qualified_name(&self.namespace, self.local_name)
	}
}

impl fmt::Debug for ExtensionDescription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ExtensionDescription")
			.field("type", &self.type_name)
			.field("namespace", &self.namespace.uri())
			.field("local_name", &self.local_name)
			.field("required", &self.required)
			.field("repeatable", &self.repeatable)
			.finish()
	}
}
