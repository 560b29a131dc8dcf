use crate::{
	extension::{
		ExtensionDescription,
		Kind,
	},
	namespace::{
		Namespace,
		QName,
	},
};
use std::{
	any::TypeId,
	collections::{
		HashMap,
		HashSet,
	},
};
use tracing::trace;

#[derive(Clone, Debug, Default)]
struct ExtensionManifest {
	descriptions: Vec<ExtensionDescription>,
	arbitrary_xml: Option<bool>,
}

/// Registry of the extensions legal on each container type
///
/// One profile belongs to one service.  Container types declare their extensions through
/// `add_declarations`, which runs the declaration at most once per type and profile.
#[derive(Clone, Debug)]
pub struct ExtensionProfile {
	declared: HashSet<TypeId>,
	manifests: HashMap<TypeId, ExtensionManifest>,
	namespaces: Vec<Namespace>,
	arbitrary_xml: bool,
	strict_validation: bool,
}

impl Default for ExtensionProfile {
	fn default() -> Self {
		Self::new()
	}
}

impl ExtensionProfile {
	/// Empty profile; arbitrary XML is captured and validation is strict
	pub fn new() -> Self {
		Self {
			declared: HashSet::new(),
			manifests: HashMap::new(),
			namespaces: Vec::new(),
			arbitrary_xml: true,
			strict_validation: true,
		}
	}

	/// Declare the extensions of container type `C` (unless already declared)
	pub fn add_declarations<C: Kind>(&mut self) {
		self.declare_kind(TypeId::of::<C>(), C::declare_extensions);
	}

	// marks the kind declared before running the declaration so cycles terminate
	pub(crate) fn declare_kind(&mut self, kind: TypeId, declare: fn(&mut ExtensionProfile)) {
		if !self.declared.insert(kind) {
			return;
		}
		declare(self);
	}

	/// Whether `add_declarations` already ran for `C`
	pub fn is_declared<C: 'static>(&self) -> bool {
		self.declared.contains(&TypeId::of::<C>())
	}

	/// Declare an extension on container type `C`
	///
	/// A previous declaration of the same extension type on `C` is replaced.  Nested extensions
	/// of a container extension get declared too.
	pub fn declare<C: 'static>(&mut self, description: ExtensionDescription) {
		trace!(extension = ?description, "declaring extension");
		let declare_nested = description.declare;
		let manifest = self.manifests.entry(TypeId::of::<C>()).or_default();
		match manifest.descriptions.iter_mut().find(|d| d.type_id() == description.type_id()) {
			Some(existing) => *existing = description,
			None => manifest.descriptions.push(description),
		}
		declare_nested(self);
	}

	/// Allow (or forbid) capturing unrecognized elements on container type `C`
	pub fn declare_arbitrary_xml<C: 'static>(&mut self, allowed: bool) {
		self.manifests.entry(TypeId::of::<C>()).or_default().arbitrary_xml = Some(allowed);
	}

	/// Declare a namespace to be declared on generated root elements
	pub fn declare_additional_namespace(&mut self, namespace: Namespace) {
		if !self.namespaces.contains(&namespace) {
			self.namespaces.push(namespace);
		}
	}

	/// Default for capturing unrecognized elements (containers without explicit setting)
	pub fn arbitrary_xml(&self) -> bool {
		self.arbitrary_xml
	}

	/// Set default for capturing unrecognized elements
	pub fn set_arbitrary_xml(&mut self, allowed: bool) {
		self.arbitrary_xml = allowed;
	}

	/// Whether extensions are validated after parsing and before generating
	pub fn strict_validation(&self) -> bool {
		self.strict_validation
	}

	/// Enable or disable validation
	pub fn set_strict_validation(&mut self, strict: bool) {
		self.strict_validation = strict;
	}

	/// Find description for element `name` on the container chain `kinds` (most specific first)
	pub fn lookup(&self, kinds: &[TypeId], name: &QName) -> Option<&ExtensionDescription> {
		kinds
			.iter()
			.filter_map(|kind| self.manifests.get(kind))
			.flat_map(|manifest| manifest.descriptions.iter())
			.find(|description| description.matches(name))
	}

	/// All descriptions on the container chain `kinds`; specific declarations hide generic ones
	pub fn descriptions<'a>(&'a self, kinds: &'a [TypeId]) -> impl Iterator<Item = &'a ExtensionDescription> + 'a {
		let mut seen = HashSet::new();
		kinds
			.iter()
			.filter_map(move |kind| self.manifests.get(kind))
			.flat_map(|manifest| manifest.descriptions.iter())
			.filter(move |description| seen.insert(description.type_id()))
	}

	/// Whether unrecognized elements on the container chain `kinds` are captured
	pub fn allows_arbitrary_xml(&self, kinds: &[TypeId]) -> bool {
		kinds
			.iter()
			.filter_map(|kind| self.manifests.get(kind))
			.find_map(|manifest| manifest.arbitrary_xml)
			.unwrap_or(self.arbitrary_xml)
	}

	/// Namespaces used by all declared extensions plus additional namespaces
	///
	/// Sorted by alias; each URI appears once.
	pub fn namespace_decls(&self) -> Vec<Namespace> {
		let mut result: Vec<Namespace> = self.namespaces.clone();
		for manifest in self.manifests.values() {
			for description in &manifest.descriptions {
				if !result.contains(description.namespace()) {
					result.push(description.namespace().clone());
				}
			}
		}
		result.sort_by(|a, b| a.alias().cmp(b.alias()).then_with(|| a.uri().cmp(b.uri())));
		result
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		namespace::ATOM,
		test_struct::*,
	};
	use std::sync::atomic::{
		AtomicUsize,
		Ordering,
	};

	static COUNTED_RUNS: AtomicUsize = AtomicUsize::new(0);

	struct Counted;

	impl Kind for Counted {
		fn declare_extensions(profile: &mut ExtensionProfile) {
			COUNTED_RUNS.fetch_add(1, Ordering::SeqCst);
			profile.declare::<Counted>(ExtensionDescription::of::<Rating>());
		}
	}

	#[test]
	fn declaration_is_idempotent() {
		let mut profile = ExtensionProfile::new();
		profile.add_declarations::<Counted>();
		profile.add_declarations::<Counted>();
		assert_eq!(COUNTED_RUNS.load(Ordering::SeqCst), 1);
		assert_eq!(profile.descriptions(&[TypeId::of::<Counted>()]).count(), 1);

		// a new profile declares again
		let mut other = ExtensionProfile::new();
		other.add_declarations::<Counted>();
		assert_eq!(COUNTED_RUNS.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn cyclic_declarations_terminate() {
		let mut profile = ExtensionProfile::new();
		profile.add_declarations::<Album>();
		assert!(profile.is_declared::<Album>());
		assert!(profile.is_declared::<Photo>());
		// Photo declares Album again; Album's nested container (Folder) declares Album too
		assert!(profile.is_declared::<Folder>());
		let album = [TypeId::of::<Album>()];
		assert!(profile.lookup(&album, &QName::new(TEST_NS.uri(), "folder")).is_some());
		assert!(profile.lookup(&album, &QName::new(TEST_NS.uri(), "tag")).is_some());
	}

	#[test]
	fn lookup_follows_kind_chain() {
		let mut profile = ExtensionProfile::new();
		profile.declare::<Photo>(ExtensionDescription::of::<Rating>().required());
		profile.declare::<Album>(ExtensionDescription::of::<Rating>());
		profile.declare::<Album>(ExtensionDescription::of::<Tag>().repeatable());
		let chain = [TypeId::of::<Photo>(), TypeId::of::<Album>()];
		let rating = profile.lookup(&chain, &QName::new(TEST_NS.uri(), "rating")).unwrap();
		assert!(rating.is_required());
		assert!(profile.lookup(&chain, &QName::new(TEST_NS.uri(), "tag")).unwrap().is_repeatable());
		assert!(profile.lookup(&chain, &QName::new(ATOM.uri(), "tag")).is_none());
		assert_eq!(profile.descriptions(&chain).count(), 2);
	}

	#[test]
	fn arbitrary_xml_per_kind() {
		let mut profile = ExtensionProfile::new();
		assert!(profile.allows_arbitrary_xml(&[TypeId::of::<Photo>()]));
		profile.declare_arbitrary_xml::<Photo>(false);
		assert!(!profile.allows_arbitrary_xml(&[TypeId::of::<Photo>(), TypeId::of::<Album>()]));
		profile.set_arbitrary_xml(false);
		assert!(!profile.allows_arbitrary_xml(&[TypeId::of::<Album>()]));
	}

	#[test]
	fn namespace_decls_are_unique() {
		let mut profile = ExtensionProfile::new();
		profile.add_declarations::<Album>();
		profile.declare_additional_namespace(ATOM.clone());
		profile.declare_additional_namespace(ATOM.clone());
		let decls = profile.namespace_decls();
		assert_eq!(decls, vec![ATOM.clone(), TEST_NS.clone()]);
	}
}
