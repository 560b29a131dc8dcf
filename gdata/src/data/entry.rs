use crate::{
	data::{
		atom::{
			read_date,
			rel,
			write_date,
			Category,
			Content,
			Link,
			Person,
			TextConstruct,
		},
		batch,
		media::MediaSource,
	},
	errors,
	extension::{
		ExtensionPoint,
		ExtensionProfile,
		Kind,
	},
	namespace::{
		QName,
		ATOM,
		GD,
	},
	parser::{
		Child,
		ElementState,
	},
	quick_xml::{
		serialize_document,
		Parser,
	},
	serializer::ElementSerializer,
	Result,
};
use chrono::{
	DateTime,
	Utc,
};
use std::{
	any::TypeId,
	fmt,
};
use url::Url;

/// Generic Atom entry
///
/// Everything beyond the Atom base schema lives in `extensions`; concrete entry types wrap an
/// `Entry` and declare their extensions through [`Kind`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entry {
	/// `atom:id`
	pub id: Option<String>,
	/// `atom:title`
	pub title: Option<TextConstruct>,
	/// `atom:summary`
	pub summary: Option<TextConstruct>,
	/// `atom:content`
	pub content: Option<Content>,
	/// `atom:published`
	pub published: Option<DateTime<Utc>>,
	/// `atom:updated`
	pub updated: Option<DateTime<Utc>>,
	/// `gd:etag` attribute
	pub etag: Option<String>,
	/// `atom:author` elements
	pub authors: Vec<Person>,
	/// `atom:contributor` elements
	pub contributors: Vec<Person>,
	/// `atom:category` elements
	pub categories: Vec<Category>,
	/// `atom:link` elements
	pub links: Vec<Link>,
	/// Declared extensions, unrecognized attributes and markup
	pub extensions: ExtensionPoint,
	/// Media to upload with this entry (not part of the XML)
	pub media: Option<MediaSource>,
	/// URL the entry was retrieved from; base for relative links
	pub source_url: Option<Url>,
}

impl Entry {
	/// First link with the given relation
	pub fn link(&self, rel: &str) -> Option<&Link> {
		self.links.iter().find(|link| link.has_rel(rel))
	}

	/// First link with the given relation and type
	pub fn link_with_type(&self, rel: &str, link_type: &str) -> Option<&Link> {
		self.links
			.iter()
			.find(|link| link.has_rel(rel) && link.link_type.as_deref() == Some(link_type))
	}

	/// Replace all links with the given relation by a single new one
	pub fn set_link(&mut self, link: Link) {
		let rel = link.rel.clone().unwrap_or_else(|| rel::ALTERNATE.to_string());
		self.links.retain(|l| !l.has_rel(&rel));
		self.links.push(link);
	}

	/// `self` link
	pub fn self_link(&self) -> Option<&Link> {
		self.link(rel::SELF)
	}

	/// `edit` link
	pub fn edit_link(&self) -> Option<&Link> {
		self.link(rel::EDIT)
	}

	/// `edit-media` link
	pub fn media_edit_link(&self) -> Option<&Link> {
		self.link(rel::EDIT_MEDIA)
	}

	/// Absolute URL of the first link with the given relation
	///
	/// Relative links are resolved against `source_url`.
	pub fn resolve_link(&self, rel: &str) -> Result<Option<Url>> {
		match self.link(rel) {
			None => Ok(None),
			Some(link) => Ok(Some(resolve_href(self.source_url.as_ref(), &link.href)?)),
		}
	}
}

pub(crate) fn resolve_href(base: Option<&Url>, href: &str) -> Result<Url> {
	Ok(match base {
		Some(base) => base.join(href)?,
		None => Url::parse(href)?,
	})
}

impl Kind for Entry {
	fn declare_extensions(profile: &mut ExtensionProfile) {
		batch::declare_entry_extensions(profile);
	}
}

/// Concrete entry schema
///
/// Implementations wrap an [`Entry`]; their `Kind::declare_extensions` should call
/// `profile.add_declarations::<Entry>()` and declare the schema's extensions on `Self`.
pub trait EntryType: Kind + Clone + Default + fmt::Debug + PartialEq + Send + Sync {
	/// The generic entry data
	fn entry(&self) -> &Entry;

	/// The generic entry data for modification
	fn entry_mut(&mut self) -> &mut Entry;

	/// Declare extensions on feeds of this entry type (`Feed<Self>`)
	fn declare_feed_extensions(profile: &mut ExtensionProfile) {
		let _ = profile;
	}
}

impl EntryType for Entry {
	fn entry(&self) -> &Entry {
		self
	}

	fn entry_mut(&mut self) -> &mut Entry {
		self
	}
}

/// Container types to look up extensions of entries of type `E` (most specific first)
pub(crate) fn entry_kinds<E: EntryType>() -> Vec<TypeId> {
	let mut kinds = vec![TypeId::of::<E>()];
	if TypeId::of::<E>() != TypeId::of::<Entry>() {
		kinds.push(TypeId::of::<Entry>());
	}
	kinds
}

struct EntryState<'a, E> {
	entry: E,
	kinds: &'a [TypeId],
	profile: &'a ExtensionProfile,
}

impl<E: EntryType> ElementState for EntryState<'_, E> {
	fn parse_element_attribute(&mut self, name: &QName, value: String) -> Result<()> {
		let entry = self.entry.entry_mut();
		if name.is(&GD, "etag") {
			entry.etag = Some(value);
		} else {
			entry.extensions.add_attribute(name.clone(), value);
		}
		Ok(())
	}

	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		let entry = self.entry.entry_mut();
		if child.name().uri() != ATOM.uri() {
			return entry.extensions.parse_child(self.kinds, self.profile, child);
		}
		let local = child.name().local_name().to_string();
		match local.as_str() {
			"id" => entry.id = Some(child.text()?.trim().to_string()),
			"title" => entry.title = Some(TextConstruct::read(child)?),
			"summary" => entry.summary = Some(TextConstruct::read(child)?),
			"content" => entry.content = Some(Content::read(child)?),
			"published" => entry.published = Some(read_date(child)?),
			"updated" => entry.updated = Some(read_date(child)?),
			"author" => entry.authors.push(Person::read(child)?),
			"contributor" => entry.contributors.push(Person::read(child)?),
			"category" => entry.categories.push(Category::read(child)?),
			"link" => entry.links.push(Link::read(child)?),
			_ => return entry.extensions.parse_child(self.kinds, self.profile, child),
		}
		Ok(())
	}
}

pub(crate) fn read_entry<E: EntryType>(child: Child<'_, '_>, kinds: &[TypeId], profile: &ExtensionProfile) -> Result<E> {
	if !child.is(&ATOM, "entry") {
		return Err(errors::unexpected_element(&child.name().to_string()));
	}
	let mut state = EntryState {
		entry: E::default(),
		kinds,
		profile,
	};
	child.parse(&mut state)?;
	state.entry.entry().extensions.check_required(kinds, profile)?;
	Ok(state.entry)
}

pub(crate) fn write_entry(entry: &Entry, kinds: &[TypeId], el: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()> {
	if profile.strict_validation() {
		entry.extensions.check_required(kinds, profile)?;
	}
	if let Some(etag) = &entry.etag {
		el.attribute_ns(&GD, "etag", etag)?;
	}
	entry.extensions.generate_attributes(el)?;
	if let Some(id) = &entry.id {
		el.text_element(&ATOM, "id", id)?;
	}
	if let Some(published) = &entry.published {
		write_date(el, "published", published)?;
	}
	if let Some(updated) = &entry.updated {
		write_date(el, "updated", updated)?;
	}
	for category in &entry.categories {
		category.write(el)?;
	}
	if let Some(title) = &entry.title {
		title.write(el, "title")?;
	}
	if let Some(summary) = &entry.summary {
		summary.write(el, "summary")?;
	}
	if let Some(content) = &entry.content {
		content.write(el)?;
	}
	for link in &entry.links {
		link.write(el)?;
	}
	for author in &entry.authors {
		author.write(el, "author")?;
	}
	for contributor in &entry.contributors {
		contributor.write(el, "contributor")?;
	}
	entry.extensions.generate(el, profile)
}

/// Parse an entry document
///
/// The profile must contain the declarations of `E` (see `ExtensionProfile::add_declarations`).
pub fn parse_entry<E: EntryType>(input: &[u8], profile: &ExtensionProfile) -> Result<E> {
	let kinds = entry_kinds::<E>();
	let mut result = None;
	Parser::new(input).parse_document(|child| {
		result = Some(read_entry::<E>(child, &kinds, profile)?);
		Ok(())
	})?;
	result.ok_or_else(|| errors::unexpected_eof("missing entry"))
}

/// Generate an entry document
pub fn generate_entry<E: EntryType>(entry: &E, profile: &ExtensionProfile) -> Result<String> {
	let kinds = entry_kinds::<E>();
	serialize_document(&ATOM, "entry", &profile.namespace_decls(), |el| {
		write_entry(entry.entry(), &kinds, el, profile)
	})
}
