use crate::{
	data::{
		atom::{
			read_date,
			rel,
			write_date,
			Category,
			Link,
			Person,
			TextConstruct,
		},
		batch,
		entry::{
			entry_kinds,
			read_entry,
			resolve_href,
			write_entry,
		},
		Entry,
		EntryType,
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
		OPENSEARCH,
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
use std::any::TypeId;
use url::Url;

/// Atom feed of entries of type `E`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feed<E> {
	/// `atom:id`
	pub id: Option<String>,
	/// `atom:title`
	pub title: Option<TextConstruct>,
	/// `atom:subtitle`
	pub subtitle: Option<TextConstruct>,
	/// `atom:updated`
	pub updated: Option<DateTime<Utc>>,
	/// `gd:etag` attribute
	pub etag: Option<String>,
	/// `atom:author` elements
	pub authors: Vec<Person>,
	/// `atom:category` elements
	pub categories: Vec<Category>,
	/// `atom:link` elements
	pub links: Vec<Link>,
	/// `openSearch:totalResults`
	pub total_results: Option<u32>,
	/// `openSearch:startIndex`
	pub start_index: Option<u32>,
	/// `openSearch:itemsPerPage`
	pub items_per_page: Option<u32>,
	/// The entries, in document order
	pub entries: Vec<E>,
	/// Declared extensions, unrecognized attributes and markup
	pub extensions: ExtensionPoint,
	/// URL the feed was retrieved from; base for relative links
	pub source_url: Option<Url>,
}

impl<E> Feed<E> {
	/// Empty feed
	pub fn new() -> Self
	where
		E: Default,
	{
		Self::default()
	}

	/// First link with the given relation
	pub fn link(&self, rel: &str) -> Option<&Link> {
		self.links.iter().find(|link| link.has_rel(rel))
	}

	/// Absolute URL of the first link with the given relation
	pub fn resolve_link(&self, rel: &str) -> Result<Option<Url>> {
		match self.link(rel) {
			None => Ok(None),
			Some(link) => Ok(Some(resolve_href(self.source_url.as_ref(), &link.href)?)),
		}
	}

	/// Where new entries are posted
	pub fn post_url(&self) -> Result<Option<Url>> {
		self.resolve_link(rel::POST)
	}

	/// Batch processing URL
	pub fn batch_url(&self) -> Result<Option<Url>> {
		self.resolve_link(rel::BATCH)
	}

	/// Next page
	pub fn next_url(&self) -> Result<Option<Url>> {
		self.resolve_link(rel::NEXT)
	}
}

impl<E: EntryType> Kind for Feed<E> {
	fn declare_extensions(profile: &mut ExtensionProfile) {
		if TypeId::of::<E>() == TypeId::of::<Entry>() {
			batch::declare_feed_extensions(profile);
		} else {
			profile.add_declarations::<Feed<Entry>>();
		}
		profile.add_declarations::<Entry>();
		profile.add_declarations::<E>();
		E::declare_feed_extensions(profile);
	}
}

pub(crate) fn feed_kinds<E: EntryType>() -> Vec<TypeId> {
	let mut kinds = vec![TypeId::of::<Feed<E>>()];
	if TypeId::of::<E>() != TypeId::of::<Entry>() {
		kinds.push(TypeId::of::<Feed<Entry>>());
	}
	kinds
}

struct FeedState<'a, E> {
	feed: Feed<E>,
	kinds: &'a [TypeId],
	entry_kinds: &'a [TypeId],
	profile: &'a ExtensionProfile,
}

fn read_count(child: Child<'_, '_>) -> Result<u32> {
	let local = child.name().local_name().to_string();
	let text = child.text()?;
	text.trim().parse().map_err(|_| errors::invalid_value(&local, &text))
}

impl<E: EntryType> ElementState for FeedState<'_, E> {
	fn parse_element_attribute(&mut self, name: &QName, value: String) -> Result<()> {
		if name.is(&GD, "etag") {
			self.feed.etag = Some(value);
		} else {
			self.feed.extensions.add_attribute(name.clone(), value);
		}
		Ok(())
	}

	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		let feed = &mut self.feed;
		if child.name().uri() == OPENSEARCH.uri() {
			let local = child.name().local_name().to_string();
			let target = match local.as_str() {
				"totalResults" => &mut feed.total_results,
				"startIndex" => &mut feed.start_index,
				"itemsPerPage" => &mut feed.items_per_page,
				_ => return feed.extensions.parse_child(self.kinds, self.profile, child),
			};
			*target = Some(read_count(child)?);
			return Ok(());
		}
		if child.name().uri() != ATOM.uri() {
			return feed.extensions.parse_child(self.kinds, self.profile, child);
		}
		let local = child.name().local_name().to_string();
		match local.as_str() {
			"id" => feed.id = Some(child.text()?.trim().to_string()),
			"title" => feed.title = Some(TextConstruct::read(child)?),
			"subtitle" => feed.subtitle = Some(TextConstruct::read(child)?),
			"updated" => feed.updated = Some(read_date(child)?),
			"author" => feed.authors.push(Person::read(child)?),
			"category" => feed.categories.push(Category::read(child)?),
			"link" => feed.links.push(Link::read(child)?),
			"entry" => feed.entries.push(read_entry(child, self.entry_kinds, self.profile)?),
			_ => return feed.extensions.parse_child(self.kinds, self.profile, child),
		}
		Ok(())
	}
}

fn write_feed<E: EntryType>(feed: &Feed<E>, el: &mut ElementSerializer<'_>, profile: &ExtensionProfile) -> Result<()> {
	let kinds = feed_kinds::<E>();
	let entry_kinds = entry_kinds::<E>();
	if profile.strict_validation() {
		feed.extensions.check_required(&kinds, profile)?;
	}
	if let Some(etag) = &feed.etag {
		el.attribute_ns(&GD, "etag", etag)?;
	}
	feed.extensions.generate_attributes(el)?;
	if let Some(id) = &feed.id {
		el.text_element(&ATOM, "id", id)?;
	}
	if let Some(updated) = &feed.updated {
		write_date(el, "updated", updated)?;
	}
	for category in &feed.categories {
		category.write(el)?;
	}
	if let Some(title) = &feed.title {
		title.write(el, "title")?;
	}
	if let Some(subtitle) = &feed.subtitle {
		subtitle.write(el, "subtitle")?;
	}
	for link in &feed.links {
		link.write(el)?;
	}
	for author in &feed.authors {
		author.write(el, "author")?;
	}
	for (local, value) in [
		("totalResults", feed.total_results),
		("startIndex", feed.start_index),
		("itemsPerPage", feed.items_per_page),
	] {
		if let Some(value) = value {
			el.text_element(&OPENSEARCH, local, &value.to_string())?;
		}
	}
	feed.extensions.generate(el, profile)?;
	for entry in &feed.entries {
		el.element(&ATOM, "entry", |el| write_entry(entry.entry(), &entry_kinds, el, profile))?;
	}
	Ok(())
}

/// Parse a feed document
///
/// The profile must contain the declarations of `Feed<E>` (see
/// `ExtensionProfile::add_declarations`).
pub fn parse_feed<E: EntryType>(input: &[u8], profile: &ExtensionProfile) -> Result<Feed<E>> {
	let kinds = feed_kinds::<E>();
	let entry_kinds = entry_kinds::<E>();
	let mut result = None;
	Parser::new(input).parse_document(|child| {
		if !child.is(&ATOM, "feed") {
			return Err(errors::unexpected_element(&child.name().to_string()));
		}
		let mut state = FeedState {
			feed: Feed::default(),
			kinds: &kinds,
			entry_kinds: &entry_kinds,
			profile,
		};
		child.parse(&mut state)?;
		state.feed.extensions.check_required(&kinds, profile)?;
		result = Some(state.feed);
		Ok(())
	})?;
	result.ok_or_else(|| errors::unexpected_eof("missing feed"))
}

/// Generate a feed document
pub fn generate_feed<E: EntryType>(feed: &Feed<E>, profile: &ExtensionProfile) -> Result<String> {
	let mut namespaces = profile.namespace_decls();
	if !namespaces.contains(&OPENSEARCH) {
		namespaces.push(OPENSEARCH);
	}
	serialize_document(&ATOM, "feed", &namespaces, |el| write_feed(feed, el, profile))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		data::batch::{
			BatchOperation,
			BatchOperationType,
			BatchStatus,
		},
		test_struct::*,
	};

	const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:openSearch="http://a9.com/-/spec/opensearch/1.1/"
		xmlns:batch="http://schemas.google.com/gdata/batch" xmlns:t="urn:test" xmlns:gd="http://schemas.google.com/g/2005"
		gd:etag="W/&quot;feed&quot;">
	<id>http://x/feed</id>
	<updated>2012-01-01T00:00:00.000Z</updated>
	<title>Photos</title>
	<link rel="http://schemas.google.com/g/2005#post" type="application/atom+xml" href="/feed"/>
	<link rel="http://schemas.google.com/g/2005#batch" type="application/atom+xml" href="batch"/>
	<openSearch:totalResults>2</openSearch:totalResults>
	<openSearch:startIndex>1</openSearch:startIndex>
	<t:tag>album</t:tag>
	<entry><id>1</id><t:rating value="3"/><batch:status code="201" reason="Created"/></entry>
	<entry><id>2</id><t:rating value="5"/><t:tag>x</t:tag></entry>
</feed>"#;

	fn profile() -> ExtensionProfile {
		let mut profile = ExtensionProfile::new();
		profile.add_declarations::<Feed<PhotoEntry>>();
		profile
	}

	#[test]
	fn declares_base_kinds() {
		let profile = profile();
		assert!(profile.is_declared::<Feed<Entry>>());
		assert!(profile.is_declared::<Entry>());
		assert!(profile.is_declared::<PhotoEntry>());
		let kinds = feed_kinds::<PhotoEntry>();
		assert!(profile.lookup(&kinds, &QName::new(crate::namespace::BATCH.uri(), "operation")).is_some());
	}

	#[test]
	fn parse_typed_feed() {
		let profile = profile();
		let mut feed: Feed<PhotoEntry> = parse_feed(FEED.as_bytes(), &profile).unwrap();
		assert_eq!(feed.etag.as_deref(), Some("W/\"feed\""));
		assert_eq!(feed.total_results, Some(2));
		assert_eq!(feed.start_index, Some(1));
		assert_eq!(feed.items_per_page, None);
		assert_eq!(feed.extensions.repeating_extension::<Tag>(), &[Tag::new("album")]);
		let ids: Vec<_> = feed.entries.iter().map(|e| e.entry.id.clone().unwrap()).collect();
		assert_eq!(ids, vec!["1", "2"]);
		assert_eq!(batch::status(&feed.entries[0].entry).map(BatchStatus::code), Some(201));
		assert!(batch::is_success(&feed.entries[0].entry));

		assert!(feed.post_url().is_err());
		feed.source_url = Some(Url::parse("http://x/feed/").unwrap());
		assert_eq!(feed.post_url().unwrap().unwrap().as_str(), "http://x/feed");
		assert_eq!(feed.batch_url().unwrap().unwrap().as_str(), "http://x/feed/batch");
		assert_eq!(feed.next_url().unwrap(), None);
	}

	#[test]
	fn generate_then_parse() {
		let profile = profile();
		let mut feed: Feed<PhotoEntry> = parse_feed(FEED.as_bytes(), &profile).unwrap();
		batch::set_operation(&mut feed.extensions, BatchOperationType::Delete);
		let xml = generate_feed(&feed, &profile).unwrap();
		assert!(xml.contains("<openSearch:totalResults>2</openSearch:totalResults>"));
		let reparsed: Feed<PhotoEntry> = parse_feed(xml.as_bytes(), &profile).unwrap();
		assert_eq!(reparsed, feed);
		assert_eq!(
			reparsed.extensions.extension::<BatchOperation>().and_then(BatchOperation::operation_type),
			Some(BatchOperationType::Delete)
		);
	}

	#[test]
	fn entry_errors_propagate() {
		let profile = profile();
		let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><id>1</id></entry></feed>"#;
		assert!(parse_feed::<PhotoEntry>(xml.as_bytes(), &profile).is_err());
		let generic: Feed<Entry> = parse_feed(xml.as_bytes(), &profile).unwrap();
		assert_eq!(generic.entries.len(), 1);
		assert!(parse_feed::<Entry>(br#"<entry xmlns="http://www.w3.org/2005/Atom"/>"#, &profile).is_err());
		assert!(parse_feed::<Entry>(br#"<feed xmlns="http://www.w3.org/2005/Atom"><openSearch:totalResults xmlns:openSearch="http://a9.com/-/spec/opensearch/1.1/">lots</openSearch:totalResults></feed>"#, &profile).is_err());
	}
}
