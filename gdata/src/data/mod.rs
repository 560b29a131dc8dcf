//! Atom data model: feeds, entries and the extensions every GData service understands

pub mod atom;
pub mod batch;
mod entry;
mod feed;
pub mod media;

pub use self::{
	atom::{
		Category,
		Content,
		Link,
		Person,
		TextConstruct,
		TextKind,
	},
	entry::{
		generate_entry,
		parse_entry,
		Entry,
		EntryType,
	},
	feed::{
		generate_feed,
		parse_feed,
		Feed,
	},
	media::MediaSource,
};
