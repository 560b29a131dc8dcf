//! Atom constructs shared by feeds and entries

use crate::{
	errors,
	namespace::{
		QName,
		ATOM,
	},
	parser::{
		Child,
		ElementState,
		MarkupState,
	},
	serializer::ElementSerializer,
	Result,
};
use chrono::{
	DateTime,
	SecondsFormat,
	Utc,
};
use std::{
	fmt,
	str::FromStr,
};

/// Well known link relations
pub mod rel {
	/// The resource itself
	pub const SELF: &str = "self";
	/// Editable version of an entry
	pub const EDIT: &str = "edit";
	/// Editable media of a media entry
	pub const EDIT_MEDIA: &str = "edit-media";
	/// Alternate representation (usually HTML)
	pub const ALTERNATE: &str = "alternate";
	/// Next page of a feed
	pub const NEXT: &str = "next";
	/// Previous page of a feed
	pub const PREVIOUS: &str = "previous";
	/// The feed an entry or feed belongs to
	pub const FEED: &str = "http://schemas.google.com/g/2005#feed";
	/// Where new entries are posted
	pub const POST: &str = "http://schemas.google.com/g/2005#post";
	/// Batch processing URL of a feed
	pub const BATCH: &str = "http://schemas.google.com/g/2005#batch";
}

/// `atom:link`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Link {
	/// Relation (`alternate` if missing)
	pub rel: Option<String>,
	/// Media type of the target
	pub link_type: Option<String>,
	/// Target URL (may be relative)
	pub href: String,
	/// Language of the target
	pub hreflang: Option<String>,
	/// Human readable title
	pub title: Option<String>,
	/// Size of the target in bytes
	pub length: Option<u64>,
}

impl Link {
	/// Link with relation, type and target
	pub fn new(rel: &str, link_type: Option<&str>, href: impl Into<String>) -> Self {
		Self {
			rel: Some(rel.to_string()),
			link_type: link_type.map(str::to_string),
			href: href.into(),
			..Self::default()
		}
	}

	/// Whether the link has the given relation (missing relation counts as `alternate`)
	pub fn has_rel(&self, rel: &str) -> bool {
		self.rel.as_deref().unwrap_or(rel::ALTERNATE) == rel
	}

	pub(crate) fn read(child: Child<'_, '_>) -> Result<Self> {
		let mut link = Self::default();
		for (name, value) in child.attributes() {
			if !name.uri().is_empty() {
				continue;
			}
			match name.local_name() {
				"rel" => link.rel = Some(value.clone()),
				"type" => link.link_type = Some(value.clone()),
				"href" => link.href = value.clone(),
				"hreflang" => link.hreflang = Some(value.clone()),
				"title" => link.title = Some(value.clone()),
				"length" => {
					link.length = Some(value.trim().parse().map_err(|_| errors::invalid_value("length", value))?)
				},
				_ => (),
			}
		}
		child.skip()?;
		Ok(link)
	}

	pub(crate) fn write(&self, element: &mut ElementSerializer<'_>) -> Result<()> {
		element.element(&ATOM, "link", |el| {
			if let Some(rel) = &self.rel {
				el.attribute("rel", rel)?;
			}
			if let Some(link_type) = &self.link_type {
				el.attribute("type", link_type)?;
			}
			el.attribute("href", &self.href)?;
			if let Some(hreflang) = &self.hreflang {
				el.attribute("hreflang", hreflang)?;
			}
			if let Some(title) = &self.title {
				el.attribute("title", title)?;
			}
			if let Some(length) = self.length {
				el.attribute("length", &length.to_string())?;
			}
			Ok(())
		})
	}
}

/// `atom:category`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Category {
	/// Categorization scheme
	pub scheme: Option<String>,
	/// Category within the scheme
	pub term: String,
	/// Human readable label
	pub label: Option<String>,
}

impl Category {
	/// Category with optional scheme
	pub fn new(scheme: Option<&str>, term: impl Into<String>) -> Self {
		Self {
			scheme: scheme.map(str::to_string),
			term: term.into(),
			label: None,
		}
	}

	pub(crate) fn read(child: Child<'_, '_>) -> Result<Self> {
		let mut category = Self::default();
		for (name, value) in child.attributes() {
			if !name.uri().is_empty() {
				continue;
			}
			match name.local_name() {
				"scheme" => category.scheme = Some(value.clone()),
				"term" => category.term = value.clone(),
				"label" => category.label = Some(value.clone()),
				_ => (),
			}
		}
		child.skip()?;
		Ok(category)
	}

	pub(crate) fn write(&self, element: &mut ElementSerializer<'_>) -> Result<()> {
		element.element(&ATOM, "category", |el| {
			if let Some(scheme) = &self.scheme {
				el.attribute("scheme", scheme)?;
			}
			el.attribute("term", &self.term)?;
			if let Some(label) = &self.label {
				el.attribute("label", label)?;
			}
			Ok(())
		})
	}
}

/// `atom:author` / `atom:contributor`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Person {
	/// Display name
	pub name: Option<String>,
	/// Email address
	pub email: Option<String>,
	/// Home page
	pub uri: Option<String>,
}

impl Person {
	/// Person with name and email
	pub fn new(name: impl Into<String>, email: Option<&str>) -> Self {
		Self {
			name: Some(name.into()),
			email: email.map(str::to_string),
			uri: None,
		}
	}

	pub(crate) fn read(child: Child<'_, '_>) -> Result<Self> {
		let mut state = PersonState(Self::default());
		child.parse(&mut state)?;
		Ok(state.0)
	}

	pub(crate) fn write(&self, element: &mut ElementSerializer<'_>, local: &str) -> Result<()> {
		element.element(&ATOM, local, |el| {
			if let Some(name) = &self.name {
				el.text_element(&ATOM, "name", name)?;
			}
			if let Some(email) = &self.email {
				el.text_element(&ATOM, "email", email)?;
			}
			if let Some(uri) = &self.uri {
				el.text_element(&ATOM, "uri", uri)?;
			}
			Ok(())
		})
	}
}

struct PersonState(Person);

impl ElementState for PersonState {
	fn parse_element_attribute(&mut self, _name: &QName, _value: String) -> Result<()> {
		Ok(())
	}

	fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
		if child.name().uri() != ATOM.uri() {
			return child.skip();
		}
		let local = child.name().local_name().to_string();
		let field = match local.as_str() {
			"name" => &mut self.0.name,
			"email" => &mut self.0.email,
			"uri" => &mut self.0.uri,
			_ => return child.skip(),
		};
		*field = Some(child.text()?.trim().to_string());
		Ok(())
	}
}

/// Type of an Atom text construct
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextKind {
	/// Plain text
	Text,
	/// Escaped HTML
	Html,
	/// Inline XHTML markup
	Xhtml,
}

impl Default for TextKind {
	fn default() -> Self {
		Self::Text
	}
}

impl TextKind {
	/// Value of the `type` attribute
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::Html => "html",
			Self::Xhtml => "xhtml",
		}
	}
}

impl FromStr for TextKind {
	type Err = crate::Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"text" => Ok(Self::Text),
			"html" => Ok(Self::Html),
			"xhtml" => Ok(Self::Xhtml),
			_ => Err(errors::invalid_value("type", s)),
		}
	}
}

/// Atom text construct (`title`, `subtitle`, `summary`, ...)
///
/// For `Xhtml` the value holds the (escaped) markup, otherwise the plain text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextConstruct {
	/// Text type
	pub kind: TextKind,
	/// Text or markup
	pub value: String,
}

impl TextConstruct {
	/// Plain text construct
	pub fn plain(value: impl Into<String>) -> Self {
		Self {
			kind: TextKind::Text,
			value: value.into(),
		}
	}

	/// HTML text construct
	pub fn html(value: impl Into<String>) -> Self {
		Self {
			kind: TextKind::Html,
			value: value.into(),
		}
	}

	pub(crate) fn read(child: Child<'_, '_>) -> Result<Self> {
		let kind = child.attribute("type").map_or(Ok(TextKind::Text), str::parse)?;
		let mut state = MarkupState::default();
		child.parse(&mut state)?;
		let value = match kind {
			TextKind::Xhtml => state.markup.trim().to_string(),
			_ => state.text,
		};
		Ok(Self { kind, value })
	}

	pub(crate) fn write(&self, element: &mut ElementSerializer<'_>, local: &str) -> Result<()> {
		element.element(&ATOM, local, |el| {
			if self.kind != TextKind::Text {
				el.attribute("type", self.kind.as_str())?;
			}
			match self.kind {
				TextKind::Xhtml => el.raw(&self.value),
				_ => el.text(&self.value),
			}
		})
	}
}

impl fmt::Display for TextConstruct {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.value)
	}
}

/// `atom:content`: inline text/markup or a reference to out-of-line content
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Content {
	/// `text`, `html`, `xhtml` or a media type
	pub content_type: Option<String>,
	/// Location of out-of-line content
	pub src: Option<String>,
	/// Inline content (markup for `xhtml`)
	pub value: String,
}

impl Content {
	/// Inline plain text
	pub fn text(value: impl Into<String>) -> Self {
		Self {
			content_type: None,
			src: None,
			value: value.into(),
		}
	}

	/// Out-of-line content (e.g. media of a media entry)
	pub fn out_of_line(content_type: &str, src: impl Into<String>) -> Self {
		Self {
			content_type: Some(content_type.to_string()),
			src: Some(src.into()),
			value: String::new(),
		}
	}

	fn is_xhtml(&self) -> bool {
		self.content_type.as_deref() == Some("xhtml")
	}

	pub(crate) fn read(child: Child<'_, '_>) -> Result<Self> {
		let mut content = Self {
			content_type: child.attribute("type").map(str::to_string),
			src: child.attribute("src").map(str::to_string),
			value: String::new(),
		};
		let mut state = MarkupState::default();
		child.parse(&mut state)?;
		content.value = if content.is_xhtml() || state.has_elements {
			state.markup.trim().to_string()
		} else {
			state.text
		};
		Ok(content)
	}

	pub(crate) fn write(&self, element: &mut ElementSerializer<'_>) -> Result<()> {
		element.element(&ATOM, "content", |el| {
			if let Some(content_type) = &self.content_type {
				el.attribute("type", content_type)?;
			}
			if let Some(src) = &self.src {
				el.attribute("src", src)?;
			}
			if self.value.is_empty() {
				return Ok(());
			}
			if self.is_xhtml() {
				el.raw(&self.value)
			} else {
				el.text(&self.value)
			}
		})
	}
}

pub(crate) fn read_date(child: Child<'_, '_>) -> Result<DateTime<Utc>> {
	let key = child.name().local_name().to_string();
	let text = child.text()?;
	DateTime::parse_from_rfc3339(text.trim())
		.map(|date| date.with_timezone(&Utc))
		.map_err(|_| errors::invalid_value(&key, &text))
}

/// RFC 3339 with millisecond precision in UTC, as GData servers write timestamps
pub fn format_date(date: &DateTime<Utc>) -> String {
	date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn write_date(element: &mut ElementSerializer<'_>, local: &str, date: &DateTime<Utc>) -> Result<()> {
	element.text_element(&ATOM, local, &format_date(date))
}
