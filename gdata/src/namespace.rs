//! XML namespaces and qualified names

use std::{
	borrow::Cow,
	fmt,
	hash::{
		Hash,
		Hasher,
	},
};

/// XML namespace with a preferred prefix (alias)
///
/// Namespaces compare (and hash) by URI only; the alias is just a hint for serialization.
#[derive(Clone, Debug)]
pub struct Namespace {
	alias: Cow<'static, str>,
	uri: Cow<'static, str>,
}

impl Namespace {
	/// Namespace from static strings (usable in constants)
	pub const fn new_static(alias: &'static str, uri: &'static str) -> Self {
		Self {
			alias: Cow::Borrowed(alias),
			uri: Cow::Borrowed(uri),
		}
	}

	/// New namespace
	pub fn new(alias: impl Into<Cow<'static, str>>, uri: impl Into<Cow<'static, str>>) -> Self {
		Self {
			alias: alias.into(),
			uri: uri.into(),
		}
	}

	/// Preferred prefix
	pub fn alias(&self) -> &str {
		&self.alias
	}

	/// Namespace URI
	pub fn uri(&self) -> &str {
		&self.uri
	}
}

impl PartialEq for Namespace {
	fn eq(&self, other: &Self) -> bool {
		self.uri == other.uri
	}
}

impl Eq for Namespace {}

impl Hash for Namespace {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.uri.hash(state)
	}
}

/// `http://www.w3.org/2005/Atom`
pub const ATOM: Namespace = Namespace::new_static("atom", "http://www.w3.org/2005/Atom");
/// `http://schemas.google.com/g/2005`
pub const GD: Namespace = Namespace::new_static("gd", "http://schemas.google.com/g/2005");
/// `http://schemas.google.com/gdata/batch`
pub const BATCH: Namespace = Namespace::new_static("batch", "http://schemas.google.com/gdata/batch");
/// `http://a9.com/-/spec/opensearch/1.1/`
pub const OPENSEARCH: Namespace = Namespace::new_static("openSearch", "http://a9.com/-/spec/opensearch/1.1/");
/// `http://www.w3.org/2007/app`
pub const APP: Namespace = Namespace::new_static("app", "http://www.w3.org/2007/app");
/// Prefix always bound to the XML namespace
pub const XML_PREFIX: &str = "xml";
/// URI of the XML namespace
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// `http://www.w3.org/XML/1998/namespace`; always bound to the `xml` prefix
pub const XML: Namespace = Namespace::new_static(XML_PREFIX, XML_URI);

/// Resolved (namespace URI + local name) element or attribute name
///
/// An empty URI means "no namespace".
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
	uri: String,
	local: String,
}

impl QName {
	/// New name
	pub fn new(uri: impl Into<String>, local: impl Into<String>) -> Self {
		Self {
			uri: uri.into(),
			local: local.into(),
		}
	}

	/// Name without namespace
	pub fn local(local: impl Into<String>) -> Self {
		Self::new(String::new(), local)
	}

	/// Namespace URI (empty without namespace)
	pub fn uri(&self) -> &str {
		&self.uri
	}

	/// Local name
	pub fn local_name(&self) -> &str {
		&self.local
	}

	/// Whether name is in the given namespace with the given local name
	pub fn is(&self, ns: &Namespace, local: &str) -> bool {
		self.uri == ns.uri() && self.local == local
	}
}

impl fmt::Display for QName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.uri.is_empty() {
			f.write_str(&self.local)
		} else {
			write!(f, "{}:{}", self.uri, self.local)
		}
	}
}
