use crate::{
	errors,
	namespace::{
		Namespace,
		QName,
		XML_PREFIX,
		XML_URI,
	},
	Result,
};
use quick_xml::events::{
	BytesDecl,
	BytesEnd,
	BytesStart,
	BytesText,
	Event,
};

/// Serialize root element into full document in memory
///
/// The root element binds its own namespace as default namespace and declares all `namespaces`
/// (using their alias as prefix).
pub fn serialize_document<F>(ns: &Namespace, local: &str, namespaces: &[Namespace], f: F) -> Result<String>
where
	F: FnOnce(&mut ElementSerializer<'_>) -> Result<()>,
{
	let mut serializer = Serializer::new();
	serializer
		.writer
		.write_event(Event::Decl(BytesDecl::new(b"1.0", Some(&b"UTF-8"[..]), None)))?;
	serializer.element(ns, local, Some(namespaces), f)?;
	serializer.into_string()
}

/// Serializer adaptor for `quick_xml::Writer`, writing into memory
///
/// Tracks namespace declarations; elements in namespaces not yet declared get a declaration
/// (with the alias as prefix) added automatically.
pub struct Serializer {
	writer: quick_xml::Writer<Vec<u8>>,
	scopes: Vec<Vec<(String, String)>>,
}

impl Default for Serializer {
	fn default() -> Self {
		Self::new()
	}
}

impl Serializer {
	/// New serializer for a document fragment (no xml declaration)
	pub fn new() -> Self {
		Self {
			writer: quick_xml::Writer::new(Vec::new()),
			scopes: Vec::new(),
		}
	}

	/// Finish and return the written XML
	pub fn into_string(self) -> Result<String> {
		Ok(String::from_utf8(self.writer.into_inner())?)
	}

	fn prefix_for(&self, uri: &str, allow_default: bool) -> Option<&str> {
		if uri == XML_URI {
			return Some(XML_PREFIX);
		}
		let mut shadowed: Vec<&str> = Vec::new();
		for scope in self.scopes.iter().rev() {
			for (prefix, bound) in scope {
				if shadowed.contains(&prefix.as_str()) {
					continue;
				}
				if bound == uri && (allow_default || !prefix.is_empty()) {
					return Some(prefix);
				}
			}
			shadowed.extend(scope.iter().map(|(p, _)| p.as_str()));
		}
		None
	}

	fn bound_uri(&self, prefix: &str) -> Option<&str> {
		self.scopes
			.iter()
			.rev()
			.flat_map(|scope| scope.iter())
			.find(|(p, _)| p == prefix)
			.map(|(_, uri)| uri.as_str())
	}

	// `preferred` unless it is bound (anywhere in scope) already; otherwise `preferred` with a
	// numeric suffix
	fn unused_prefix(&self, preferred: &str) -> String {
		let base = if preferred.is_empty() || preferred.to_ascii_lowercase().starts_with(XML_PREFIX) {
			"ns"
		} else {
			preferred
		};
		if self.bound_uri(base).is_none() {
			return base.to_string();
		}
		let mut n = 0u32;
		loop {
			let candidate = format!("{}{}", base, n);
			if self.bound_uri(&candidate).is_none() {
				return candidate;
			}
			n += 1;
		}
	}

	/// Write element `local` in namespace `ns`
	///
	/// `root_namespaces` makes `ns` the default namespace and declares the passed namespaces.
	pub fn element<F>(&mut self, ns: &Namespace, local: &str, root_namespaces: Option<&[Namespace]>, f: F) -> Result<()>
	where
		F: FnOnce(&mut ElementSerializer<'_>) -> Result<()>,
	{
		let mut scope: Vec<(String, String)> = Vec::new();
		if let Some(namespaces) = root_namespaces {
			scope.push((String::new(), ns.uri().to_string()));
			for n in namespaces {
				if n != ns && !scope.iter().any(|(p, _)| p == n.alias()) {
					scope.push((n.alias().to_string(), n.uri().to_string()));
				}
			}
		}
		self.scopes.push(scope);
		let name = match self.prefix_for(ns.uri(), true) {
			Some("") => local.to_string(),
			Some(prefix) => format!("{}:{}", prefix, local),
			None => {
				let prefix = self.unused_prefix(ns.alias());
				let name = format!("{}:{}", prefix, local);
				if let Some(scope) = self.scopes.last_mut() {
					scope.push((prefix, ns.uri().to_string()));
				}
				name
			},
		};
		let mut start = BytesStart::owned_name(name.clone().into_bytes());
		if let Some(scope) = self.scopes.last() {
			for (prefix, uri) in scope {
				push_xmlns(&mut start, prefix, uri);
			}
		}
		let mut element = ElementSerializer {
			serializer: self,
			start: Some(start),
			end: Some(BytesEnd::owned(name.into_bytes())),
		};
		f(&mut element)?;
		element.close()?;
		self.scopes.pop();
		Ok(())
	}
}

fn push_xmlns(start: &mut BytesStart<'_>, prefix: &str, uri: &str) {
	if prefix.is_empty() {
		start.push_attribute(("xmlns", uri));
	} else {
		start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri));
	}
}

/// Writes a single element: attributes first, then text and nested elements
pub struct ElementSerializer<'s> {
	serializer: &'s mut Serializer,
	start: Option<BytesStart<'static>>,
	end: Option<BytesEnd<'static>>,
}

impl<'s> ElementSerializer<'s> {
	fn start(&mut self) -> Result<()> {
		if let Some(s) = self.start.take() {
			self.serializer.writer.write_event(Event::Start(s))?;
		} else if self.end.is_none() {
			return Err(errors::invalid_state("element already closed"));
		}
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		if let Some(s) = self.start.take() {
			self.serializer.writer.write_event(Event::Empty(s))?;
			self.end = None;
		} else if let Some(e) = self.end.take() {
			self.serializer.writer.write_event(Event::End(e))?;
		}
		Ok(())
	}

	fn pending_start(&mut self) -> Result<&mut BytesStart<'static>> {
		self.start
			.as_mut()
			.ok_or_else(|| errors::invalid_state("attributes must be written before content"))
	}

	/// Add an attribute without namespace
	pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
		self.pending_start()?.push_attribute((name, value));
		Ok(())
	}

	/// Add a namespaced attribute; declares the namespace if necessary
	pub fn attribute_ns(&mut self, ns: &Namespace, name: &str, value: &str) -> Result<()> {
		self.pending_start()?;
		let prefix = match self.serializer.prefix_for(ns.uri(), false) {
			Some(prefix) => prefix.to_string(),
			None => {
				let prefix = self.serializer.unused_prefix(ns.alias());
				if let Some(start) = self.start.as_mut() {
					push_xmlns(start, &prefix, ns.uri());
				}
				if let Some(scope) = self.serializer.scopes.last_mut() {
					scope.push((prefix.clone(), ns.uri().to_string()));
				}
				prefix
			},
		};
		self.attribute(&format!("{}:{}", prefix, name), value)
	}

	/// Add an attribute with a resolved name
	pub fn attribute_qname(&mut self, name: &QName, value: &str) -> Result<()> {
		if name.uri().is_empty() {
			return self.attribute(name.local_name(), value);
		}
		let ns = Namespace::new("ns", name.uri().to_string());
		self.attribute_ns(&ns, name.local_name(), value)
	}

	/// Add text (will be escaped)
	pub fn text(&mut self, text: &str) -> Result<()> {
		self.start()?;
		self.serializer
			.writer
			.write_event(Event::Text(BytesText::from_plain_str(text)))?;
		Ok(())
	}

	/// Add raw (already escaped) XML
	pub fn raw(&mut self, xml: &str) -> Result<()> {
		self.start()?;
		self.serializer
			.writer
			.write_event(Event::Text(BytesText::from_escaped_str(xml)))?;
		Ok(())
	}

	/// Add nested element
	pub fn element<F>(&mut self, ns: &Namespace, local: &str, f: F) -> Result<()>
	where
		F: FnOnce(&mut ElementSerializer<'_>) -> Result<()>,
	{
		self.start()?;
		self.serializer.element(ns, local, None, f)
	}

	/// Add nested element with only text content
	pub fn text_element(&mut self, ns: &Namespace, local: &str, text: &str) -> Result<()> {
		self.element(ns, local, |el| el.text(text))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::namespace::{
		ATOM,
		BATCH,
		GD,
	};

	#[test]
	fn root_declares_namespaces() {
		let xml = serialize_document(&ATOM, "entry", &[GD.clone(), ATOM.clone()], |el| {
			el.attribute_ns(&GD, "etag", "W/\"1\"")?;
			el.text_element(&ATOM, "id", "urn:a&b")?;
			el.element(&GD, "email", |el| el.attribute("address", "a@b"))?;
			el.element(&BATCH, "id", |el| el.text("1"))
		})
		.unwrap();
		assert_eq!(
			xml,
			concat!(
				r#"<?xml version="1.0" encoding="UTF-8"?>"#,
				r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005" gd:etag="W/&quot;1&quot;">"#,
				r#"<id>urn:a&amp;b</id><gd:email address="a@b"/>"#,
				r#"<batch:id xmlns:batch="http://schemas.google.com/gdata/batch">1</batch:id>"#,
				r#"</entry>"#,
			)
		);
	}

	#[test]
	fn generated_prefixes_never_collide() {
		let x = Namespace::new("x", "urn:x");
		let other_x = Namespace::new("x", "urn:other");
		let xml = serialize_document(&ATOM, "entry", &[x.clone()], |el| {
			el.attribute_qname(&QName::new("urn:a", "a"), "1")?;
			el.attribute_qname(&QName::new("urn:b", "b"), "2")?;
			el.attribute_qname(&QName::new("urn:a", "c"), "3")?;
			el.attribute_ns(&other_x, "d", "4")?;
			el.element(&other_x, "inner", |el| el.attribute_ns(&x, "e", "5"))
		})
		.unwrap();
		assert!(xml.ends_with(concat!(
			r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x" xmlns:ns="urn:a" ns:a="1" "#,
			r#"xmlns:ns0="urn:b" ns0:b="2" ns:c="3" xmlns:x0="urn:other" x0:d="4">"#,
			r#"<x0:inner x:e="5"/></entry>"#,
		)));
	}

	#[test]
	fn attributes_after_content_fail() {
		let result = serialize_document(&ATOM, "feed", &[], |el| {
			el.text("x")?;
			el.attribute("a", "b")
		});
		assert!(result.is_err());
	}

	#[test]
	fn raw_is_written_verbatim() {
		let xml = serialize_document(&ATOM, "content", &[], |el| el.raw("<b xmlns=\"urn:b\">x &amp; y</b>")).unwrap();
		assert!(xml.ends_with("<content xmlns=\"http://www.w3.org/2005/Atom\"><b xmlns=\"urn:b\">x &amp; y</b></content>"));
	}
}
