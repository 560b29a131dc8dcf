use crate::{
	errors,
	namespace::{
		Namespace,
		QName,
		XML_PREFIX,
		XML_URI,
	},
	parser::{
		ElementState,
		IgnoreElement,
		TextState,
	},
	Result,
};
use quick_xml::events::{
	BytesEnd,
	BytesStart,
	Event,
};
use std::collections::BTreeSet;

/// Namespace aware parser adaptor for `quick_xml::Reader` on in-memory documents
pub struct Parser<'x> {
	reader: quick_xml::Reader<&'x [u8]>,
	buf: Vec<u8>,
	// (prefix, uri) declarations per open element; the empty prefix is the default namespace
	scopes: Vec<Vec<(String, String)>>,
}

struct StartTag {
	start: BytesStart<'static>,
	name: QName,
	attributes: Vec<(QName, String)>,
}

impl<'x> Parser<'x> {
	/// Create a new parser reading from `input`
	pub fn new(input: &'x [u8]) -> Self {
		Self {
			reader: quick_xml::Reader::from_reader(input),
			buf: Vec::new(),
			scopes: Vec::new(),
		}
	}

	fn next(&mut self) -> Result<Event<'static>> {
		self.buf.clear();
		Ok(self.reader.read_event(&mut self.buf)?.into_owned())
	}

	fn lookup(&self, prefix: &str, skip_innermost: bool) -> Option<&str> {
		if prefix == XML_PREFIX {
			return Some(XML_URI);
		}
		let scopes = if skip_innermost && !self.scopes.is_empty() {
			&self.scopes[..self.scopes.len() - 1]
		} else {
			&self.scopes[..]
		};
		scopes
			.iter()
			.rev()
			.flat_map(|scope| scope.iter())
			.find(|(p, _)| p == prefix)
			.map(|(_, uri)| uri.as_str())
	}

	fn resolve(&self, raw: &str, attribute: bool) -> Result<QName> {
		match raw.find(':') {
			Some(pos) => {
				let (prefix, local) = (&raw[..pos], &raw[pos + 1..]);
				match self.lookup(prefix, false) {
					Some(uri) => Ok(QName::new(uri, local)),
					None => Err(errors::unknown_prefix(prefix)),
				}
			},
			None if attribute => Ok(QName::local(raw)),
			None => Ok(QName::new(self.lookup("", false).unwrap_or(""), raw)),
		}
	}

	// opens a new namespace scope; closed when the `Child` gets consumed
	fn open(&mut self, start: BytesStart<'static>) -> Result<StartTag> {
		let mut scope = Vec::new();
		let mut raw_attributes = Vec::new();
		for attr in start.attributes() {
			let attr = attr?;
			let key = self.reader.decode(attr.key).into_owned();
			let value = attr.unescape_and_decode_value(&self.reader)?;
			if key == "xmlns" {
				scope.push((String::new(), value));
			} else if let Some(prefix) = key.strip_prefix("xmlns:") {
				scope.push((prefix.to_string(), value));
			} else {
				raw_attributes.push((key, value));
			}
		}
		self.scopes.push(scope);
		let name = self.resolve(&self.reader.decode(start.name()), false)?;
		let mut attributes = Vec::with_capacity(raw_attributes.len());
		for (key, value) in raw_attributes {
			attributes.push((self.resolve(&key, true)?, value));
		}
		Ok(StartTag {
			start,
			name,
			attributes,
		})
	}

	fn close(&mut self) {
		self.scopes.pop();
	}

	fn dispatch(&mut self, start: BytesStart<'static>, empty: bool, state: &mut dyn ElementState) -> Result<()> {
		let tag = self.open(start)?;
		let display = tag.name.to_string();
		let mut finished = false;
		state.parse_element_inner_node(Child {
			parser: self,
			tag,
			empty,
			finished: &mut finished,
		})?;
		if !finished {
			return Err(errors::inner_element_not_parsed(&display));
		}
		Ok(())
	}

	fn parse_root<F>(&mut self, root: &mut Option<F>, start: BytesStart<'static>, empty: bool) -> Result<()>
	where
		F: FnOnce(Child<'_, 'x>) -> Result<()>,
	{
		let root = match root.take() {
			Some(root) => root,
			None => return Err(errors::unexpected_element(&self.reader.decode(start.name()))),
		};
		let tag = self.open(start)?;
		let display = tag.name.to_string();
		let mut finished = false;
		root(Child {
			parser: self,
			tag,
			empty,
			finished: &mut finished,
		})?;
		if !finished {
			return Err(errors::inner_element_not_parsed(&display));
		}
		Ok(())
	}

	/// Parse a single (root) element from reading a document
	///
	/// `root` must consume the passed `Child`.
	pub fn parse_document<F>(&mut self, root: F) -> Result<()>
	where
		F: FnOnce(Child<'_, 'x>) -> Result<()>,
	{
		let mut root = Some(root);
		loop {
			match self.next()? {
				Event::Eof => {
					if root.is_none() {
						return Ok(());
					}
					return Err(errors::unexpected_eof("empty document"));
				},
				Event::End(_) => return Err(errors::unexpected_end()),
				Event::Start(s) => self.parse_root(&mut root, s, false)?,
				Event::Empty(s) => self.parse_root(&mut root, s, true)?,
				// not supported
				Event::PI(_) => return Err(errors::unexpected_pi()),
				// ignore those at document level before the root element
				Event::Decl(_) => {
					if root.is_none() {
						return Err(errors::unexpected_decl());
					}
				},
				Event::DocType(_) => {
					if root.is_none() {
						return Err(errors::unexpected_doctype());
					}
				},
				// ignore comments
				Event::Comment(_) => (),
				Event::Text(t) => {
					let t = t.unescape_and_decode(&self.reader)?;
					if !t.trim().is_empty() {
						return Err(errors::unexpected_text());
					}
				},
				Event::CData(_) => return Err(errors::unexpected_text()),
			}
		}
	}
}

/// Element found by the parser, waiting to be consumed
///
/// Exactly one of `parse`, `text`, `skip` or `capture` must be called.
pub struct Child<'p, 'x> {
	parser: &'p mut Parser<'x>,
	tag: StartTag,
	empty: bool,
	finished: &'p mut bool,
}

impl<'p, 'x> Child<'p, 'x> {
	/// Resolved element name
	pub fn name(&self) -> &QName {
		&self.tag.name
	}

	/// Whether element has given namespace and local name
	pub fn is(&self, ns: &Namespace, local: &str) -> bool {
		self.tag.name.is(ns, local)
	}

	/// Resolved attributes (namespace declarations excluded)
	pub fn attributes(&self) -> &[(QName, String)] {
		&self.tag.attributes
	}

	/// Value of attribute without namespace
	pub fn attribute(&self, local: &str) -> Option<&str> {
		self.tag
			.attributes
			.iter()
			.find(|(name, _)| name.uri().is_empty() && name.local_name() == local)
			.map(|(_, value)| value.as_str())
	}

	/// Parse element with the given state
	pub fn parse(self, state: &mut dyn ElementState) -> Result<()> {
		let Child {
			parser,
			tag,
			empty,
			finished,
		} = self;
		for (name, value) in tag.attributes {
			state.parse_element_attribute(&name, value)?;
		}
		if !empty {
			loop {
				match parser.next()? {
					Event::Eof => return Err(errors::unexpected_eof("unclosed element")),
					Event::End(_) => break,
					Event::Start(s) => parser.dispatch(s, false, state)?,
					Event::Empty(s) => parser.dispatch(s, true, state)?,
					// not supported
					Event::PI(_) => return Err(errors::unexpected_pi()),
					// within elements those shouldn't be there
					Event::Decl(_) => return Err(errors::unexpected_decl()),
					Event::DocType(_) => return Err(errors::unexpected_doctype()),
					// ignore comments
					Event::Comment(_) => (),
					Event::Text(t) => {
						let t = t.unescape_and_decode(&parser.reader)?;
						state.parse_element_inner_text(t.into())?;
					},
					Event::CData(t) => {
						let t = parser.reader.decode(&t).into_owned();
						state.parse_element_inner_text(t.into())?;
					},
				}
			}
		}
		parser.close();
		*finished = true;
		state.parse_element_finish()
	}

	/// Parse text content; attributes are ignored, nested elements rejected
	pub fn text(self) -> Result<String> {
		let mut state = TextState::default();
		self.parse(&mut state)?;
		Ok(state.text)
	}

	/// Skip element with all content
	pub fn skip(self) -> Result<()> {
		self.parse(&mut IgnoreElement)
	}

	/// Capture the element with all content verbatim as XML fragment
	///
	/// Namespace prefixes used in the fragment but declared on ancestors are declared on the
	/// captured root element, so the fragment can be written back anywhere.
	pub fn capture(self) -> Result<String> {
		let Child {
			parser,
			tag,
			empty,
			finished,
		} = self;
		let mut used = BTreeSet::new();
		collect_prefixes(&parser.reader, &tag.start, &mut used);
		let mut events = Vec::new();
		if !empty {
			let mut depth = 0usize;
			loop {
				let event = parser.next()?;
				match &event {
					Event::Eof => return Err(errors::unexpected_eof("unclosed element")),
					Event::Start(s) => {
						depth += 1;
						collect_prefixes(&parser.reader, s, &mut used);
					},
					Event::Empty(s) => collect_prefixes(&parser.reader, s, &mut used),
					Event::End(_) => {
						if depth == 0 {
							break;
						}
						depth -= 1;
					},
					_ => (),
				}
				events.push(event);
			}
		}

		let mut start = tag.start;
		let own: Vec<String> = parser.scopes.last().map(|scope| scope.iter().map(|(p, _)| p.clone()).collect()).unwrap_or_default();
		for prefix in &used {
			if own.contains(prefix) {
				continue;
			}
			if prefix.is_empty() {
				// `xmlns=""` keeps unqualified names unqualified wherever the fragment ends up
				start.push_attribute(("xmlns", parser.lookup("", true).unwrap_or("")));
			} else if let Some(uri) = parser.lookup(prefix, true) {
				start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri));
			}
		}

		let mut writer = quick_xml::Writer::new(Vec::new());
		if empty {
			writer.write_event(Event::Empty(start))?;
		} else {
			let end = BytesEnd::owned(start.name().to_vec());
			writer.write_event(Event::Start(start))?;
			for event in events {
				writer.write_event(event)?;
			}
			writer.write_event(Event::End(end))?;
		}
		parser.close();
		*finished = true;
		Ok(String::from_utf8(writer.into_inner())?)
	}
}

fn collect_prefixes(reader: &quick_xml::Reader<&[u8]>, start: &BytesStart<'_>, used: &mut BTreeSet<String>) {
	let name = reader.decode(start.name());
	match name.find(':') {
		Some(pos) => used.insert(name[..pos].to_string()),
		None => used.insert(String::new()),
	};
	for attr in start.attributes().flatten() {
		let key = reader.decode(attr.key);
		if let Some(pos) = key.find(':') {
			let prefix = &key[..pos];
			if prefix != "xmlns" && prefix != XML_PREFIX {
				used.insert(prefix.to_string());
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::namespace::{
		ATOM,
		GD,
	};

	#[derive(Default)]
	struct Collect {
		attributes: Vec<(QName, String)>,
		children: Vec<(QName, String)>,
		captured: Vec<String>,
	}

	impl ElementState for Collect {
		fn parse_element_attribute(&mut self, name: &QName, value: String) -> Result<()> {
			self.attributes.push((name.clone(), value));
			Ok(())
		}

		fn parse_element_inner_node(&mut self, child: Child<'_, '_>) -> Result<()> {
			if child.name().uri() == ATOM.uri() {
				let name = child.name().clone();
				let text = child.text()?;
				self.children.push((name, text));
			} else {
				self.captured.push(child.capture()?);
			}
			Ok(())
		}
	}

	fn parse(input: &str) -> Result<(QName, Collect)> {
		let mut state = Collect::default();
		let mut root = None;
		Parser::new(input.as_bytes()).parse_document(|child| {
			root = Some(child.name().clone());
			child.parse(&mut state)
		})?;
		Ok((root.unwrap(), state))
	}

	#[test]
	fn resolves_namespaces() {
		let (root, state) = parse(
			r#"<?xml version="1.0" encoding="UTF-8"?>
<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005" gd:etag="W/&quot;x&quot;">
	<id>urn:1</id>
	<title type="text">a &amp; b</title>
</entry>"#,
		)
		.unwrap();
		assert!(root.is(&ATOM, "entry"));
		assert_eq!(state.attributes, vec![(QName::new(GD.uri(), "etag"), "W/\"x\"".to_string())]);
		assert_eq!(state.children, vec![
			(QName::new(ATOM.uri(), "id"), "urn:1".to_string()),
			(QName::new(ATOM.uri(), "title"), "a & b".to_string()),
		]);
	}

	#[test]
	fn capture_declares_inherited_prefixes() {
		let (_, state) = parse(
			r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x"><x:custom a="1"><x:inner>t &lt; u</x:inner><plain/></x:custom></entry>"#,
		)
		.unwrap();
		assert_eq!(state.captured, vec![
			r#"<x:custom a="1" xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x"><x:inner>t &lt; u</x:inner><plain/></x:custom>"#
				.to_string(),
		]);
	}

	#[test]
	fn capture_keeps_unqualified_names_unqualified() {
		let (_, state) = parse(r#"<root xmlns:x="urn:x"><plain a="1"><x:inner/></plain></root>"#).unwrap();
		let fragment = r#"<plain a="1" xmlns="" xmlns:x="urn:x"><x:inner/></plain>"#;
		assert_eq!(state.captured, vec![fragment.to_string()]);

		// written back below an Atom default namespace it stays outside of it
		let xml = crate::quick_xml::serialize_document(&ATOM, "entry", &[], |el| el.raw(fragment)).unwrap();
		let (root, state) = parse(&xml).unwrap();
		assert!(root.is(&ATOM, "entry"));
		assert!(state.children.is_empty());
		assert_eq!(state.captured, vec![fragment.to_string()]);
	}

	#[test]
	fn xml_prefix_is_predeclared() {
		let (_, state) = parse(r#"<entry xmlns="http://www.w3.org/2005/Atom" xml:lang="de"/>"#).unwrap();
		assert_eq!(state.attributes, vec![(QName::new(XML_URI, "lang"), "de".to_string())]);

		let xml = crate::quick_xml::serialize_document(&ATOM, "entry", &[], |el| {
			el.attribute_qname(&QName::new(XML_URI, "lang"), "de")
		})
		.unwrap();
		assert!(xml.ends_with(r#"<entry xmlns="http://www.w3.org/2005/Atom" xml:lang="de"/>"#));
	}

	#[test]
	fn unknown_prefix_fails() {
		assert!(parse(r#"<y:entry xmlns:x="urn:x"/>"#).is_err());
	}

	#[test]
	fn unconsumed_child_fails() {
		struct Lazy;
		impl ElementState for Lazy {
			fn parse_element_inner_node(&mut self, _child: Child<'_, '_>) -> Result<()> {
				Ok(())
			}
		}
		let err = Parser::new(b"<a><b/></a>").parse_document(|child| child.parse(&mut Lazy));
		assert!(err.is_err());
	}

	#[test]
	fn rejects_text_and_trailing_elements() {
		assert!(parse("<a>text</a>").is_err());
		assert!(parse("<a>  </a>").is_ok());
		let mut ignore = IgnoreElement;
		assert!(Parser::new(b"<a/><b/>").parse_document(|child| child.parse(&mut ignore)).is_err());
		assert!(Parser::new(b"").parse_document(|child| child.skip()).is_err());
	}
}
