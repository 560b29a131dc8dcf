use crate::{
	serializer::ElementSerializer,
	Result,
};

/// Unrecognized markup captured while parsing a container
///
/// Each fragment is a complete element (declaring all namespace prefixes it uses); fragments are
/// written back verbatim after all known extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlBlob {
	fragments: Vec<String>,
}

impl XmlBlob {
	/// Whether no markup was captured
	pub fn is_empty(&self) -> bool {
		self.fragments.is_empty()
	}

	/// Captured fragments in document order
	pub fn fragments(&self) -> &[String] {
		&self.fragments
	}

	/// Append fragment (must be well-formed XML)
	pub fn push(&mut self, fragment: String) {
		self.fragments.push(fragment);
	}

	/// Remove all fragments
	pub fn clear(&mut self) {
		self.fragments.clear();
	}

	pub(crate) fn generate(&self, element: &mut ElementSerializer<'_>) -> Result<()> {
		for fragment in &self.fragments {
			element.raw(fragment)?;
		}
		Ok(())
	}
}
