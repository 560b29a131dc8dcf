use crate::{
	errors,
	Result,
};

/// Marks a value extension as read only
///
/// Value extensions created through their "complete" constructor are frozen; values created by
/// `Default` (including values created while parsing) can be modified.  All setters call
/// `check` first.
///
/// Frozen and mutable instances with the same data compare equal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Frozen(bool);

impl Frozen {
	/// A frozen flag
	pub const FROZEN: Self = Self(true);

	/// Whether the value is read only
	pub fn is_frozen(self) -> bool {
		self.0
	}

	/// Freeze value
	pub fn freeze(&mut self) {
		self.0 = true;
	}

	/// Fails with `Error::Immutable` if frozen
	pub fn check(self, element: &'static str) -> Result<()> {
		if self.0 {
			return Err(errors::immutable(element));
		}
		Ok(())
	}
}

impl PartialEq for Frozen {
	fn eq(&self, _other: &Self) -> bool {
		true
	}
}

impl Eq for Frozen {}
