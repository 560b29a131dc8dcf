//! Parser and serializer adaptors for [`quick-xml`](https://crates.io/crates/quick-xml)

mod parser;
mod serializer;

pub use self::{
	parser::{
		Child,
		Parser,
	},
	serializer::{
		serialize_document,
		ElementSerializer,
		Serializer,
	},
};
