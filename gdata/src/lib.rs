#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/gdata/0.1.0")]
//! Core of a client for GData services: Atom feeds and entries extended with namespaced
//! elements, and the protocol verbs to query, insert, update, delete and batch them.
//!
//! The data binding is declarative: containers (feeds, entries, container extensions) declare
//! which [`extension::Extension`] types they accept in an [`extension::ExtensionProfile`].
//! Parsing dispatches elements by namespace and local name through the profile; unrecognized
//! markup is captured and written back unchanged.
//!
//! The [`client::Service`] implements the GData verbs on top of a pluggable transport
//! ([`client::GDataRequestFactory`]); [`client::GoogleService`] adds Google authentication,
//! session cookies and a single retry on redirects and expired sessions.
//!
//! XML is read and written with [`quick-xml`](https://crates.io/crates/quick-xml).

pub mod client;
pub mod data;
pub mod errors;
pub mod extension;
pub mod namespace;
pub mod parser;
pub mod quick_xml;
pub mod serializer;

/// Result alias with our error type included
pub type Result<T> = std::result::Result<T, Error>;

pub use self::errors::Error;

#[cfg(test)]
mod test_struct;
