//! Service layer: transport abstraction, GData verbs, Google authentication and queries
//!
//! The HTTP transport itself is not part of this crate; it is plugged in through
//! [`GDataRequestFactory`].

pub mod auth;
mod config;
mod content_type;
pub mod cookie;
mod google;
mod query;
mod request;
mod service;
#[cfg(test)]
pub(crate) mod testing;

pub use self::{
	auth::AccountType,
	config::{
		LoginConfig,
		ServiceConfig,
	},
	content_type::ContentType,
	google::GoogleService,
	query::{
		CategoryFilter,
		CustomParameter,
		Query,
		ResultFormat,
	},
	request::{
		read_response,
		GDataRequest,
		GDataRequestFactory,
		RequestType,
		Timeout,
	},
	service::{
		token_expired,
		Precondition,
		RequestHook,
		Service,
	},
};
