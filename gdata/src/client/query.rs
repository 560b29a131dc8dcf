//! Feed query URLs

use crate::{
	data::{
		atom::format_date,
		Category,
	},
	errors,
	Result,
};
use chrono::{
	DateTime,
	Utc,
};
use std::fmt;
use url::Url;

/// Value of the `alt` parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultFormat {
	/// Whatever the resource defaults to (parameter omitted)
	Default,
	/// Atom
	Atom,
	/// RSS
	Rss,
	/// JSON
	Json,
	/// JSON-C
	Jsonc,
	/// Atom wrapped in a script callback
	AtomInScript,
	/// RSS wrapped in a script callback
	RssInScript,
	/// JSON wrapped in a script callback
	JsonInScript,
	/// JSON-C wrapped in a script callback
	JsoncInScript,
	/// Cross-domain JSON; not supported
	JsonXd,
	/// Atom service document
	AtomService,
}

impl Default for ResultFormat {
	fn default() -> Self {
		Self::Default
	}
}

impl ResultFormat {
	/// Parameter value
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Default => "default",
			Self::Atom => "atom",
			Self::Rss => "rss",
			Self::Json => "json",
			Self::Jsonc => "jsonc",
			Self::AtomInScript => "atom-in-script",
			Self::RssInScript => "rss-in-script",
			Self::JsonInScript => "json-in-script",
			Self::JsoncInScript => "jsonc-in-script",
			Self::JsonXd => "json-xd",
			Self::AtomService => "atom-service",
		}
	}
}

/// Categories an entry must (or must not) have; matches if any of them applies
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryFilter {
	/// Matching entries have one of these
	pub categories: Vec<Category>,
	/// Matching entries lack one of these
	pub exclude_categories: Vec<Category>,
}

impl CategoryFilter {
	/// Empty filter
	pub fn new() -> Self {
		Self::default()
	}

	/// Filter for a single category
	pub fn with_category(category: Category) -> Self {
		Self {
			categories: vec![category],
			exclude_categories: Vec::new(),
		}
	}

	/// Add category to match
	pub fn add_category(&mut self, category: Category) {
		self.categories.push(category);
	}

	/// Add category to exclude
	pub fn add_exclude_category(&mut self, category: Category) {
		self.exclude_categories.push(category);
	}
}

fn write_category(f: &mut fmt::Formatter<'_>, category: &Category) -> fmt::Result {
	if let Some(scheme) = &category.scheme {
		write!(f, "{{{}}}", scheme)?;
	}
	f.write_str(&category.term)
}

impl fmt::Display for CategoryFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for (prefix, category) in self
			.categories
			.iter()
			.map(|c| ("", c))
			.chain(self.exclude_categories.iter().map(|c| ("-", c)))
		{
			if !first {
				f.write_str("|")?;
			}
			first = false;
			f.write_str(prefix)?;
			write_category(f, category)?;
		}
		Ok(())
	}
}

/// Additional query parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomParameter {
	/// Parameter name
	pub name: String,
	/// Parameter value
	pub value: String,
}

impl CustomParameter {
	/// New parameter
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
		}
	}
}

/// Query against a feed
///
/// ```
/// # use gdata::client::Query;
/// let mut query = Query::new(url::Url::parse("http://x/feed").unwrap());
/// query.set_start_index(11).unwrap();
/// query.set_max_results(25).unwrap();
/// assert_eq!(query.url().unwrap().as_str(), "http://x/feed?start-index=11&max-results=25");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
	feed_url: Url,
	category_filters: Vec<CategoryFilter>,
	full_text_query: Option<String>,
	author: Option<String>,
	result_format: ResultFormat,
	updated_min: Option<DateTime<Utc>>,
	updated_max: Option<DateTime<Utc>>,
	published_min: Option<DateTime<Utc>>,
	published_max: Option<DateTime<Utc>>,
	start_index: Option<u32>,
	max_results: Option<u32>,
	fields: Option<String>,
	strict: bool,
	custom_parameters: Vec<CustomParameter>,
}

impl Query {
	/// Empty query against `feed_url`
	pub fn new(feed_url: Url) -> Self {
		Self {
			feed_url,
			category_filters: Vec::new(),
			full_text_query: None,
			author: None,
			result_format: ResultFormat::Default,
			updated_min: None,
			updated_max: None,
			published_min: None,
			published_max: None,
			start_index: None,
			max_results: None,
			fields: None,
			strict: false,
			custom_parameters: Vec::new(),
		}
	}

	/// The queried feed
	pub fn feed_url(&self) -> &Url {
		&self.feed_url
	}

	/// Add a category filter; all filters must match
	pub fn add_category_filter(&mut self, filter: CategoryFilter) {
		self.category_filters.push(filter);
	}

	/// Category filters
	pub fn category_filters(&self) -> &[CategoryFilter] {
		&self.category_filters
	}

	/// Full-text search (`q`)
	pub fn set_full_text_query(&mut self, query: Option<String>) {
		self.full_text_query = query;
	}

	/// Full-text search
	pub fn full_text_query(&self) -> Option<&str> {
		self.full_text_query.as_deref()
	}

	/// Author name or email address (`author`)
	pub fn set_author(&mut self, author: Option<String>) {
		self.author = author;
	}

	/// Author filter
	pub fn author(&self) -> Option<&str> {
		self.author.as_deref()
	}

	/// Requested format (`alt`)
	pub fn set_result_format(&mut self, format: ResultFormat) {
		self.result_format = format;
	}

	/// Requested format
	pub fn result_format(&self) -> ResultFormat {
		self.result_format
	}

	/// Minimum update timestamp (`updated-min`)
	pub fn set_updated_min(&mut self, date: Option<DateTime<Utc>>) {
		self.updated_min = date;
	}

	/// Minimum update timestamp
	pub fn updated_min(&self) -> Option<DateTime<Utc>> {
		self.updated_min
	}

	/// Maximum update timestamp (`updated-max`)
	pub fn set_updated_max(&mut self, date: Option<DateTime<Utc>>) {
		self.updated_max = date;
	}

	/// Maximum update timestamp
	pub fn updated_max(&self) -> Option<DateTime<Utc>> {
		self.updated_max
	}

	/// Minimum publication timestamp (`published-min`)
	pub fn set_published_min(&mut self, date: Option<DateTime<Utc>>) {
		self.published_min = date;
	}

	/// Minimum publication timestamp
	pub fn published_min(&self) -> Option<DateTime<Utc>> {
		self.published_min
	}

	/// Maximum publication timestamp (`published-max`)
	pub fn set_published_max(&mut self, date: Option<DateTime<Utc>>) {
		self.published_max = date;
	}

	/// Maximum publication timestamp
	pub fn published_max(&self) -> Option<DateTime<Utc>> {
		self.published_max
	}

	/// 1-based index of the first result (`start-index`)
	pub fn set_start_index(&mut self, index: i64) -> Result<()> {
		if index < 1 || index > i64::from(u32::MAX) {
			return Err(errors::invalid_argument(format!("Start index must be positive: {}", index)));
		}
		self.start_index = Some(index as u32);
		Ok(())
	}

	/// Remove start index
	pub fn clear_start_index(&mut self) {
		self.start_index = None;
	}

	/// Index of the first result
	pub fn start_index(&self) -> Option<u32> {
		self.start_index
	}

	/// Maximum number of results (`max-results`); `0` lets the server decide
	pub fn set_max_results(&mut self, max: i64) -> Result<()> {
		if max < 0 || max > i64::from(u32::MAX) {
			return Err(errors::invalid_argument(format!("Max results must be zero or larger: {}", max)));
		}
		self.max_results = Some(max as u32);
		Ok(())
	}

	/// Remove result limit
	pub fn clear_max_results(&mut self) {
		self.max_results = None;
	}

	/// Maximum number of results
	pub fn max_results(&self) -> Option<u32> {
		self.max_results
	}

	/// Partial response selection (`fields`)
	pub fn set_fields(&mut self, fields: Option<String>) {
		self.fields = fields;
	}

	/// Partial response selection
	pub fn fields(&self) -> Option<&str> {
		self.fields.as_deref()
	}

	/// Reject unknown parameters on the server (`strict`)
	pub fn set_strict(&mut self, strict: bool) {
		self.strict = strict;
	}

	/// Whether strict parameter checking is requested
	pub fn is_strict(&self) -> bool {
		self.strict
	}

	/// Append a custom parameter
	pub fn add_custom_parameter(&mut self, parameter: CustomParameter) {
		self.custom_parameters.push(parameter);
	}

	/// All custom parameters
	pub fn custom_parameters(&self) -> &[CustomParameter] {
		&self.custom_parameters
	}

	/// Custom parameters with the given name
	pub fn custom_parameters_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CustomParameter> + 'a {
		self.custom_parameters.iter().filter(move |p| p.name == name)
	}

	/// Replace all custom parameters named `name` (`None` removes them)
	pub fn set_string_custom_parameter(&mut self, name: &str, value: Option<&str>) {
		self.custom_parameters.retain(|p| p.name != name);
		if let Some(value) = value {
			self.custom_parameters.push(CustomParameter::new(name, value));
		}
	}

	/// First custom parameter named `name`
	pub fn string_custom_parameter(&self, name: &str) -> Option<&str> {
		self.custom_parameters.iter().find(|p| p.name == name).map(|p| p.value.as_str())
	}

	/// Replace all custom parameters named `name` with an integer (`None` removes them)
	pub fn set_integer_custom_parameter(&mut self, name: &str, value: Option<i64>) {
		self.set_string_custom_parameter(name, value.map(|v| v.to_string()).as_deref());
	}

	/// First custom parameter named `name`, if it is an integer
	pub fn integer_custom_parameter(&self, name: &str) -> Option<i64> {
		self.string_custom_parameter(name)?.parse().ok()
	}

	/// Whether the query can be sent (`json-xd` isn't supported)
	pub fn is_valid_state(&self) -> bool {
		self.result_format != ResultFormat::JsonXd
	}

	/// Category path and query string, relative to the feed URL
	pub fn query_uri(&self) -> Result<String> {
		if !self.is_valid_state() {
			return Err(errors::invalid_state(format!(
				"Unsupported query: result format {}",
				self.result_format.as_str()
			)));
		}

		let mut uri = String::new();
		if !self.category_filters.is_empty() {
			uri.push('-');
			for filter in &self.category_filters {
				uri.push('/');
				uri.push_str(&urlencoding::encode(&filter.to_string()));
			}
		}

		let mut params: Vec<(&str, String)> = Vec::new();
		if let Some(q) = &self.full_text_query {
			params.push(("q", q.clone()));
		}
		if let Some(author) = &self.author {
			params.push(("author", author.clone()));
		}
		if self.result_format != ResultFormat::Default {
			params.push(("alt", self.result_format.as_str().to_string()));
		}
		for (name, date) in [
			("updated-min", &self.updated_min),
			("updated-max", &self.updated_max),
			("published-min", &self.published_min),
			("published-max", &self.published_max),
		] {
			if let Some(date) = date {
				params.push((name, format_date(date)));
			}
		}
		if let Some(index) = self.start_index {
			params.push(("start-index", index.to_string()));
		}
		if let Some(max) = self.max_results {
			params.push(("max-results", max.to_string()));
		}
		if let Some(fields) = &self.fields {
			params.push(("fields", fields.clone()));
		}
		if self.strict {
			params.push(("strict", "true".to_string()));
		}
		for parameter in &self.custom_parameters {
			params.push((parameter.name.as_str(), parameter.value.clone()));
		}

		for (i, (name, value)) in params.iter().enumerate() {
			uri.push(if i == 0 { '?' } else { '&' });
			uri.push_str(&urlencoding::encode(name));
			uri.push('=');
			uri.push_str(&urlencoding::encode(value));
		}
		Ok(uri)
	}

	/// Full query URL
	///
	/// The category path is appended to the feed URL as further path segments.
	pub fn url(&self) -> Result<Url> {
		let uri = self.query_uri()?;
		if uri.is_empty() {
			return Ok(self.feed_url.clone());
		}
		let mut url = self.feed_url.to_string();
		if !url.ends_with('/') && !uri.starts_with('?') {
			url.push('/');
		}
		url.push_str(&uri);
		Ok(Url::parse(&url)?)
	}
}
