//! Batch processing extensions (`http://schemas.google.com/gdata/batch`)
//!
//! Entries of a batch feed carry a `batch:operation` and optionally a client chosen `batch:id`;
//! result entries carry a `batch:status`.  A result feed whose last entry carries
//! `batch:interrupted` was aborted.

use crate::{
	data::{
		Entry,
		Feed,
	},
	errors,
	extension::{
		Extension,
		ExtensionDescription,
		ExtensionPoint,
		ExtensionProfile,
		Frozen,
	},
	namespace::{
		Namespace,
		BATCH,
	},
	parser::AttributeHelper,
	serializer::AttributeGenerator,
	Error,
	Result,
};
use std::{
	fmt,
	str::FromStr,
};

/// Client chosen identifier of a batch entry, echoed in the result entry
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchId {
	id: String,
	frozen: Frozen,
}

impl BatchId {
	/// Frozen batch id
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			frozen: Frozen::FROZEN,
		}
	}

	/// The identifier
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Change identifier (fails if frozen)
	pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.id = id.into();
		Ok(())
	}
}

impl Extension for BatchId {
	const NAMESPACE: Namespace = BATCH;
	const LOCAL_NAME: &'static str = "id";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.id = helper.consume_content(true)?.unwrap_or_default().trim().to_string();
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.set_content(self.id.clone());
	}

	fn validate(&self) -> Result<()> {
		if self.id.is_empty() {
			return Err(errors::missing_content(Self::LOCAL_NAME));
		}
		Ok(())
	}
}

/// Operation of a batch entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchOperationType {
	/// Insert entry into the feed
	Insert,
	/// Update entry (identified by its edit link / id)
	Update,
	/// Delete entry
	Delete,
	/// Retrieve entry
	Query,
}

impl BatchOperationType {
	/// Name used in the `type` attribute
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Insert => "insert",
			Self::Update => "update",
			Self::Delete => "delete",
			Self::Query => "query",
		}
	}
}

impl fmt::Display for BatchOperationType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BatchOperationType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"insert" => Ok(Self::Insert),
			"update" => Ok(Self::Update),
			"delete" => Ok(Self::Delete),
			"query" => Ok(Self::Query),
			_ => Err(errors::invalid_value("type", s)),
		}
	}
}

/// `batch:operation`; on a feed it sets the default operation for all entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOperation {
	operation_type: Option<BatchOperationType>,
	frozen: Frozen,
}

impl BatchOperation {
	/// Frozen operation
	pub fn new(operation_type: BatchOperationType) -> Self {
		Self {
			operation_type: Some(operation_type),
			frozen: Frozen::FROZEN,
		}
	}

	/// The operation
	pub fn operation_type(&self) -> Option<BatchOperationType> {
		self.operation_type
	}

	/// Change operation (fails if frozen)
	pub fn set_operation_type(&mut self, operation_type: BatchOperationType) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.operation_type = Some(operation_type);
		Ok(())
	}
}

impl Extension for BatchOperation {
	const NAMESPACE: Namespace = BATCH;
	const LOCAL_NAME: &'static str = "operation";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.operation_type = Some(helper.consume_required("type")?.parse()?);
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.put_option("type", self.operation_type);
	}

	fn validate(&self) -> Result<()> {
		if self.operation_type.is_none() {
			return Err(errors::missing_attribute(Self::LOCAL_NAME, "type"));
		}
		Ok(())
	}
}

/// Result of a single batch operation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchStatus {
	code: u16,
	reason: Option<String>,
	content_type: Option<String>,
	content: Option<String>,
	frozen: Frozen,
}

impl BatchStatus {
	/// Frozen status
	pub fn new(code: u16, reason: Option<String>, content_type: Option<String>, content: Option<String>) -> Self {
		Self {
			code,
			reason,
			content_type,
			content,
			frozen: Frozen::FROZEN,
		}
	}

	/// HTTP-like status code
	pub fn code(&self) -> u16 {
		self.code
	}

	/// Status message
	pub fn reason(&self) -> Option<&str> {
		self.reason.as_deref()
	}

	/// Content type of the status content
	pub fn content_type(&self) -> Option<&str> {
		self.content_type.as_deref()
	}

	/// Detailed error description
	pub fn content(&self) -> Option<&str> {
		self.content.as_deref()
	}

	/// Whether the code is in the 2xx range
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.code)
	}

	/// Change code (fails if frozen)
	pub fn set_code(&mut self, code: u16) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.code = code;
		Ok(())
	}

	/// Change reason (fails if frozen)
	pub fn set_reason(&mut self, reason: Option<String>) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.reason = reason;
		Ok(())
	}

	/// Change content and its type (fails if frozen)
	pub fn set_content(&mut self, content_type: Option<String>, content: Option<String>) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.content_type = content_type;
		self.content = content;
		Ok(())
	}
}

impl Extension for BatchStatus {
	const NAMESPACE: Namespace = BATCH;
	const LOCAL_NAME: &'static str = "status";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.code = helper.consume_required_parsed("code")?;
		self.reason = helper.consume("reason");
		self.content_type = helper.consume("content-type");
		self.content = helper.consume_content(false)?;
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.put("code", self.code);
		generator.put_option("reason", self.reason.as_deref());
		generator.put_option("content-type", self.content_type.as_deref());
		if let Some(content) = &self.content {
			generator.set_content(content.clone());
		}
	}

	fn validate(&self) -> Result<()> {
		if self.code == 0 {
			return Err(errors::missing_attribute(Self::LOCAL_NAME, "code"));
		}
		Ok(())
	}
}

/// Marker: batch processing stopped at this entry
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchInterrupted {
	/// Why processing stopped
	pub reason: Option<String>,
	parsed: u32,
	success: u32,
	error: u32,
	content_type: Option<String>,
	content: Option<String>,
	extensions: ExtensionPoint,
	frozen: Frozen,
}

impl BatchInterrupted {
	/// Frozen marker; `parsed` must be at least `success + error`
	pub fn new(reason: Option<String>, parsed: u32, success: u32, error: u32) -> Result<Self> {
		if u64::from(parsed) < u64::from(success) + u64::from(error) {
			return Err(errors::invalid_argument(format!(
				"total < success + error. total = {} success={} error={}",
				parsed, success, error
			)));
		}
		Ok(Self {
			reason,
			parsed,
			success,
			error,
			frozen: Frozen::FROZEN,
			..Self::default()
		})
	}

	/// Entries parsed before the interruption
	pub fn parsed(&self) -> u32 {
		self.parsed
	}

	/// Entries processed successfully
	pub fn success(&self) -> u32 {
		self.success
	}

	/// Entries rejected
	pub fn error(&self) -> u32 {
		self.error
	}

	/// Entries parsed but not processed
	pub fn unprocessed(&self) -> u32 {
		self.parsed.saturating_sub(self.success.saturating_add(self.error))
	}

	/// Content type of the content
	pub fn content_type(&self) -> Option<&str> {
		self.content_type.as_deref()
	}

	/// Detailed description
	pub fn content(&self) -> Option<&str> {
		self.content.as_deref()
	}

	/// Change counters (fails if frozen)
	pub fn set_counts(&mut self, parsed: u32, success: u32, error: u32) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.parsed = parsed;
		self.success = success;
		self.error = error;
		Ok(())
	}
}

impl Extension for BatchInterrupted {
	const NAMESPACE: Namespace = BATCH;
	const LOCAL_NAME: &'static str = "interrupted";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.reason = helper.consume("reason");
		self.parsed = helper.consume_parsed("parsed")?.unwrap_or(0);
		self.success = helper.consume_parsed("success")?.unwrap_or(0);
		self.error = helper.consume_parsed("error")?.unwrap_or(0);
		// derived from the other counters
		helper.consume("unprocessed");
		self.content_type = helper.consume("content-type");
		self.content = helper.consume_content(false)?;
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.put_option("reason", self.reason.as_deref());
		generator.put("parsed", self.parsed);
		generator.put("success", self.success);
		generator.put("error", self.error);
		generator.put("unprocessed", self.unprocessed());
		generator.put_option("content-type", self.content_type.as_deref());
		if let Some(content) = &self.content {
			generator.set_content(content.clone());
		}
	}

	fn extension_point(&self) -> Option<&ExtensionPoint> {
		Some(&self.extensions)
	}

	fn extension_point_mut(&mut self) -> Option<&mut ExtensionPoint> {
		Some(&mut self.extensions)
	}
}

/// Declare batch extensions on the base entry kind
pub fn declare_entry_extensions(profile: &mut ExtensionProfile) {
	profile.declare::<Entry>(ExtensionDescription::of::<BatchId>());
	profile.declare::<Entry>(ExtensionDescription::of::<BatchOperation>());
	profile.declare::<Entry>(ExtensionDescription::of::<BatchStatus>());
	profile.declare::<Entry>(ExtensionDescription::of::<BatchInterrupted>());
}

/// Declare batch extensions on the base feed kind
pub fn declare_feed_extensions(profile: &mut ExtensionProfile) {
	profile.declare::<Feed<Entry>>(ExtensionDescription::of::<BatchOperation>());
}

/// Set the client batch id of an entry
pub fn set_batch_id(entry: &mut Entry, id: impl Into<String>) {
	entry.extensions.set_extension(BatchId::new(id));
}

/// Client batch id of an entry
pub fn batch_id(entry: &Entry) -> Option<&str> {
	entry.extensions.extension::<BatchId>().map(BatchId::id)
}

/// Set the operation of an entry (or of a feed, as default for its entries)
pub fn set_operation(extensions: &mut ExtensionPoint, operation_type: BatchOperationType) {
	extensions.set_extension(BatchOperation::new(operation_type));
}

/// Operation of an entry
pub fn operation(entry: &Entry) -> Option<BatchOperationType> {
	entry.extensions.extension::<BatchOperation>().and_then(BatchOperation::operation_type)
}

/// Status of a result entry
pub fn status(entry: &Entry) -> Option<&BatchStatus> {
	entry.extensions.extension()
}

/// Interruption marker of a result entry
pub fn interrupted(entry: &Entry) -> Option<&BatchInterrupted> {
	entry.extensions.extension()
}

/// Whether the result entry reports success (2xx status)
pub fn is_success(entry: &Entry) -> bool {
	status(entry).map_or(false, BatchStatus::is_success)
}

/// Whether the result entry reports failure (status present, not 2xx)
pub fn is_failure(entry: &Entry) -> bool {
	status(entry).map_or(false, |status| !status.is_success())
}
