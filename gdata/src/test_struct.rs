use crate::{
	data::{
		Entry,
		EntryType,
		Feed,
	},
	errors,
	extension::{
		Extension,
		ExtensionDescription,
		ExtensionPoint,
		ExtensionProfile,
		Frozen,
		Kind,
	},
	namespace::Namespace,
	parser::AttributeHelper,
	serializer::AttributeGenerator,
	Result,
};

pub const TEST_NS: Namespace = Namespace::new_static("test", "urn:test");

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rating {
	pub value: u32,
	frozen: Frozen,
}

impl Rating {
	pub fn new(value: u32) -> Self {
		Self {
			value,
			frozen: Frozen::FROZEN,
		}
	}

	pub fn set_value(&mut self, value: u32) -> Result<()> {
		self.frozen.check(Self::LOCAL_NAME)?;
		self.value = value;
		Ok(())
	}
}

impl Extension for Rating {
	const NAMESPACE: Namespace = TEST_NS;
	const LOCAL_NAME: &'static str = "rating";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.value = helper.consume_required_parsed("value")?;
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.put("value", self.value);
	}

	fn validate(&self) -> Result<()> {
		if !(1..=5).contains(&self.value) {
			return Err(errors::invalid_value("value", &self.value.to_string()));
		}
		Ok(())
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
	pub name: String,
}

impl Tag {
	pub fn new(name: &str) -> Self {
		Self { name: name.to_string() }
	}
}

impl Extension for Tag {
	const NAMESPACE: Namespace = TEST_NS;
	const LOCAL_NAME: &'static str = "tag";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.name = helper.consume_content(true)?.unwrap_or_default();
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.set_content(self.name.clone());
	}
}

// container extension; nested declarations reference `Album`, which declares `Folder` again
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Folder {
	pub name: Option<String>,
	pub extensions: ExtensionPoint,
}

impl Extension for Folder {
	const NAMESPACE: Namespace = TEST_NS;
	const LOCAL_NAME: &'static str = "folder";

	fn consume_attributes(&mut self, helper: &mut AttributeHelper) -> Result<()> {
		self.name = helper.consume("name");
		Ok(())
	}

	fn put_attributes(&self, generator: &mut AttributeGenerator) {
		generator.put_option("name", self.name.as_deref());
	}

	fn extension_point(&self) -> Option<&ExtensionPoint> {
		Some(&self.extensions)
	}

	fn extension_point_mut(&mut self) -> Option<&mut ExtensionPoint> {
		Some(&mut self.extensions)
	}

	fn declare_extensions(profile: &mut ExtensionProfile) {
		profile.declare::<Folder>(ExtensionDescription::of::<Tag>().repeatable());
		profile.add_declarations::<Album>();
	}
}

pub struct Album;

impl Kind for Album {
	fn declare_extensions(profile: &mut ExtensionProfile) {
		profile.declare::<Album>(ExtensionDescription::of::<Folder>());
		profile.declare::<Album>(ExtensionDescription::of::<Tag>().repeatable());
		profile.add_declarations::<Photo>();
	}
}

pub struct Photo;

impl Kind for Photo {
	fn declare_extensions(profile: &mut ExtensionProfile) {
		profile.add_declarations::<Album>();
		profile.declare::<Photo>(ExtensionDescription::of::<Rating>().required());
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoEntry {
	pub entry: Entry,
}

impl Kind for PhotoEntry {
	fn declare_extensions(profile: &mut ExtensionProfile) {
		profile.add_declarations::<Entry>();
		profile.declare::<PhotoEntry>(ExtensionDescription::of::<Rating>().required());
		profile.declare::<PhotoEntry>(ExtensionDescription::of::<Tag>().repeatable());
	}
}

impl EntryType for PhotoEntry {
	fn entry(&self) -> &Entry {
		&self.entry
	}

	fn entry_mut(&mut self) -> &mut Entry {
		&mut self.entry
	}

	fn declare_feed_extensions(profile: &mut ExtensionProfile) {
		profile.declare::<Feed<PhotoEntry>>(ExtensionDescription::of::<Tag>().repeatable());
	}
}
