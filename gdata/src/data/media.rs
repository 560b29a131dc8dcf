//! Media payloads of media entries

use base64::Engine;
use mime::Mime;

/// Boundary separating the parts of a `multipart/related` body
pub const BOUNDARY: &str = "END_OF_PART";

/// Binary media with its type and an optional suggested name
#[derive(Clone, Debug, PartialEq)]
pub struct MediaSource {
	/// Media type of the data
	pub content_type: Mime,
	/// Suggested name (sent in the `Slug` header)
	pub name: Option<String>,
	/// The media itself
	pub data: Vec<u8>,
}

impl MediaSource {
	/// Media without suggested name
	pub fn new(content_type: Mime, data: impl Into<Vec<u8>>) -> Self {
		Self {
			content_type,
			name: None,
			data: data.into(),
		}
	}

	/// Set suggested name
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Value for the `Slug` header
	pub fn slug(&self) -> Option<String> {
		self.name.as_deref().map(encode_slug)
	}
}

/// Encode a name for the `Slug` header
///
/// Printable ASCII is sent as is; everything else becomes an RFC 2047 encoded word.
pub fn encode_slug(name: &str) -> String {
	if name.bytes().all(|b| (0x20..0x7f).contains(&b)) {
		return name.to_string();
	}
	format!("=?UTF-8?B?{}?=", base64::engine::general_purpose::STANDARD.encode(name))
}

/// Content type of a `multipart/related` body built by `multipart_related`
pub fn multipart_content_type() -> String {
	format!("multipart/related; boundary=\"{}\"", BOUNDARY)
}

/// Frame metadata (Atom XML) and media as `multipart/related` body
///
/// The metadata part comes first.
pub fn multipart_related(metadata_type: &str, metadata: &[u8], media: &MediaSource) -> Vec<u8> {
	let mut body = Vec::with_capacity(metadata.len() + media.data.len() + 256);
	body.extend_from_slice(b"Media multipart posting\r\n");
	for (content_type, data) in [(metadata_type, metadata), (media.content_type.as_ref(), &media.data[..])] {
		body.extend_from_slice(format!("--{}\r\nContent-Type: {}\r\n\r\n", BOUNDARY, content_type).as_bytes());
		body.extend_from_slice(data);
		body.extend_from_slice(b"\r\n");
	}
	body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
	body
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn slug_encoding() {
		assert_eq!(encode_slug("photo 1.jpg"), "photo 1.jpg");
		assert_eq!(encode_slug("Käse.png"), "=?UTF-8?B?S8Okc2UucG5n?=");
		assert_eq!(encode_slug("a\tb"), "=?UTF-8?B?YQli?=");
	}

	#[test]
	fn multipart_framing() {
		let media = MediaSource::new(mime::IMAGE_PNG, &b"PNG"[..]).with_name("x.png");
		let body = multipart_related("application/atom+xml", b"<entry/>", &media);
		assert_eq!(
			String::from_utf8(body).unwrap(),
			concat!(
				"Media multipart posting\r\n",
				"--END_OF_PART\r\nContent-Type: application/atom+xml\r\n\r\n<entry/>\r\n",
				"--END_OF_PART\r\nContent-Type: image/png\r\n\r\nPNG\r\n",
				"--END_OF_PART--\r\n",
			)
		);
		assert_eq!(media.slug().as_deref(), Some("x.png"));
		assert_eq!(multipart_content_type(), "multipart/related; boundary=\"END_OF_PART\"");
	}
}
