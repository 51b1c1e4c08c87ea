//! Per-file models exchanged with the multipart parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the parser knows about a file field before any byte is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Name of the form field carrying the file
    pub field_name: String,
    /// Filename sent by the client, if any
    pub original_name: Option<String>,
    /// Transfer encoding declared on the part
    pub encoding: Option<String>,
    /// MIME type declared by the client; never trusted for the stored content type
    pub mimetype: Option<String>,
    /// Request-scoped values (tenant, user, request id) made available to resolvers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl FileInfo {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            ..Self::default()
        }
    }

    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Lowercased extension of the original filename, without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.original_name.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Result of a completed upload, handed back to the parser.
///
/// Built once when the storage backend confirms the object and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: Option<String>,
    pub encoding: Option<String>,
    pub mimetype: Option<String>,
    /// Content type the object was stored with
    pub content_type: String,
    /// Number of bytes forwarded to the backend
    pub size: u64,
    pub bucket: String,
    pub key: String,
    pub location: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
    pub acl: Option<String>,
    pub server_side_encryption: Option<String>,
    pub storage_class: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let info = FileInfo::new("image").with_original_name("Photo.PNG");
        assert_eq!(info.extension().as_deref(), Some("png"));
    }

    #[test]
    fn extension_absent_for_dotfiles_and_missing_names() {
        assert_eq!(FileInfo::new("a").extension(), None);
        assert_eq!(FileInfo::new("a").with_original_name(".env").extension(), None);
        assert_eq!(FileInfo::new("a").with_original_name("README").extension(), None);
    }

    #[test]
    fn uploaded_file_serializes_camel_case() {
        let file = UploadedFile {
            field_name: "image".to_string(),
            original_name: Some("ffffff.png".to_string()),
            encoding: None,
            mimetype: None,
            content_type: "image/png".to_string(),
            size: 68,
            bucket: "test".to_string(),
            key: "abc".to_string(),
            location: "mock-location".to_string(),
            etag: Some("mock-etag".to_string()),
            version_id: None,
            acl: None,
            server_side_encryption: Some("AES256".to_string()),
            storage_class: None,
            content_disposition: None,
            content_encoding: None,
            cache_control: None,
            metadata: BTreeMap::new(),
        };

        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["fieldName"], "image");
        assert_eq!(value["serverSideEncryption"], "AES256");
        assert!(value.get("metadata").is_none());
    }
}
