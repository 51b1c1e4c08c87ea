//! Engine options
//!
//! Options that may vary per file are modelled as a tagged union: a fixed value or a
//! resolver invoked with the file's [`FileInfo`]. Both are resolved through the same
//! `resolve` call at upload time.

use crate::error::BoxError;
use formdrop_core::constants::AUTO_CONTENT_TYPE;
use formdrop_core::{Config, ConfigurationError, FileInfo};
use formdrop_storage::ObjectClient;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ResolverFn<T> = dyn Fn(&FileInfo) -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync;

/// A per-file function producing an option value.
pub struct Resolver<T>(Arc<ResolverFn<T>>);

impl<T: Send + 'static> Resolver<T> {
    /// Wrap a synchronous function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&FileInfo) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Resolver(Arc::new(move |info: &FileInfo| {
            let result = f(info);
            async move { result }.boxed()
        }))
    }

    /// Wrap an asynchronous function. It receives its own copy of the file info.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(FileInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Resolver(Arc::new(move |info: &FileInfo| f(info.clone()).boxed()))
    }

    pub async fn resolve(&self, info: &FileInfo) -> Result<T, BoxError> {
        (self.0)(info).await
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Resolver(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}

/// Fixed value or per-file resolver.
#[derive(Debug, Clone)]
pub enum Resolvable<T> {
    Fixed(T),
    Resolver(Resolver<T>),
}

impl<T: Clone + Send + 'static> Resolvable<T> {
    pub async fn resolve(&self, info: &FileInfo) -> Result<T, BoxError> {
        match self {
            Resolvable::Fixed(value) => Ok(value.clone()),
            Resolvable::Resolver(resolver) => resolver.resolve(info).await,
        }
    }
}

impl<T> From<Resolver<T>> for Resolvable<T> {
    fn from(resolver: Resolver<T>) -> Self {
        Resolvable::Resolver(resolver)
    }
}

/// How the stored object's content type is chosen.
#[derive(Debug, Clone)]
pub enum ContentTypeMode {
    Fixed(String),
    /// Sniff the leading bytes of the stream
    Auto,
    Resolver(Resolver<String>),
}

impl ContentTypeMode {
    /// Parse a textual setting: `"auto"` selects sniffing, anything else is fixed.
    pub fn parse(value: impl Into<String>) -> Self {
        let value = value.into();
        if value == AUTO_CONTENT_TYPE {
            ContentTypeMode::Auto
        } else {
            ContentTypeMode::Fixed(value)
        }
    }
}

/// Unvalidated engine options.
///
/// Build them with the setters (or [`EngineOptions::from_json`] for untyped input)
/// and hand them to `Engine::new`, which validates everything once.
#[derive(Clone, Default)]
pub struct EngineOptions {
    pub(crate) client: Option<Arc<dyn ObjectClient>>,
    pub(crate) bucket: Option<String>,
    pub(crate) key: Option<Resolver<String>>,
    pub(crate) content_type: Option<ContentTypeMode>,
    pub(crate) acl: Option<String>,
    pub(crate) server_side_encryption: Option<String>,
    pub(crate) sse_kms_key_id: Option<String>,
    pub(crate) storage_class: Option<String>,
    pub(crate) cache_control: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_disposition: Option<Resolvable<String>>,
    pub(crate) metadata: Option<Resolvable<BTreeMap<String, String>>>,
    pub(crate) encryption_modes: Option<Vec<String>>,
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, client: Arc<dyn ObjectClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Key generator. Without one, every file gets a random 32-hex-digit key.
    pub fn key(mut self, resolver: Resolver<String>) -> Self {
        self.key = Some(resolver);
        self
    }

    pub fn content_type(mut self, mode: ContentTypeMode) -> Self {
        self.content_type = Some(mode);
        self
    }

    pub fn auto_content_type(self) -> Self {
        self.content_type(ContentTypeMode::Auto)
    }

    /// Canned ACL passed through to the backend.
    pub fn acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = Some(acl.into());
        self
    }

    pub fn server_side_encryption(mut self, token: impl Into<String>) -> Self {
        self.server_side_encryption = Some(token.into());
        self
    }

    pub fn sse_kms_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.sse_kms_key_id = Some(key_id.into());
        self
    }

    pub fn storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn content_encoding(mut self, value: impl Into<String>) -> Self {
        self.content_encoding = Some(value.into());
        self
    }

    pub fn content_disposition(mut self, value: impl Into<Resolvable<String>>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn metadata(mut self, value: impl Into<Resolvable<BTreeMap<String, String>>>) -> Self {
        self.metadata = Some(value.into());
        self
    }

    /// Replace the accepted server-side encryption tokens.
    pub fn encryption_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encryption_modes = Some(modes.into_iter().map(Into::into).collect());
        self
    }

    /// Read options from an untyped configuration object.
    ///
    /// Every recognized field is type-checked here; a wrong-typed value is a
    /// `ConfigurationError`. `key` cannot be expressed as data, so any value for it is
    /// rejected. `contentType` accepts a MIME type or `"auto"`. The client is not part
    /// of the object and must be set afterwards.
    pub fn from_json(value: &Value) -> Result<Self, ConfigurationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ConfigurationError::invalid_type("options", "an object", value))?;

        let mut options = EngineOptions::new();
        options.bucket = string_field(object, "bucket")?;

        if let Some(key) = present(object, "key") {
            return Err(ConfigurationError::invalid_type("key", "a function", key));
        }

        options.content_type = string_field(object, "contentType")?.map(ContentTypeMode::parse);

        options.acl = string_field(object, "acl")?;
        options.server_side_encryption = string_field(object, "serverSideEncryption")?;
        options.sse_kms_key_id = string_field(object, "sseKmsKeyId")?;
        options.storage_class = string_field(object, "storageClass")?;
        options.cache_control = string_field(object, "cacheControl")?;
        options.content_encoding = string_field(object, "contentEncoding")?;
        options.content_disposition =
            string_field(object, "contentDisposition")?.map(Resolvable::Fixed);

        if let Some(metadata) = present(object, "metadata") {
            let entries = metadata.as_object().ok_or_else(|| {
                ConfigurationError::invalid_type("metadata", "an object", metadata)
            })?;
            let mut map = BTreeMap::new();
            for (name, value) in entries {
                let value = value.as_str().ok_or_else(|| {
                    ConfigurationError::invalid_type(format!("metadata.{}", name), "a string", value)
                })?;
                map.insert(name.clone(), value.to_string());
            }
            options.metadata = Some(Resolvable::Fixed(map));
        }

        if let Some(modes) = present(object, "encryptionModes") {
            let items = modes.as_array().ok_or_else(|| {
                ConfigurationError::invalid_type("encryptionModes", "an array of strings", modes)
            })?;
            let mut tokens = Vec::with_capacity(items.len());
            for item in items {
                let token = item.as_str().ok_or_else(|| {
                    ConfigurationError::invalid_type("encryptionModes", "an array of strings", item)
                })?;
                tokens.push(token.to_string());
            }
            options.encryption_modes = Some(tokens);
        }

        for name in object.keys() {
            if !KNOWN_FIELDS.contains(&name.as_str()) {
                tracing::debug!(field = %name, "Ignoring unknown engine option");
            }
        }

        Ok(options)
    }

    /// Seed options from environment configuration. The client is set separately.
    pub fn from_config(config: &Config) -> Self {
        let mut options = EngineOptions::new();
        options.bucket = config.s3_bucket.clone();
        options.content_type = config.content_type.clone().map(ContentTypeMode::parse);
        options.acl = config.acl.clone();
        options.server_side_encryption = config.server_side_encryption.clone();
        options.sse_kms_key_id = config.sse_kms_key_id.clone();
        options.storage_class = config.storage_class.clone();
        options.encryption_modes = Some(config.encryption_modes.clone());
        if let Some(ref prefix) = config.key_prefix {
            options.key = Some(crate::keys::prefixed_random_key(prefix.clone()));
        }
        options
    }
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("client", &self.client.as_ref().map(|c| c.backend_type()))
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("acl", &self.acl)
            .field("server_side_encryption", &self.server_side_encryption)
            .field("storage_class", &self.storage_class)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

const KNOWN_FIELDS: &[&str] = &[
    "bucket",
    "key",
    "contentType",
    "acl",
    "serverSideEncryption",
    "sseKmsKeyId",
    "storageClass",
    "cacheControl",
    "contentEncoding",
    "contentDisposition",
    "metadata",
    "encryptionModes",
];

/// Field value, treating an explicit `null` like an absent field.
fn present<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|v| !v.is_null())
}

fn string_field(
    object: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<String>, ConfigurationError> {
    match present(object, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigurationError::invalid_type(name, "a string", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolvable_fixed_and_resolver_resolve_uniformly() {
        let info = FileInfo::new("avatar").with_original_name("me.png");

        let fixed: Resolvable<String> = Resolvable::Fixed("inline".to_string());
        assert_eq!(fixed.resolve(&info).await.unwrap(), "inline");

        let sync: Resolvable<String> =
            Resolver::from_fn(|info: &FileInfo| Ok(format!("field-{}", info.field_name))).into();
        assert_eq!(sync.resolve(&info).await.unwrap(), "field-avatar");

        let asynchronous: Resolvable<String> = Resolver::from_async(|info: FileInfo| async move {
            tokio::task::yield_now().await;
            Ok::<_, BoxError>(info.original_name.unwrap_or_default())
        })
        .into();
        assert_eq!(asynchronous.resolve(&info).await.unwrap(), "me.png");
    }

    #[test]
    fn content_type_mode_parses_auto_sentinel() {
        assert!(matches!(ContentTypeMode::parse("auto"), ContentTypeMode::Auto));
        assert!(matches!(
            ContentTypeMode::parse("image/png"),
            ContentTypeMode::Fixed(ref ct) if ct == "image/png"
        ));
        assert!(matches!(ContentTypeMode::parse("AUTO"), ContentTypeMode::Fixed(_)));
    }

    #[test]
    fn from_json_reads_recognized_fields() {
        let options = EngineOptions::from_json(&json!({
            "bucket": "test",
            "contentType": "auto",
            "acl": "public-read",
            "serverSideEncryption": "aws:kms",
            "metadata": { "origin": "form" },
            "somethingElse": 1,
        }))
        .unwrap();

        assert_eq!(options.bucket.as_deref(), Some("test"));
        assert!(matches!(options.content_type, Some(ContentTypeMode::Auto)));
        assert_eq!(options.acl.as_deref(), Some("public-read"));
        assert!(matches!(options.metadata, Some(Resolvable::Fixed(ref m)) if m["origin"] == "form"));
    }

    #[test]
    fn from_json_treats_null_as_absent() {
        let options = EngineOptions::from_json(&json!({ "bucket": "b", "acl": null })).unwrap();
        assert!(options.acl.is_none());
    }

    #[test]
    fn from_json_rejects_wrong_types() {
        let cases = [
            (json!({ "bucket": 1337 }), "bucket"),
            (json!({ "bucket": "b", "key": 1337 }), "key"),
            (json!({ "bucket": "b", "key": "string" }), "key"),
            (json!({ "bucket": "b", "contentType": 1337 }), "contentType"),
            (json!({ "bucket": "b", "acl": true }), "acl"),
            (json!({ "bucket": "b", "metadata": { "a": 1 } }), "metadata.a"),
            (json!({ "bucket": "b", "encryptionModes": "AES256" }), "encryptionModes"),
        ];

        for (value, field) in cases {
            match EngineOptions::from_json(&value) {
                Err(ConfigurationError::InvalidType { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected type error for {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn from_json_requires_an_object() {
        assert!(matches!(
            EngineOptions::from_json(&json!("bucket")),
            Err(ConfigurationError::InvalidType { .. })
        ));
    }
}
