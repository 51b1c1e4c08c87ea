//! Shared constants.

/// Content type attached to objects when nothing more specific is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Sentinel accepted by dynamic configuration to request content-type sniffing.
pub const AUTO_CONTENT_TYPE: &str = "auto";

/// Server-side encryption tokens accepted when no explicit set is configured.
pub const DEFAULT_ENCRYPTION_MODES: &[&str] = &["AES256", "aws:kms", "aws:kms:dsse"];

/// Encryption tokens that select a KMS-managed key (and so accept a KMS key id).
pub const KMS_ENCRYPTION_MODES: &[&str] = &["aws:kms", "aws:kms:dsse"];

/// S3 rejects non-final multipart parts smaller than 5 MiB.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default multipart part size used by the S3 backend.
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Number of leading bytes inspected when sniffing content types.
pub const SNIFF_WINDOW: usize = 4100;
