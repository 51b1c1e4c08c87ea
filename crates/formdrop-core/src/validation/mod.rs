//! Validation modules

pub mod metadata;

pub use metadata::{
    validate_metadata, validate_metadata_key, MAX_METADATA_BYTES, MAX_METADATA_KEY_LENGTH,
};
