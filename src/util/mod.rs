//! Utility functions shared by the fetcher, the builder and config loading.
//!
//! - **URL validation**: base-URL policy for the upstream API and `Host` header derivation
//! - **Text processing**: XML-safe character filtering and bounded previews

mod text;
mod url_validator;

pub use text::{preview, strip_xml_invalid_chars};
pub use url_validator::{host_header, validate_base_url, UrlValidationError};
