//! URL handling module
//!
//! Registry keys are URL strings with spaces percent-encoded and nothing else
//! touched. This module also parses fetch targets, derives `Host` headers and
//! resolves redirect locations.

mod sanitize;
mod target;

// Re-export main functions
pub use sanitize::{sanitize_filename, sanitize_url};
pub use target::{host_header, parse_target, resolve_redirect};
