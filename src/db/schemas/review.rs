//! Review documents
//!
//! Reviews are read-only aggregate content; their fields are passed
//! through to clients unmodified.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection name for reviews
pub const REVIEW_COLLECTION: &str = "review";

/// An opaque review document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Review(pub Map<String, Value>);
