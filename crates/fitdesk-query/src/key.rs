//! Cache keys

use fitdesk_core::QueryParams;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Logical identity of a cached read
///
/// An ordered list of JSON segments such as `["users", {"page": 1}]`.
/// Segments are stored in canonical (key-sorted, compact) JSON text, so two
/// keys built from equal values are equal and hash alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    segments: Vec<String>,
}

impl QueryKey {
    /// Key with a single string segment
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            segments: vec![Value::String(root.into()).to_string()],
        }
    }

    /// Append a segment
    ///
    /// Values that cannot be represented as JSON become `null`.
    #[must_use]
    pub fn with<T: Serialize + ?Sized>(mut self, segment: &T) -> Self {
        let value = serde_json::to_value(segment).unwrap_or(Value::Null);
        self.segments.push(value.to_string());
        self
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for a key without segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether every segment of `self` equals the leading segments of `other`
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Segments decoded back into JSON values
    #[must_use]
    pub fn segments(&self) -> Vec<Value> {
        self.segments
            .iter()
            .map(|s| serde_json::from_str(s).unwrap_or(Value::Null))
            .collect()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.segments.join(","))
    }
}

/// Well-known keys for the console's resources
pub mod keys {
    use super::{QueryKey, QueryParams};

    /// Root of every user list, used for invalidation
    #[must_use]
    pub fn users() -> QueryKey {
        QueryKey::new("users")
    }

    /// One page of the user list
    #[must_use]
    pub fn users_list(params: &QueryParams) -> QueryKey {
        users().with(params)
    }

    /// A single user by id
    #[must_use]
    pub fn user(id: &str) -> QueryKey {
        QueryKey::new("user").with(id)
    }

    /// The authenticated user
    #[must_use]
    pub fn current_user() -> QueryKey {
        QueryKey::new("currentUser")
    }
}
