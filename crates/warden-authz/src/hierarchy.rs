//! Scope hierarchy for a call.
//!
//! A call to service `s1.s2.s3` over gRPC is decided by querying, in order:
//!
//! ```text
//! data.s1.s2.s3.allow
//! data.s1.s2.allow
//! data.s1.allow
//! data.grpc_default.allow
//! ```
//!
//! The order is the precedence order: the most specific scope with a
//! verdict wins.

use crate::attributes::Protocol;
use crate::error::{AuthzError, AuthzResult};

/// Leaf rule queried at every scope.
pub const ALLOW_RULE: &str = "allow";

const REGO_KEYWORDS: &[&str] = &[
    "as", "contains", "default", "else", "every", "false", "if", "import", "in", "not", "null",
    "package", "some", "true", "with",
];

/// Whether `name` is a dotted path of Rego identifiers, usable both as a
/// package name and verbatim inside a `data.` reference.
pub fn is_package_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !REGO_KEYWORDS.contains(&segment)
        })
}

/// Reject service names that cannot be queried as scopes.
///
/// Scope queries are Rego source, so anything other than plain identifiers
/// (brackets, wildcards, dashes, empty segments) would change what is
/// evaluated. An empty name is accepted and only reaches the protocol default.
pub fn check_service_name(service: &str) -> AuthzResult<()> {
    if service.is_empty() || is_package_path(service) {
        Ok(())
    } else {
        Err(AuthzError::InvalidInput(format!(
            "service name {service:?} is not a dotted identifier path"
        )))
    }
}

/// Iterator over the fully-qualified queries for a service, most specific
/// first, ending with the protocol default.
#[derive(Debug, Clone)]
pub struct QueryHierarchy<'a> {
    segments: Vec<&'a str>,
    protocol: Protocol,
    done: bool,
}

impl<'a> QueryHierarchy<'a> {
    /// Create the hierarchy for `service` called over `protocol`.
    pub fn new(service: &'a str, protocol: Protocol) -> Self {
        let segments = if service.is_empty() {
            Vec::new()
        } else {
            service.split('.').collect()
        };
        Self {
            segments,
            protocol,
            done: false,
        }
    }
}

impl Iterator for QueryHierarchy<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        if self.segments.is_empty() {
            self.done = true;
            return Some(format!(
                "data.{}.{ALLOW_RULE}",
                self.protocol.default_package()
            ));
        }
        let query = format!("data.{}.{ALLOW_RULE}", self.segments.join("."));
        self.segments.pop();
        Some(query)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done { 0 } else { self.segments.len() + 1 };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for QueryHierarchy<'_> {}

/// Collect the queries for `service` called over `protocol`.
pub fn query_hierarchy(service: &str, protocol: Protocol) -> Vec<String> {
    QueryHierarchy::new(service, protocol).collect()
}
