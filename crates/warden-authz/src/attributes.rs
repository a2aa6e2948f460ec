//! Per-call authorization attributes.
//!
//! [`Attributes`] describe a single inbound call: how it arrived, what it
//! targets, and what the transport layer learned about the caller's identity.
//! They are serialised verbatim as the Rego `input` document.

use serde::{Deserialize, Serialize};

/// Protocol a call arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// gRPC (including gRPC-web).
    #[default]
    Grpc,
    /// Plain HTTP.
    Http,
}

impl Protocol {
    /// Lowercase protocol name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::Http => "http",
        }
    }

    /// Package consulted when no more specific scope decides, e.g. `grpc_default`.
    pub const fn default_package(self) -> &'static str {
        match self {
            Self::Grpc => "grpc_default",
            Self::Http => "http_default",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a scoped permission assignment's resource is matched against the
/// call's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// No resource type; never matches a target.
    #[default]
    Unspecified,
    /// The target name must equal the resource.
    NamedResource,
    /// The target name must equal the resource or sit beneath it, e.g.
    /// resource `floor1` matches `floor1` and `floor1/light1` but not `floor10`.
    NamedResourcePathPrefix,
}

/// A permission granted to the caller, globally or scoped to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionAssignment {
    /// Permission identifier, e.g. `trait:read`.
    pub permission: String,
    /// Whether the grant is limited to `resource`.
    pub scoped: bool,
    /// How `resource` is matched when scoped.
    pub resource_type: ResourceType,
    /// Resource locator the grant is scoped to.
    pub resource: String,
}

impl PermissionAssignment {
    /// A grant that applies to every resource.
    pub fn global(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
            ..Self::default()
        }
    }

    /// A grant limited to `resource`, matched according to `resource_type`.
    pub fn scoped(
        permission: impl Into<String>,
        resource_type: ResourceType,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            permission: permission.into(),
            scoped: true,
            resource_type,
            resource: resource.into(),
        }
    }
}

/// Claims carried by a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token subject.
    #[serde(default)]
    pub subject: String,
    /// Role names granted to the subject.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Zones the subject is restricted to.
    #[serde(default)]
    pub zones: Vec<String>,
    /// Whether the subject is a service account.
    #[serde(default)]
    pub is_service: bool,
    /// Ordered permission assignments.
    #[serde(default)]
    pub permissions: Vec<PermissionAssignment>,
}

/// Everything the decision engine knows about one call.
///
/// Built once per request by the identity-extraction layer and never
/// mutated afterwards; the resolver only ever borrows it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attributes {
    /// Protocol the call arrived over.
    pub protocol: Protocol,
    /// Fully-qualified, dot-delimited service name, e.g. `foo.bar.baz`.
    pub service: String,
    /// Method name within the service.
    pub method: String,
    /// Decoded request payload, `Null` when there is none.
    #[serde(default)]
    pub request: serde_json::Value,
    /// A bearer token was supplied.
    pub token_present: bool,
    /// The bearer token was validated upstream.
    pub token_valid: bool,
    /// Claims of the bearer token.
    #[serde(default)]
    pub token_claims: TokenClaims,
    /// A client certificate was supplied.
    pub certificate_present: bool,
    /// The client certificate was validated upstream.
    pub certificate_valid: bool,
}

impl Attributes {
    /// Start building attributes for a call.
    pub fn builder() -> AttributesBuilder {
        AttributesBuilder::default()
    }

    /// Whether the caller presented any valid credential.
    ///
    /// Presence without validity does not count.
    pub const fn is_authenticated(&self) -> bool {
        self.token_valid || self.certificate_valid
    }
}

/// Builder for [`Attributes`].
#[derive(Debug, Clone, Default)]
pub struct AttributesBuilder {
    attributes: Attributes,
}

impl AttributesBuilder {
    /// Set the protocol.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.attributes.protocol = protocol;
        self
    }

    /// Set the service name.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.attributes.service = service.into();
        self
    }

    /// Set the method name.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.attributes.method = method.into();
        self
    }

    /// Set the decoded request payload.
    pub fn request(mut self, request: serde_json::Value) -> Self {
        self.attributes.request = request;
        self
    }

    /// Record a bearer token and whether it validated.
    pub fn token(mut self, valid: bool, claims: TokenClaims) -> Self {
        self.attributes.token_present = true;
        self.attributes.token_valid = valid;
        self.attributes.token_claims = claims;
        self
    }

    /// Record a client certificate and whether it validated.
    pub fn certificate(mut self, valid: bool) -> Self {
        self.attributes.certificate_present = true;
        self.attributes.certificate_valid = valid;
        self
    }

    /// Finish building.
    pub fn build(self) -> Attributes {
        self.attributes
    }
}
