use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed unit: {0}")]
    Malformed(String),
    #[error("method {method}{descriptor} not found in {class}")]
    MethodNotFound {
        class: String,
        method: String,
        descriptor: String,
    },
    #[error("unsupported method shape in {site}: {reason}")]
    UnsupportedShape { site: String, reason: String },
    #[error("re-encode failed: {0}")]
    Encode(String),
}

/// Type metadata of one object unit. All names are in internal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    pub name: String,
    /// `None` only for the root of the type hierarchy.
    pub super_name: Option<String>,
    /// Directly declared interfaces, in declaration order.
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_interface: bool,
}

impl UnitHeader {
    /// Whether the unit can be instantiated and therefore registered.
    pub fn is_concrete(&self) -> bool {
        !self.is_abstract && !self.is_interface
    }

    /// Whether `contract` appears in the interface table or as the direct superclass.
    pub fn declares(&self, contract: &str) -> bool {
        self.interfaces.iter().any(|i| i == contract) || self.super_name.as_deref() == Some(contract)
    }
}

/// The method whose body receives the registration calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjectionSite {
    pub class_name: String,
    pub method_name: String,
    pub descriptor: String,
}

impl std::fmt::Display for InjectionSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}{}", self.class_name, self.method_name, self.descriptor)
    }
}

/// How an implementer is handed to the registration method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterShape {
    /// A fresh instance built with the implementer's no-arg constructor.
    #[default]
    Instance,
    /// The implementer's class literal.
    #[serde(alias = "class")]
    ClassLiteral,
}

/// The registration entry point invoked once per implementer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationCall {
    pub owner: String,
    pub method_name: String,
    pub descriptor: String,
    pub parameter: ParameterShape,
}

/// One (implementer, call) pair to append to an injection site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub implementer: String,
    pub call: RegistrationCall,
}

/// A method invocation found in a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInvocation {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Binary introspection and rewrite capability for one object-unit format.
///
/// Implementations must be pure functions of their inputs: they never touch
/// the filesystem and never execute the unit.
pub trait UnitCodec: Send + Sync {
    /// Backend name (for logging)
    fn name(&self) -> &str;

    /// Whether an archive entry or tree-relative path (normalized to `/`)
    /// names an object unit this codec understands.
    fn accepts_entry(&self, entry_name: &str) -> bool;

    /// Read the type header: name, superclass and interface table.
    fn read_header(&self, bytes: &[u8]) -> Result<UnitHeader, CodecError>;

    /// Append one call sequence per registration to the site's method body
    /// and return the re-encoded unit.
    fn inject(
        &self,
        bytes: &[u8],
        site: &InjectionSite,
        registrations: &[Registration],
    ) -> Result<Vec<u8>, CodecError>;

    /// List the method invocations of the site's body, in code order.
    fn invocations(
        &self,
        bytes: &[u8],
        site: &InjectionSite,
    ) -> Result<Vec<MethodInvocation>, CodecError>;
}
