//! Capability contracts between the registration pipeline and a concrete
//! object-unit backend.
//!
//! The core never parses binary units itself. It consumes a [`UnitCodec`]
//! that can read a unit's type header and rewrite a method body, and a
//! handful of naming helpers that keep internal (`a/b/C`) and dotted
//! (`a.b.C`) forms apart.

pub mod codec;
pub mod naming;

pub use codec::{
    CodecError, InjectionSite, MethodInvocation, ParameterShape, Registration, RegistrationCall,
    UnitCodec, UnitHeader,
};
pub use naming::{dotted_name, internal_name, normalize_entry_path, unit_entry_name};
