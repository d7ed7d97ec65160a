//! JVM class-file backend for the registration pipeline.
//!
//! [`ClassFileCodec`] reads class headers and rewrites method bodies with
//! `ristretto_classfile`. Archives (jars) are plain zip containers and are
//! handled by the core; this crate only ever sees single class files.

mod codec;
mod rewrite;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;

pub use codec::ClassFileCodec;
