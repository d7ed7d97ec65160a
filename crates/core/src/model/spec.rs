//! Tracked contracts and their registry targets.
//!
//! Names are accepted in dotted or internal form and normalized to internal
//! form (`com/example/Plugin`) when a [`TrackedSpec`] is built.

use autoreg_plugin::{
    InjectionSite, ParameterShape, RegistrationCall, dotted_name, internal_name, unit_entry_name,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{AutoregError, Result};

const STATIC_INITIALIZER: &str = "<clinit>";
const VOID_NO_ARGS: &str = "()V";

fn default_init_method() -> String {
    STATIC_INITIALIZER.to_string()
}

fn default_init_descriptor() -> String {
    VOID_NO_ARGS.to_string()
}

/// One tracked contract and the registry target its implementers are
/// registered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub interface_name: String,
    /// Direct superclasses that also qualify a unit as an implementer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub super_classes: Vec<String>,
    pub register_class_name: String,
    pub register_method_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_method_descriptor: Option<String>,
    #[serde(default)]
    pub parameter: ParameterShape,
    /// Registry target unit; defaults to `register_class_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_class_name: Option<String>,
    /// Method of the registry target that receives the calls. Its body
    /// must end in its only `return` and declare no exception handlers;
    /// any other shape fails the injection, and with it the run.
    #[serde(default = "default_init_method")]
    pub init_method_name: String,
    #[serde(default = "default_init_descriptor")]
    pub init_method_descriptor: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl InterfaceSpec {
    pub fn new(interface_name: &str, register_class_name: &str, register_method_name: &str) -> Self {
        Self {
            interface_name: interface_name.to_string(),
            super_classes: Vec::new(),
            register_class_name: register_class_name.to_string(),
            register_method_name: register_method_name.to_string(),
            register_method_descriptor: None,
            parameter: ParameterShape::Instance,
            init_class_name: None,
            init_method_name: default_init_method(),
            init_method_descriptor: default_init_descriptor(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn with_init_method(mut self, class_name: &str, method: &str, descriptor: &str) -> Self {
        self.init_class_name = Some(class_name.to_string());
        self.init_method_name = method.to_string();
        self.init_method_descriptor = descriptor.to_string();
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterShape) -> Self {
        self.parameter = parameter;
        self
    }

    fn normalized(&self) -> Self {
        let mut spec = self.clone();
        spec.interface_name = internal_name(&self.interface_name);
        spec.super_classes = self.super_classes.iter().map(|s| internal_name(s)).collect();
        spec.register_class_name = internal_name(&self.register_class_name);
        spec.init_class_name = self.init_class_name.as_deref().map(internal_name);
        spec
    }

    /// Registry target unit (internal form once normalized).
    pub fn target_class(&self) -> &str {
        self.init_class_name
            .as_deref()
            .unwrap_or(&self.register_class_name)
    }

    /// Contract names a unit may declare to qualify as an implementer.
    pub fn contracts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.interface_name.as_str()).chain(self.super_classes.iter().map(String::as_str))
    }

    pub fn injection_site(&self) -> InjectionSite {
        InjectionSite {
            class_name: self.target_class().to_string(),
            method_name: self.init_method_name.clone(),
            descriptor: self.init_method_descriptor.clone(),
        }
    }

    pub fn registration_call(&self) -> RegistrationCall {
        let descriptor = self
            .register_method_descriptor
            .clone()
            .unwrap_or_else(|| match self.parameter {
                ParameterShape::Instance => format!("(L{};)V", self.interface_name),
                ParameterShape::ClassLiteral => "(Ljava/lang/Class;)V".to_string(),
            });
        RegistrationCall {
            owner: self.register_class_name.clone(),
            method_name: self.register_method_name.clone(),
            descriptor,
            parameter: self.parameter,
        }
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("interface_name", &self.interface_name),
            ("register_class_name", &self.register_class_name),
            ("register_method_name", &self.register_method_name),
            ("init_method_name", &self.init_method_name),
            ("init_method_descriptor", &self.init_method_descriptor),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AutoregError::Config(format!(
                    "{field} must not be empty (interface '{}')",
                    self.interface_name
                )));
            }
        }
        Ok(())
    }
}

fn compile_patterns(patterns: &[String], spec: &InterfaceSpec) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                AutoregError::Config(format!("bad pattern '{p}' for {}: {e}", spec.interface_name))
            })
        })
        .collect()
}

/// A validated, normalized spec with its implementer filters compiled.
#[derive(Debug, Clone)]
pub struct TrackedSpec {
    pub spec: InterfaceSpec,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl TrackedSpec {
    pub fn new(spec: &InterfaceSpec) -> Result<Self> {
        spec.validate()?;
        let spec = spec.normalized();
        let include = compile_patterns(&spec.include, &spec)?;
        let exclude = compile_patterns(&spec.exclude, &spec)?;
        Ok(Self {
            spec,
            include,
            exclude,
        })
    }

    /// Include/exclude filtering over the dotted implementer name.
    pub fn accepts(&self, implementer: &str) -> bool {
        let dotted = dotted_name(implementer);
        let included = self.include.is_empty() || self.include.iter().any(|r| r.is_match(&dotted));
        included && !self.exclude.iter().any(|r| r.is_match(&dotted))
    }

    pub fn target_entry_name(&self) -> String {
        unit_entry_name(self.spec.target_class())
    }
}

/// The registration configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    pub registrations: Vec<InterfaceSpec>,
    /// Also register implementers reached through intermediate supertypes.
    #[serde(default)]
    pub resolve_hierarchy: bool,
}

impl RegisterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AutoregError::input(path, e))?;
        let config: RegisterConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracked().map(|_| ())
    }

    pub fn tracked(&self) -> Result<Vec<TrackedSpec>> {
        self.registrations.iter().map(TrackedSpec::new).collect()
    }

    /// Identity of everything a cached harvest depends on besides the archive.
    pub fn fingerprint(&self) -> u64 {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        xxh3_64(&bytes)
    }
}
