use autoreg_plugin::{
    CodecError, InjectionSite, MethodInvocation, Registration, UnitCodec, UnitHeader,
};
use ristretto_classfile::attributes::{Attribute, Instruction};
use ristretto_classfile::{ClassAccessFlags, ClassFile, Constant, ConstantPool};
use std::io::Cursor;

use crate::rewrite;

const CLASS_SUFFIX: &str = ".class";
const SKIPPED_UNITS: [&str; 2] = ["module-info.class", "package-info.class"];

/// [`UnitCodec`] for JVM class files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassFileCodec;

impl ClassFileCodec {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn parse_class(bytes: &[u8]) -> Result<ClassFile, CodecError> {
    ClassFile::from_bytes(&mut Cursor::new(bytes.to_vec()))
        .map_err(|e| CodecError::Malformed(format!("failed to parse class: {e:?}")))
}

pub(crate) fn class_name_at(pool: &ConstantPool, index: u16) -> Result<String, CodecError> {
    pool.try_get_class(index)
        .map(|name| name.to_string())
        .map_err(|e| CodecError::Malformed(format!("bad class constant #{index}: {e:?}")))
}

fn utf8_at(pool: &ConstantPool, index: u16) -> Result<String, CodecError> {
    pool.try_get_utf8(index)
        .map(|value| value.to_string())
        .map_err(|e| CodecError::Malformed(format!("bad utf8 constant #{index}: {e:?}")))
}

/// Index of the method matching the site's name and descriptor.
pub(crate) fn find_method(class: &ClassFile, site: &InjectionSite) -> Result<usize, CodecError> {
    for (index, method) in class.methods.iter().enumerate() {
        let name = utf8_at(&class.constant_pool, method.name_index)?;
        let descriptor = utf8_at(&class.constant_pool, method.descriptor_index)?;
        if name == site.method_name && descriptor == site.descriptor {
            return Ok(index);
        }
    }
    Err(CodecError::MethodNotFound {
        class: site.class_name.clone(),
        method: site.method_name.clone(),
        descriptor: site.descriptor.clone(),
    })
}

fn resolve_method_ref(pool: &ConstantPool, index: u16) -> Result<MethodInvocation, CodecError> {
    let malformed = |e: ristretto_classfile::Error| {
        CodecError::Malformed(format!("bad method constant #{index}: {e:?}"))
    };
    let (class_index, name_and_type_index) = match pool.try_get(index).map_err(malformed)? {
        Constant::MethodRef {
            class_index,
            name_and_type_index,
        }
        | Constant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        } => (*class_index, *name_and_type_index),
        other => {
            return Err(CodecError::Malformed(format!(
                "constant #{index} is not a method reference: {other:?}"
            )));
        }
    };
    let malformed = |e: ristretto_classfile::Error| {
        CodecError::Malformed(format!("bad name-and-type #{name_and_type_index}: {e:?}"))
    };
    let name_and_type = pool.try_get(name_and_type_index).map_err(malformed)?;
    let (name_index, descriptor_index) = match name_and_type {
        Constant::NameAndType {
            name_index,
            descriptor_index,
        } => (*name_index, *descriptor_index),
        other => {
            return Err(CodecError::Malformed(format!(
                "constant #{name_and_type_index} is not a name-and-type: {other:?}"
            )));
        }
    };

    Ok(MethodInvocation {
        owner: class_name_at(pool, class_index)?,
        name: utf8_at(pool, name_index)?,
        descriptor: utf8_at(pool, descriptor_index)?,
    })
}

impl UnitCodec for ClassFileCodec {
    fn name(&self) -> &str {
        "classfile"
    }

    fn accepts_entry(&self, entry_name: &str) -> bool {
        if !entry_name.ends_with(CLASS_SUFFIX) || entry_name.starts_with("META-INF/") {
            return false;
        }
        let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);
        !SKIPPED_UNITS.contains(&file_name)
    }

    fn read_header(&self, bytes: &[u8]) -> Result<UnitHeader, CodecError> {
        let class = parse_class(bytes)?;
        let pool = &class.constant_pool;

        let name = class_name_at(pool, class.this_class)?;
        let super_name = match class.super_class {
            0 => None,
            index => Some(class_name_at(pool, index)?),
        };
        let interfaces = class
            .interfaces
            .iter()
            .map(|index| class_name_at(pool, *index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UnitHeader {
            name,
            super_name,
            interfaces,
            is_abstract: class.access_flags.contains(ClassAccessFlags::ABSTRACT),
            is_interface: class.access_flags.contains(ClassAccessFlags::INTERFACE),
        })
    }

    fn inject(
        &self,
        bytes: &[u8],
        site: &InjectionSite,
        registrations: &[Registration],
    ) -> Result<Vec<u8>, CodecError> {
        let mut class = parse_class(bytes)?;
        rewrite::append_registrations(&mut class, site, registrations)?;

        let mut out = Vec::with_capacity(bytes.len() + registrations.len() * 16);
        class
            .to_bytes(&mut out)
            .map_err(|e| CodecError::Encode(format!("{site}: {e:?}")))?;
        Ok(out)
    }

    fn invocations(
        &self,
        bytes: &[u8],
        site: &InjectionSite,
    ) -> Result<Vec<MethodInvocation>, CodecError> {
        let class = parse_class(bytes)?;
        let index = find_method(&class, site)?;

        let mut calls = Vec::new();
        for attribute in &class.methods[index].attributes {
            let Attribute::Code { code, .. } = attribute else {
                continue;
            };
            for instruction in code {
                let method_index = match instruction {
                    Instruction::Invokestatic(i)
                    | Instruction::Invokevirtual(i)
                    | Instruction::Invokespecial(i) => *i,
                    _ => continue,
                };
                calls.push(resolve_method_ref(&class.constant_pool, method_index)?);
            }
        }
        Ok(calls)
    }
}
