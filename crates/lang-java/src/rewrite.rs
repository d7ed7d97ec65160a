//! Method-body rewrite: splice registration call sequences in front of the
//! trailing `return` of an injection site.
//!
//! Only straight-line tails are rewritten. Inserting in front of the last
//! instruction leaves every earlier byte offset untouched, so branch targets,
//! stack map frames and line numbers stay valid; a frame that pointed at the
//! old `return` now points at the first inserted instruction, which starts
//! with the same (empty) operand stack.

use autoreg_plugin::{CodecError, InjectionSite, ParameterShape, Registration, RegistrationCall};
use ristretto_classfile::attributes::{Attribute, Instruction};
use ristretto_classfile::{ClassFile, MethodAccessFlags};
use tracing::debug;

use crate::codec::{class_name_at, find_method};

const CONSTRUCTOR: &str = "<init>";
const NO_ARG_DESCRIPTOR: &str = "()V";

fn unsupported(site: &InjectionSite, reason: impl Into<String>) -> CodecError {
    CodecError::UnsupportedShape {
        site: site.to_string(),
        reason: reason.into(),
    }
}

fn pool_error(site: &InjectionSite, e: ristretto_classfile::Error) -> CodecError {
    CodecError::Encode(format!("{site}: constant pool update failed: {e:?}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Static,
    /// `aload_0` receiver, only possible from an instance site.
    Virtual,
}

/// How to invoke `call` from the site. A register method declared by the
/// rewritten class is dispatched according to its own `ACC_STATIC` flag;
/// one declared elsewhere is invoked statically.
fn dispatch_for(
    class: &ClassFile,
    site: &InjectionSite,
    this_class: &str,
    site_is_static: bool,
    call: &RegistrationCall,
) -> Result<Dispatch, CodecError> {
    if call.owner != this_class {
        return Ok(Dispatch::Static);
    }
    let register = InjectionSite {
        class_name: this_class.to_string(),
        method_name: call.method_name.clone(),
        descriptor: call.descriptor.clone(),
    };
    let index = find_method(class, &register)?;
    if class.methods[index]
        .access_flags
        .contains(MethodAccessFlags::STATIC)
    {
        Ok(Dispatch::Static)
    } else if site_is_static {
        Err(unsupported(
            site,
            format!("{register} is an instance method but the site is static"),
        ))
    } else {
        Ok(Dispatch::Virtual)
    }
}

/// Build the call sequences and their peak operand-stack depth.
fn build_sequence(
    class: &mut ClassFile,
    site: &InjectionSite,
    this_class: &str,
    is_static: bool,
    registrations: &[Registration],
) -> Result<(Vec<Instruction>, u16), CodecError> {
    let dispatches = registrations
        .iter()
        .map(|r| dispatch_for(class, site, this_class, is_static, &r.call))
        .collect::<Result<Vec<_>, _>>()?;

    let pool = &mut class.constant_pool;
    let mut sequence = Vec::with_capacity(registrations.len() * 4);
    let mut peak = 0u16;

    for (registration, dispatch) in registrations.iter().zip(dispatches) {
        let call = &registration.call;
        let virtual_dispatch = dispatch == Dispatch::Virtual;

        let owner_index = pool.add_class(&call.owner).map_err(|e| pool_error(site, e))?;
        let register_ref = pool
            .add_method_ref(owner_index, &call.method_name, &call.descriptor)
            .map_err(|e| pool_error(site, e))?;
        let implementer_index = pool
            .add_class(&registration.implementer)
            .map_err(|e| pool_error(site, e))?;

        let mut depth = 0u16;
        if virtual_dispatch {
            sequence.push(Instruction::Aload_0);
            depth += 1;
        }
        match call.parameter {
            ParameterShape::Instance => {
                let constructor = pool
                    .add_method_ref(implementer_index, CONSTRUCTOR, NO_ARG_DESCRIPTOR)
                    .map_err(|e| pool_error(site, e))?;
                sequence.push(Instruction::New(implementer_index));
                sequence.push(Instruction::Dup);
                sequence.push(Instruction::Invokespecial(constructor));
                depth += 2;
            }
            ParameterShape::ClassLiteral => {
                sequence.push(Instruction::Ldc_w(implementer_index));
                depth += 1;
            }
        }
        sequence.push(if virtual_dispatch {
            Instruction::Invokevirtual(register_ref)
        } else {
            Instruction::Invokestatic(register_ref)
        });
        peak = peak.max(depth);
    }

    Ok((sequence, peak))
}

pub(crate) fn append_registrations(
    class: &mut ClassFile,
    site: &InjectionSite,
    registrations: &[Registration],
) -> Result<(), CodecError> {
    if !site.descriptor.ends_with(")V") {
        return Err(unsupported(site, "injection site must return void"));
    }

    let this_class = class_name_at(&class.constant_pool, class.this_class)?;
    if this_class != site.class_name {
        return Err(unsupported(
            site,
            format!("unit declares {this_class}, expected {}", site.class_name),
        ));
    }

    let index = find_method(class, site)?;
    let is_static = class.methods[index]
        .access_flags
        .contains(MethodAccessFlags::STATIC);
    let (sequence, peak) = build_sequence(class, site, &this_class, is_static, registrations)?;
    let inserted = sequence.len();

    let code_attribute = class.methods[index]
        .attributes
        .iter_mut()
        .find_map(|attribute| match attribute {
            Attribute::Code {
                max_stack,
                code,
                exception_table,
                attributes,
                ..
            } => Some((max_stack, code, exception_table, attributes)),
            _ => None,
        });
    let Some((max_stack, code, exception_table, attributes)) = code_attribute else {
        return Err(unsupported(site, "method has no code (abstract or native)"));
    };

    if !exception_table.is_empty() {
        return Err(unsupported(site, "method declares exception handlers"));
    }
    let returns = code
        .iter()
        .filter(|instruction| matches!(instruction, Instruction::Return))
        .count();
    if returns != 1 || !matches!(code.last(), Some(Instruction::Return)) {
        return Err(unsupported(
            site,
            format!("expected a single trailing return, found {returns} return(s)"),
        ));
    }

    let at = code.len() - 1;
    let tail = code.split_off(at);
    code.extend(sequence);
    code.extend(tail);
    *max_stack = (*max_stack).max(peak);
    attributes.retain(|attribute| {
        !matches!(
            attribute,
            Attribute::LocalVariableTable { .. } | Attribute::LocalVariableTypeTable { .. }
        )
    });

    debug!(
        "{}: inserted {} instructions for {} registrations",
        site,
        inserted,
        registrations.len()
    );
    Ok(())
}
