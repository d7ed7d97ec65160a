//! Minimal class-file assembler for tests.
//!
//! Emits Java 8 class files with a constant pool holding only `Utf8` and
//! `Class` entries, no fields, and methods carrying a bare `Code` attribute.

use std::collections::HashMap;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_SUPER: u16 = 0x0020;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const OP_RETURN: u8 = 0xB1;

/// Local-variable slots taken by the arguments of a method descriptor.
fn argument_slots(descriptor: &str) -> u16 {
    let arguments = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");
    let mut slots = 0;
    let mut chars = arguments.chars();
    while let Some(c) = chars.next() {
        match c {
            'J' | 'D' => slots += 2,
            'L' => {
                chars.by_ref().find(|&c| c == ';');
                slots += 1;
            }
            '[' => {
                while let Some(element) = chars.next() {
                    if element == 'L' {
                        chars.by_ref().find(|&c| c == ';');
                    }
                    if element != '[' {
                        break;
                    }
                }
                slots += 1;
            }
            _ => slots += 1,
        }
    }
    slots
}

#[derive(Debug, Clone)]
struct MethodFixture {
    access: u16,
    name: String,
    descriptor: String,
    code: Vec<u8>,
    max_stack: u16,
    max_locals: u16,
}

#[derive(Debug, Clone)]
pub struct ClassFixture {
    access: u16,
    name: String,
    super_name: String,
    interfaces: Vec<String>,
    methods: Vec<MethodFixture>,
}

#[derive(Default)]
struct PoolWriter {
    entries: Vec<u8>,
    count: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl PoolWriter {
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        self.count += 1;
        self.entries.push(TAG_UTF8);
        self.entries
            .extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.entries.extend_from_slice(value.as_bytes());
        self.utf8.insert(value.to_string(), self.count);
        self.count
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        self.count += 1;
        self.entries.push(TAG_CLASS);
        self.entries.extend_from_slice(&name_index.to_be_bytes());
        self.classes.insert(name.to_string(), self.count);
        self.count
    }
}

impl ClassFixture {
    /// A public concrete class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        Self {
            access: ACC_PUBLIC | ACC_SUPER,
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn implementing(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn extending(mut self, super_name: &str) -> Self {
        self.super_name = super_name.to_string();
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.access |= ACC_ABSTRACT;
        self
    }

    pub fn interface(mut self) -> Self {
        self.access = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        self
    }

    /// Adds a method whose body is a single `return`.
    pub fn with_empty_method(self, name: &str, descriptor: &str, is_static: bool) -> Self {
        let access = if is_static {
            ACC_PUBLIC | ACC_STATIC
        } else {
            ACC_PUBLIC
        };
        let max_locals = argument_slots(descriptor) + if is_static { 0 } else { 1 };
        self.with_method_code(name, descriptor, access, vec![OP_RETURN], 0, max_locals)
    }

    pub fn with_method_code(
        mut self,
        name: &str,
        descriptor: &str,
        access: u16,
        code: Vec<u8>,
        max_stack: u16,
        max_locals: u16,
    ) -> Self {
        self.methods.push(MethodFixture {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code,
            max_stack,
            max_locals,
        });
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pool = PoolWriter::default();
        let this_index = pool.class(&self.name);
        let super_index = pool.class(&self.super_name);
        let interface_indices: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();
        let code_name = pool.utf8("Code");

        let mut methods = Vec::new();
        for method in &self.methods {
            let name_index = pool.utf8(&method.name);
            let descriptor_index = pool.utf8(&method.descriptor);
            methods.extend_from_slice(&method.access.to_be_bytes());
            methods.extend_from_slice(&name_index.to_be_bytes());
            methods.extend_from_slice(&descriptor_index.to_be_bytes());
            methods.extend_from_slice(&1u16.to_be_bytes());

            // max_stack + max_locals + code_length + code + exception table + attributes
            let length = 2 + 2 + 4 + method.code.len() as u32 + 2 + 2;
            methods.extend_from_slice(&code_name.to_be_bytes());
            methods.extend_from_slice(&length.to_be_bytes());
            methods.extend_from_slice(&method.max_stack.to_be_bytes());
            methods.extend_from_slice(&method.max_locals.to_be_bytes());
            methods.extend_from_slice(&(method.code.len() as u32).to_be_bytes());
            methods.extend_from_slice(&method.code);
            methods.extend_from_slice(&0u16.to_be_bytes());
            methods.extend_from_slice(&0u16.to_be_bytes());
        }

        let mut out = Vec::new();
        out.extend_from_slice(&[0xCA, 0xFE, 0xBA, 0xBE]);
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&(pool.count + 1).to_be_bytes());
        out.extend_from_slice(&pool.entries);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&this_index.to_be_bytes());
        out.extend_from_slice(&super_index.to_be_bytes());
        out.extend_from_slice(&(interface_indices.len() as u16).to_be_bytes());
        for index in interface_indices {
            out.extend_from_slice(&index.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        out.extend_from_slice(&methods);
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}
