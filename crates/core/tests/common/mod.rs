#![allow(dead_code)]

use autoreg_core::model::{InterfaceSpec, RegisterConfig};
use autoreg_core::{Pipeline, PipelineConfig};
use autoreg_java::ClassFileCodec;
use autoreg_java::fixture::ClassFixture;
use autoreg_plugin::UnitCodec;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const PLUGIN: &str = "com/example/Plugin";
pub const REGISTRY: &str = "com/example/Registry";

/// Scratch build: inputs under `in/`, output under `out/`, cache beside.
pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path("out")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.path("autoreg-cache.json")
    }

    /// Write `(entry, bytes)` pairs as a zip at `in/<name>`.
    pub fn jar(&self, name: &str, entries: &[(&str, Vec<u8>)]) -> PathBuf {
        let path = self.path(&format!("in/{name}"));
        write_jar(&path, entries);
        path
    }

    /// Write units into a directory tree at `in/<name>`.
    pub fn classes_dir(&self, name: &str, entries: &[(&str, Vec<u8>)]) -> PathBuf {
        let root = self.path(&format!("in/{name}"));
        for (entry, bytes) in entries {
            let path = root.join(entry);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        }
        root
    }

    pub fn pipeline(
        &self,
        registrations: &RegisterConfig,
        archives: &[&Path],
        directories: &[&Path],
    ) -> Pipeline {
        let config = PipelineConfig {
            archives: archives.iter().map(|p| p.to_path_buf()).collect(),
            directories: directories.iter().map(|p| p.to_path_buf()).collect(),
            output_dir: self.output_dir(),
            cache_file: self.cache_file(),
        };
        Pipeline::new(Arc::new(ClassFileCodec::new()), registrations.clone(), config).unwrap()
    }
}

pub fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    write_jar_with(path, entries, SimpleFileOptions::default());
}

/// Uncompressed members, so equal-length units give equal-size archives.
pub fn write_stored_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    write_jar_with(path, entries, options);
}

fn write_jar_with(path: &Path, entries: &[(&str, Vec<u8>)], options: SimpleFileOptions) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (entry, bytes) in entries {
        zip.start_file(*entry, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Overwrite the uncompressed size recorded in every central directory
/// header, leaving the member data alone.
pub fn overstate_entry_sizes(path: &Path, size: u32) {
    const CENTRAL_HEADER: &[u8] = b"PK\x01\x02";
    const UNCOMPRESSED_SIZE_OFFSET: usize = 24;
    let mut bytes = fs::read(path).unwrap();
    let starts: Vec<usize> = bytes
        .windows(CENTRAL_HEADER.len())
        .enumerate()
        .filter(|(_, w)| *w == CENTRAL_HEADER)
        .map(|(i, _)| i)
        .collect();
    assert!(!starts.is_empty());
    for start in starts {
        let field = start + UNCOMPRESSED_SIZE_OFFSET;
        bytes[field..field + 4].copy_from_slice(&size.to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}

pub fn set_mtime(path: &Path, mtime: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

pub fn read_jar_entry(path: &Path, entry: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut file = zip.by_name(entry).unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    bytes
}

pub fn plugin_config() -> RegisterConfig {
    RegisterConfig {
        registrations: vec![InterfaceSpec::new(
            "com.example.Plugin",
            "com.example.Registry",
            "register",
        )],
        resolve_hierarchy: false,
    }
}

pub fn implementer(name: &str) -> (String, Vec<u8>) {
    (
        format!("{name}.class"),
        ClassFixture::new(name).implementing(PLUGIN).to_bytes(),
    )
}

pub fn registry() -> (String, Vec<u8>) {
    (
        format!("{REGISTRY}.class"),
        ClassFixture::new(REGISTRY)
            .with_empty_method("register", "(Lcom/example/Plugin;)V", true)
            .with_empty_method("<clinit>", "()V", true)
            .to_bytes(),
    )
}

pub fn entries(units: &[(String, Vec<u8>)]) -> Vec<(&str, Vec<u8>)> {
    units
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.clone()))
        .collect()
}

/// Number of `register` calls in the registry's `<clinit>`.
pub fn register_calls(registry_bytes: &[u8]) -> usize {
    let site = autoreg_plugin::InjectionSite {
        class_name: REGISTRY.to_string(),
        method_name: "<clinit>".to_string(),
        descriptor: "()V".to_string(),
    };
    ClassFileCodec::new()
        .invocations(registry_bytes, &site)
        .unwrap()
        .iter()
        .filter(|i| i.owner == REGISTRY && i.name == "register")
        .count()
}

/// Implementers constructed in the registry's `<clinit>`, in code order.
pub fn constructed(registry_bytes: &[u8]) -> Vec<String> {
    let site = autoreg_plugin::InjectionSite {
        class_name: REGISTRY.to_string(),
        method_name: "<clinit>".to_string(),
        descriptor: "()V".to_string(),
    };
    ClassFileCodec::new()
        .invocations(registry_bytes, &site)
        .unwrap()
        .into_iter()
        .filter(|i| i.name == "<init>")
        .map(|i| i.owner)
        .collect()
}
