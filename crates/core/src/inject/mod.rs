//! Appends registration calls to a registry target in the output area.

use autoreg_plugin::{InjectionSite, Registration, RegistrationCall, UnitCodec};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::{AutoregError, Result};
use crate::model::{Implementer, TargetLocation, TrackedSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// `count` calls were appended and verified.
    Injected { count: usize },
    /// Nothing to register; the target was left untouched.
    NoImplementers,
}

pub struct CodeInjector {
    codec: Arc<dyn UnitCodec>,
}

impl CodeInjector {
    pub fn new(codec: Arc<dyn UnitCodec>) -> Self {
        Self { codec }
    }

    /// Append one registration call per implementer, in the given order, to
    /// the site of `tracked` located at `target`.
    pub fn inject(
        &self,
        tracked: &TrackedSpec,
        target: &TargetLocation,
        implementers: &[Implementer],
    ) -> Result<InjectionOutcome> {
        let spec = &tracked.spec;
        if implementers.is_empty() {
            error!(
                "No implementers of {} found; {} left unchanged",
                spec.interface_name, target
            );
            return Ok(InjectionOutcome::NoImplementers);
        }

        let site = spec.injection_site();
        let call = spec.registration_call();
        let registrations: Vec<Registration> = implementers
            .iter()
            .map(|implementer| Registration {
                implementer: implementer.name.clone(),
                call: call.clone(),
            })
            .collect();

        let original = read_target(target)?;
        let rewritten = self
            .codec
            .inject(&original, &site, &registrations)
            .map_err(|e| injection_error(target, e))?;

        let before = self.count_calls(target, &original, &site, &call)?;
        let after = self.count_calls(target, &rewritten, &site, &call)?;
        if after != before + registrations.len() {
            return Err(injection_error(
                target,
                format!(
                    "expected {} new calls to {}.{}, found {}",
                    registrations.len(),
                    call.owner,
                    call.method_name,
                    after.saturating_sub(before)
                ),
            ));
        }

        write_target(target, &rewritten)?;

        for implementer in implementers {
            debug!("Registered {} (from {})", implementer.name, implementer.origin);
        }
        info!(
            "Injected {} registrations for {} into {}",
            registrations.len(),
            spec.interface_name,
            site
        );
        Ok(InjectionOutcome::Injected {
            count: registrations.len(),
        })
    }

    fn count_calls(
        &self,
        target: &TargetLocation,
        bytes: &[u8],
        site: &InjectionSite,
        call: &RegistrationCall,
    ) -> Result<usize> {
        let invocations = self
            .codec
            .invocations(bytes, site)
            .map_err(|e| injection_error(target, e))?;
        Ok(invocations
            .iter()
            .filter(|i| {
                i.owner == call.owner && i.name == call.method_name && i.descriptor == call.descriptor
            })
            .count())
    }
}

fn injection_error(target: &TargetLocation, reason: impl ToString) -> AutoregError {
    AutoregError::Injection {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

fn read_target(target: &TargetLocation) -> Result<Vec<u8>> {
    match target {
        TargetLocation::Loose(path) => Ok(fs::read(path)?),
        TargetLocation::Archived { archive, entry } => {
            let mut zip = ZipArchive::new(File::open(archive)?)?;
            let mut file = zip.by_name(entry)?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            Ok(bytes)
        }
    }
}

fn write_target(target: &TargetLocation, bytes: &[u8]) -> Result<()> {
    match target {
        TargetLocation::Loose(path) => {
            let tmp = temp_path(path);
            fs::write(&tmp, bytes)?;
            fs::rename(&tmp, path)?;
            Ok(())
        }
        TargetLocation::Archived { archive, entry } => replace_entry(archive, entry, bytes),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".autoreg.tmp");
    path.with_file_name(name)
}

/// Rebuild `archive` with `entry` replaced. Other members are copied raw so
/// their bytes and compression are preserved.
fn replace_entry(archive: &Path, entry: &str, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(archive);
    {
        let mut source = ZipArchive::new(File::open(archive)?)?;
        let mut writer = ZipWriter::new(File::create(&tmp)?);

        for index in 0..source.len() {
            let file = source.by_index_raw(index)?;
            if file.name() == entry {
                let options = SimpleFileOptions::default().compression_method(file.compression());
                drop(file);
                writer.start_file(entry, options)?;
                writer.write_all(bytes)?;
            } else {
                writer.raw_copy_file(file)?;
            }
        }
        writer.finish()?;
    }
    fs::rename(&tmp, archive)?;
    Ok(())
}
