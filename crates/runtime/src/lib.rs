use autoreg_core::logging::LogOptions;
use autoreg_core::model::RegisterConfig;
use autoreg_core::{Pipeline, PipelineConfig};
use autoreg_plugin::UnitCodec;
use std::sync::Arc;

/// The class-file codec every default pipeline runs with.
pub fn default_codec() -> Arc<dyn UnitCodec> {
    Arc::new(autoreg_java::ClassFileCodec::new())
}

/// Bootstraps a pipeline over JVM class files and jars.
pub fn build_default_pipeline(
    registrations: RegisterConfig,
    config: PipelineConfig,
) -> autoreg_core::Result<Pipeline> {
    let codec = default_codec();
    tracing::debug!("Building pipeline with the {} codec", codec.name());
    Pipeline::new(codec, registrations, config)
}

/// Initializes logging for a component. Keep the returned guard alive for
/// the life of the process so buffered file output is flushed.
pub fn init_logging(options: &LogOptions) -> impl Drop + use<> {
    autoreg_core::logging::init_logging(options)
}
