use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::resource::error::{info_log, Error, Result, ShaderStage};

/// One stage that parsed and validated cleanly.
#[derive(Debug)]
pub(crate) struct CompiledStage {
    pub(crate) stage: ShaderStage,
    pub(crate) module: naga::Module,
    /// Index into `module.entry_points`.
    pub(crate) entry_index: usize,
}

impl CompiledStage {
    pub(crate) fn entry_point(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry_index]
    }

    pub(crate) fn entry_name(&self) -> &str {
        &self.entry_point().name
    }
}

/// Parses and validates WGSL `source` as `stage`.
///
/// The source must declare exactly one entry point of the requested stage;
/// entry points of other stages are ignored.
pub(crate) fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage> {
    let fail = |log: String| Error::Compilation {
        stage,
        log: info_log(log),
    };

    let module = naga::front::wgsl::parse_str(source).map_err(|e| fail(e.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| fail(e.emit_to_string(source)))?;

    let wanted = stage.to_naga();
    let mut candidates = module
        .entry_points
        .iter()
        .enumerate()
        .filter(|(_, ep)| ep.stage == wanted);

    let entry_index = match (candidates.next(), candidates.next()) {
        (Some((index, _)), None) => index,
        (None, _) => {
            return Err(fail(format!(
                "no @{} entry point declared",
                stage.tag().to_ascii_lowercase()
            )));
        }
        (Some(_), Some(_)) => {
            let names: Vec<&str> = module
                .entry_points
                .iter()
                .filter(|ep| ep.stage == wanted)
                .map(|ep| ep.name.as_str())
                .collect();
            return Err(fail(format!(
                "expected one @{} entry point, found {}: {}",
                stage.tag().to_ascii_lowercase(),
                names.len(),
                names.join(", ")
            )));
        }
    };

    Ok(CompiledStage {
        stage,
        module,
        entry_index,
    })
}
