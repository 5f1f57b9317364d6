//! Translation and compilation of pipeline stages
//!
//! A builder owns nothing mutable, so the same instance serves the draw path
//! and the background workers.

use crate::backend::{FunctionHandle, HostDevice};
use crate::cache_key::{ComputePipelineCacheKey, GraphicsPipelineCacheKey};
use crate::compute_pipeline::ComputePipeline;
use crate::environment::GuestEnvironment;
use crate::graphics_pipeline::GraphicsPipeline;
use crate::regs::{PrimitiveTopology, ShaderProgram, NUM_PROGRAMS};
use oc_core::{Config, PipelineError, ShaderError};
use oc_shader::ir::{Info, VaryingState};
use oc_shader::{
    emit_msl, Bindings, HostTranslateInfo, Profile, Program, RuntimeInfo, ShaderFrontend, Stage,
    ENTRY_POINT,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Captured environments of the enabled program slots
pub type GraphicsEnvironments = [Option<GuestEnvironment>; NUM_PROGRAMS];

pub struct PipelineBuilder {
    device: Arc<dyn HostDevice>,
    frontend: Arc<dyn ShaderFrontend>,
    profile: Profile,
    host_info: HostTranslateInfo,
    /// Directory emitted sources are written to, when dumping
    dump_dir: Option<PathBuf>,
}

impl PipelineBuilder {
    pub fn new(device: Arc<dyn HostDevice>, frontend: Arc<dyn ShaderFrontend>, config: &Config) -> Self {
        let profile = Profile {
            disable_loop_safety_checks: config.shader.disable_loop_safety_checks,
            ..Profile::default()
        };
        let host_info = HostTranslateInfo::from_profile(&profile);
        Self {
            device,
            frontend,
            profile,
            host_info,
            dump_dir: config
                .debug
                .dump_shaders
                .then(|| config.paths.shader_dump.clone()),
        }
    }

    pub fn device(&self) -> &Arc<dyn HostDevice> {
        &self.device
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn build_graphics(
        &self,
        key: &GraphicsPipelineCacheKey,
        envs: &mut GraphicsEnvironments,
    ) -> Result<GraphicsPipeline, PipelineError> {
        let key_hash = key.hash64();
        tracing::info!(
            "Building graphics pipeline 0x{:016x} ({} stages)",
            key_hash,
            key.active_stages()
        );

        // Metal render pipelines only have vertex and fragment functions
        for (program, env) in ShaderProgram::ALL.iter().zip(envs.iter()) {
            let supported = matches!(program, ShaderProgram::VertexB | ShaderProgram::Fragment);
            if env.is_some() && !supported {
                return Err(ShaderError::not_implemented(format!(
                    "{} stage in a render pipeline",
                    program.stage().name()
                ))
                .into());
            }
        }

        let mut programs: [Option<Program>; NUM_PROGRAMS] = Default::default();
        for (program, env) in programs.iter_mut().zip(envs.iter_mut()) {
            if let Some(env) = env {
                *program = Some(self.frontend.translate(env, &self.host_info)?);
            }
        }

        let mut bindings = Bindings::new();
        let mut functions = [None; NUM_PROGRAMS];
        let mut infos: [Option<Box<Info>>; NUM_PROGRAMS] = Default::default();
        let mut previous_stores: Option<VaryingState> = None;
        for (index, slot) in programs.iter_mut().enumerate() {
            let Some(program) = slot else {
                continue;
            };
            let runtime_info = make_runtime_info(
                key,
                ShaderProgram::ALL[index],
                index == ShaderProgram::VertexB.index(),
                previous_stores.as_ref(),
            );
            let source = emit_msl(&self.profile, &runtime_info, program, &mut bindings)?;
            functions[index] = Some(self.compile(key_hash, program.stage, &source)?);
            previous_stores = Some(program.info.stores);
            infos[index] = Some(Box::new(program.info.clone()));
        }

        Ok(GraphicsPipeline::new(*key, functions, infos))
    }

    pub fn build_compute(
        &self,
        key: &ComputePipelineCacheKey,
        env: &mut GuestEnvironment,
    ) -> Result<ComputePipeline, PipelineError> {
        let key_hash = key.hash64();
        tracing::info!("Building compute pipeline 0x{:016x}", key_hash);

        let mut program = self.frontend.translate(env, &self.host_info)?;
        let source = emit_msl(
            &self.profile,
            &RuntimeInfo::default(),
            &mut program,
            &mut Bindings::new(),
        )?;
        let function = self.compile(key_hash, program.stage, &source)?;
        ComputePipeline::new(self.device.as_ref(), *key, function, Box::new(program.info))
    }

    fn compile(&self, key_hash: u64, stage: Stage, source: &str) -> Result<FunctionHandle, PipelineError> {
        if let Some(dir) = &self.dump_dir {
            dump_source(dir, key_hash, stage, source);
        }
        self.device
            .compile_function(source, ENTRY_POINT)
            .map_err(|message| {
                tracing::error!(
                    "Failed to compile {} shader of pipeline 0x{:016x}: {}\n{}",
                    stage.name(),
                    key_hash,
                    message,
                    source
                );
                PipelineError::Compilation {
                    stage: stage.name().to_string(),
                    message,
                }
            })
    }
}

/// Per-stage pipeline state that changes the emitted code
fn make_runtime_info(
    key: &GraphicsPipelineCacheKey,
    program: ShaderProgram,
    is_last_vertex_stage: bool,
    previous_stores: Option<&VaryingState>,
) -> RuntimeInfo {
    let state = &key.state;
    let mut info = RuntimeInfo {
        // Vertex inputs come from attribute fetch, not a previous stage
        previous_stage_stores: previous_stores.copied().unwrap_or_else(VaryingState::all),
        input_topology: state.topology().input_topology(),
        ..RuntimeInfo::default()
    };
    if is_last_vertex_stage {
        if state.topology() == PrimitiveTopology::Points {
            info.fixed_state_point_size = Some(state.point_size());
        }
        info.y_negate = state.y_negate();
    }
    if program == ShaderProgram::Fragment {
        let alpha_func = state.alpha_test_func().to_compare_function();
        if alpha_func != oc_shader::CompareFunction::Always {
            info.alpha_test_func = Some(alpha_func);
            info.alpha_test_reference = state.alpha_test_ref();
        }
        info.force_early_z = state.early_z();
    }
    info
}

fn dump_source(dir: &std::path::Path, key_hash: u64, stage: Stage, source: &str) {
    let path = dir.join(format!("{:016x}_{}.metal", key_hash, stage.name()));
    let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, source));
    match result {
        Ok(()) => tracing::debug!("Dumped shader to {}", path.display()),
        Err(e) => tracing::warn!("Failed to dump shader to {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{ComparisonOp, Maxwell3dRegs};
    use bytemuck::Zeroable;
    use oc_shader::CompareFunction;

    fn key_for(regs: &Maxwell3dRegs) -> GraphicsPipelineCacheKey {
        let mut key = GraphicsPipelineCacheKey::zeroed();
        key.state.refresh(regs, false);
        key
    }

    #[test]
    fn test_runtime_info_point_size() {
        let mut regs = Maxwell3dRegs::default();
        regs.topology = PrimitiveTopology::Points;
        regs.point_size = 3.0;
        regs.y_negate = true;
        let key = key_for(&regs);

        let info = make_runtime_info(&key, ShaderProgram::VertexB, true, None);
        assert_eq!(info.fixed_state_point_size, Some(3.0));
        assert!(info.y_negate);
        assert_eq!(info.previous_stage_stores, VaryingState::all());

        // A geometry stage after the vertex stage owns the point size
        let info = make_runtime_info(&key, ShaderProgram::VertexB, false, None);
        assert_eq!(info.fixed_state_point_size, None);
        assert!(!info.y_negate);
    }

    #[test]
    fn test_runtime_info_alpha_test() {
        let mut regs = Maxwell3dRegs::default();
        regs.alpha_test_enabled = true;
        regs.alpha_test_func = ComparisonOp::Greater;
        regs.alpha_test_ref = 0.25;
        regs.early_z = true;
        let key = key_for(&regs);
        let stores = VaryingState::default();

        let info = make_runtime_info(&key, ShaderProgram::Fragment, false, Some(&stores));
        assert_eq!(info.alpha_test_func, Some(CompareFunction::Greater));
        assert_eq!(info.alpha_test_reference, 0.25);
        assert!(info.force_early_z);
        assert_eq!(info.previous_stage_stores, stores);

        let info = make_runtime_info(&key, ShaderProgram::VertexB, true, None);
        assert_eq!(info.alpha_test_func, None);

        regs.alpha_test_enabled = false;
        let info = make_runtime_info(&key_for(&regs), ShaderProgram::Fragment, false, Some(&stores));
        assert_eq!(info.alpha_test_func, None);
    }
}
