//! Pipeline cache behaviour against a scripted frontend and the null device

use oc_core::{Config, ShaderError};
use oc_memory::{GpuMemoryManager, PageFlags};
use oc_shader::ir::{collect_shader_info, Attribute, IrEmitter, Opcode, Value};
use oc_shader::{Environment, HostTranslateInfo, Program, ShaderFrontend, Stage, SyntaxNode};
use oc_video::maxwell_to_mtl::PixelFormat;
use oc_video::regs::ShaderProgram;
use oc_video::{Framebuffer, NullDevice, PipelineCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const REGION: u64 = 0x10_0000;
const VERTEX_OFFSET: u32 = 0x0;
const FRAGMENT_OFFSET: u32 = 0x1000;
const COMPUTE_OFFSET: u32 = 0x2000;
const HEADER_SIZE: u64 = 0x50;
const TERMINATOR: u64 = 0xE240_0FFF_FF87_000F;
/// First instruction that makes the frontend emit an untranslatable opcode
const POISON: u64 = 0xDEAD;
/// First instruction that makes the frontend panic
const PANIC: u64 = 0xB0B0;

/// Builds a tiny program per stage, parameterized by the first instruction
#[derive(Default)]
struct ScriptedFrontend {
    translations: AtomicUsize,
}

impl ScriptedFrontend {
    fn translations(&self) -> usize {
        self.translations.load(Ordering::SeqCst)
    }
}

impl ShaderFrontend for ScriptedFrontend {
    fn translate(
        &self,
        env: &mut dyn Environment,
        _host_info: &HostTranslateInfo,
    ) -> Result<Program, ShaderError> {
        self.translations.fetch_add(1, Ordering::SeqCst);
        let stage = env.stage();
        let word = env.read_instruction(env.start_address());
        if word == PANIC {
            panic!("frontend lost track of the program");
        }

        let mut program = Program::new(stage);
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        if word == POISON {
            let undef = ir.inst(Opcode::UndefU8, vec![]);
            ir.reference(undef.into());
        } else {
            match stage {
                Stage::VertexB => {
                    for element in 0..4 {
                        let value = ir.get_attribute(Attribute::generic(0, element));
                        let position = Attribute(Attribute::POSITION_X.0 + element as u16);
                        ir.set_attribute(position, value.into());
                    }
                    ir.set_attribute(Attribute::generic(0, 0), Value::F32(word as f32));
                }
                Stage::Fragment => {
                    for component in 0..4 {
                        ir.set_frag_color(0, component, Value::F32(word as f32));
                    }
                }
                _ => ir.write_shared(Value::U32(0), Value::U32(word as u32)),
            }
        }
        if stage == Stage::Compute {
            program.shared_memory_size = env.shared_memory_size().max(4);
            program.workgroup_size = env.workgroup_size();
        }
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Return);
        collect_shader_info(&mut program);
        Ok(program)
    }
}

fn write_program(memory: &GpuMemoryManager, offset: u32, first: u64) {
    let start = REGION + u64::from(offset) + HEADER_SIZE;
    memory.write(start, first).unwrap();
    memory.write(start + 8, TERMINATOR).unwrap();
}

fn rgba_framebuffer() -> Framebuffer {
    let mut framebuffer = Framebuffer::default();
    framebuffer.color[0] = Some(PixelFormat::A8B8G8R8Unorm);
    framebuffer
}

struct Fixture {
    memory: Arc<GpuMemoryManager>,
    device: Arc<NullDevice>,
    frontend: Arc<ScriptedFrontend>,
    cache: PipelineCache,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let memory = Arc::new(GpuMemoryManager::new());
        memory.map(REGION, 0x10000, PageFlags::RW).unwrap();
        write_program(&memory, VERTEX_OFFSET, 0x1111);
        write_program(&memory, FRAGMENT_OFFSET, 0x2222);
        write_program(&memory, COMPUTE_OFFSET, 0x3333);

        let device = Arc::new(NullDevice::new());
        let frontend = Arc::new(ScriptedFrontend::default());
        let mut cache = PipelineCache::new(device.clone(), frontend.clone(), &config).unwrap();
        cache.create_channel(0, memory.clone());
        cache.bind_channel(0).unwrap();

        let channel = cache.channel_mut().unwrap();
        let regs = &mut channel.maxwell3d;
        regs.program_region = REGION;
        regs.shader_programs[ShaderProgram::VertexB.index()].enabled = true;
        regs.shader_programs[ShaderProgram::VertexB.index()].offset = VERTEX_OFFSET;
        regs.shader_programs[ShaderProgram::Fragment.index()].enabled = true;
        regs.shader_programs[ShaderProgram::Fragment.index()].offset = FRAGMENT_OFFSET;
        channel.compute.code_address = REGION;
        channel.compute.program_start = COMPUTE_OFFSET;
        channel.compute.block_dim = [64, 1, 1];
        channel.compute.shared_alloc = 256;
        channel.framebuffer = Some(rgba_framebuffer());

        Self {
            memory,
            device,
            frontend,
            cache,
        }
    }

    fn set_early_z(&mut self, enabled: bool) {
        self.cache.channel_mut().unwrap().maxwell3d.early_z = enabled;
    }
}

#[test]
fn test_same_key_returns_same_pipeline() {
    let mut fx = Fixture::new();
    let first = fx.cache.current_graphics_pipeline().unwrap();
    let second = fx.cache.current_graphics_pipeline().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fx.device.compile_count(), 2);
    assert_eq!(fx.frontend.translations(), 2);
    assert_eq!(fx.device.render_pipeline_count(), 1);

    let stats = fx.cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn test_transition_fast_path() {
    let mut fx = Fixture::new();
    let a = fx.cache.current_graphics_pipeline().unwrap();
    fx.set_early_z(true);
    let b = fx.cache.current_graphics_pipeline().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    // B has no recorded transition to A yet
    fx.set_early_z(false);
    assert!(Arc::ptr_eq(&fx.cache.current_graphics_pipeline().unwrap(), &a));
    assert_eq!(fx.cache.stats().transition_hits, 0);

    fx.set_early_z(true);
    assert!(Arc::ptr_eq(&fx.cache.current_graphics_pipeline().unwrap(), &b));
    fx.set_early_z(false);
    assert!(Arc::ptr_eq(&fx.cache.current_graphics_pipeline().unwrap(), &a));
    assert_eq!(fx.cache.stats().transition_hits, 2);
    assert_eq!(fx.cache.stats().builds, 2);
    assert_eq!(fx.device.compile_count(), 4);
}

#[test]
fn test_rewritten_program_rebuilds() {
    let mut fx = Fixture::new();
    let before = fx.cache.current_graphics_pipeline().unwrap();
    write_program(&fx.memory, FRAGMENT_OFFSET, 0x4444);
    let after = fx.cache.current_graphics_pipeline().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(fx.cache.stats().builds, 2);
    assert_eq!(fx.device.compile_count(), 4);
}

#[test]
fn test_identical_write_keeps_pipeline() {
    let mut fx = Fixture::new();
    let before = fx.cache.current_graphics_pipeline().unwrap();
    write_program(&fx.memory, FRAGMENT_OFFSET, 0x2222);
    let after = fx.cache.current_graphics_pipeline().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(fx.device.compile_count(), 2);
}

#[test]
fn test_failed_build_is_negatively_cached() {
    let mut fx = Fixture::new();
    write_program(&fx.memory, FRAGMENT_OFFSET, POISON);

    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 2);
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 2);
    assert_eq!(fx.cache.stats().failures, 1);

    // Invalidating an unrelated range keeps the failure
    fx.cache.invalidate_region(REGION + 0x8000, 0x100);
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 2);

    // Touching the failed program retries the build
    fx.cache
        .invalidate_region(REGION + u64::from(FRAGMENT_OFFSET) + HEADER_SIZE, 8);
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 4);
    assert_eq!(fx.cache.stats().failures, 2);
}

#[test]
fn test_failure_does_not_affect_other_keys() {
    let mut fx = Fixture::new();
    let good = fx.cache.current_graphics_pipeline().unwrap();

    write_program(&fx.memory, FRAGMENT_OFFSET, POISON);
    assert!(fx.cache.current_graphics_pipeline().is_none());

    write_program(&fx.memory, FRAGMENT_OFFSET, 0x2222);
    let again = fx.cache.current_graphics_pipeline().unwrap();
    assert!(Arc::ptr_eq(&good, &again));
}

#[test]
fn test_host_compiler_rejection() {
    let mut fx = Fixture::new();
    fx.device.reject_sources_containing("[[color(0)]]");

    assert!(fx.cache.current_graphics_pipeline().is_none());
    // Vertex compiled, fragment rejected
    assert_eq!(fx.device.compile_count(), 2);
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.device.compile_count(), 2);
    assert_eq!(fx.cache.stats().failures, 1);
    assert_eq!(fx.device.render_pipeline_count(), 0);
}

#[test]
fn test_draw_without_framebuffer_is_skipped() {
    let mut fx = Fixture::new();
    fx.cache.channel_mut().unwrap().framebuffer = None;

    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.cache.stats().builds, 1);
    assert_eq!(fx.device.render_pipeline_count(), 0);

    fx.cache.channel_mut().unwrap().framebuffer = Some(rgba_framebuffer());
    let pipeline = fx.cache.current_graphics_pipeline().unwrap();
    assert!(pipeline.is_built(&rgba_framebuffer()));
    assert_eq!(fx.device.render_pipeline_count(), 1);
    assert_eq!(fx.device.compile_count(), 2);
}

#[test]
fn test_no_channel() {
    let mut fx = Fixture::new();
    fx.cache.erase_channel(0);
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert!(fx.cache.current_compute_pipeline().is_none());
    assert!(fx.cache.bind_channel(0).is_err());
    assert_eq!(fx.frontend.translations(), 0);
}

#[test]
fn test_unterminated_program_skips_draw() {
    let mut fx = Fixture::new();
    // Leaves no terminator between the fragment program and the end of the mapping
    fx.memory
        .write(REGION + u64::from(FRAGMENT_OFFSET) + HEADER_SIZE + 8, 0u64)
        .unwrap();
    fx.memory
        .write(REGION + u64::from(COMPUTE_OFFSET) + HEADER_SIZE + 8, 0u64)
        .unwrap();

    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 0);
    assert_eq!(fx.cache.stats().builds, 0);
}

#[test]
fn test_disabled_vertex_program_skips_draw() {
    let mut fx = Fixture::new();
    fx.cache.channel_mut().unwrap().maxwell3d.shader_programs[ShaderProgram::VertexB.index()]
        .enabled = false;
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 0);
}

#[test]
fn test_extended_dynamic_state_shares_pipelines() {
    let mut config = Config::default();
    config.gpu.extended_dynamic_state = true;
    let mut fx = Fixture::with_config(config);
    let first = fx.cache.current_graphics_pipeline().unwrap();
    fx.cache.channel_mut().unwrap().maxwell3d.depth_test_enable = true;
    let second = fx.cache.current_graphics_pipeline().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let mut fx = Fixture::new();
    let first = fx.cache.current_graphics_pipeline().unwrap();
    fx.cache.channel_mut().unwrap().maxwell3d.depth_test_enable = true;
    let second = fx.cache.current_graphics_pipeline().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_compute_pipeline() {
    let mut fx = Fixture::new();
    let first = fx.cache.current_compute_pipeline().unwrap();
    let second = fx.cache.current_compute_pipeline().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.key().threadgroup_size, [64, 1, 1]);
    assert_eq!(first.key().shared_memory_size, 256);
    assert_eq!(fx.device.compile_count(), 1);
    assert_eq!(fx.device.compute_pipeline_count(), 1);

    fx.cache.channel_mut().unwrap().compute.block_dim = [32, 2, 1];
    let third = fx.cache.current_compute_pipeline().unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(fx.frontend.translations(), 2);

    let source = fx.device.compiled_sources().pop().unwrap();
    assert!(source.contains("kernel void main_("));
    assert!(source.contains("uint3(32u,2u,1u)"));
}

#[test]
fn test_compute_failure_is_negatively_cached() {
    let mut fx = Fixture::new();
    write_program(&fx.memory, COMPUTE_OFFSET, POISON);
    assert!(fx.cache.current_compute_pipeline().is_none());
    assert!(fx.cache.current_compute_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 1);

    fx.cache
        .invalidate_region(REGION + u64::from(COMPUTE_OFFSET), HEADER_SIZE + 16);
    assert!(fx.cache.current_compute_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 2);
}

#[test]
fn test_geometry_stage_is_rejected() {
    let mut fx = Fixture::new();
    let regs = &mut fx.cache.channel_mut().unwrap().maxwell3d;
    regs.shader_programs[ShaderProgram::Geometry.index()].enabled = true;
    regs.shader_programs[ShaderProgram::Geometry.index()].offset = COMPUTE_OFFSET;

    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert_eq!(fx.frontend.translations(), 0);
    assert_eq!(fx.device.compile_count(), 0);
    assert_eq!(fx.cache.stats().failures, 1);

    let regs = &mut fx.cache.channel_mut().unwrap().maxwell3d;
    regs.shader_programs[ShaderProgram::Geometry.index()].enabled = false;
    assert!(fx.cache.current_graphics_pipeline().is_some());
}

#[test]
fn test_async_builds() {
    let mut config = Config::default();
    config.shader.async_shader_builds = true;
    config.shader.shader_worker_threads = 2;
    let mut fx = Fixture::with_config(config);

    // The first draw only queues the build
    assert!(fx.cache.current_graphics_pipeline().is_none());
    assert!(fx.cache.current_compute_pipeline().is_none());
    fx.cache.wait_for_builds();

    let first = fx.cache.current_graphics_pipeline().unwrap();
    let second = fx.cache.current_graphics_pipeline().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(fx.cache.current_compute_pipeline().is_some());
    assert_eq!(fx.device.compile_count(), 3);
    assert_eq!(fx.cache.stats().builds, 2);
}

#[test]
fn test_panicking_build_fails_the_key() {
    let mut config = Config::default();
    config.shader.async_shader_builds = true;
    config.shader.shader_worker_threads = 1;
    let mut fx = Fixture::with_config(config);
    write_program(&fx.memory, FRAGMENT_OFFSET, PANIC);

    assert!(fx.cache.current_graphics_pipeline().is_none());
    fx.cache.wait_for_builds();
    assert_eq!(fx.cache.stats().failures, 1);

    // Remembered as failed, not retried
    for _ in 0..4 {
        assert!(fx.cache.current_graphics_pipeline().is_none());
    }
    assert_eq!(fx.frontend.translations(), 2);
    assert_eq!(fx.cache.stats().failures, 1);

    // The worker survived the panic
    write_program(&fx.memory, FRAGMENT_OFFSET, 0x2222);
    assert!(fx.cache.current_graphics_pipeline().is_none());
    fx.cache.wait_for_builds();
    assert!(fx.cache.current_graphics_pipeline().is_some());
    assert_eq!(fx.frontend.translations(), 4);
    assert_eq!(fx.cache.stats().builds, 1);
}

#[test]
fn test_shader_dump() {
    let dir = std::env::temp_dir().join(format!("oc-video-dump-{}", std::process::id()));
    let mut config = Config::default();
    config.debug.dump_shaders = true;
    config.paths.shader_dump = dir.clone();
    let mut fx = Fixture::with_config(config);

    let pipeline = fx.cache.current_graphics_pipeline().unwrap();
    let hash = pipeline.key().hash64();
    let vertex = dir.join(format!("{:016x}_vertex_b.metal", hash));
    let fragment = dir.join(format!("{:016x}_fragment.metal", hash));
    assert!(std::fs::read_to_string(&vertex).unwrap().contains("vertex "));
    assert!(std::fs::read_to_string(&fragment).unwrap().contains("fragment "));
    let _ = std::fs::remove_dir_all(&dir);
}
