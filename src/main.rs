//! Oxidized-Maxwell - MSL emitter smoke tool
//!
//! Emits Metal source for a passthrough vertex/fragment pair, checks it
//! against the null device and prints it.

use anyhow::Context;
use oc_core::{logging, Config};
use oc_shader::ir::{collect_shader_info, Attribute, IrEmitter};
use oc_shader::{emit_msl, Bindings, Profile, Program, RuntimeInfo, Stage, SyntaxNode, ENTRY_POINT};
use oc_video::{HostDevice, NullDevice};

/// Position from attribute 0, colour from attribute 1 passed to the fragment
fn passthrough_vertex() -> Program {
    let mut program = Program::new(Stage::VertexB);
    let block = program.add_block();
    let mut ir = IrEmitter::new(&mut program, block);
    for element in 0..4 {
        let position = ir.get_attribute(Attribute::generic(0, element));
        ir.set_attribute(Attribute(Attribute::POSITION_X.0 + element as u16), position.into());
        let color = ir.get_attribute(Attribute::generic(1, element));
        ir.set_attribute(Attribute::generic(0, element), color.into());
    }
    program.push_syntax(SyntaxNode::Block(block));
    program.push_syntax(SyntaxNode::Return);
    collect_shader_info(&mut program);
    program
}

fn passthrough_fragment() -> Program {
    let mut program = Program::new(Stage::Fragment);
    let block = program.add_block();
    let mut ir = IrEmitter::new(&mut program, block);
    for element in 0..4 {
        let color = ir.get_attribute(Attribute::generic(0, element));
        ir.set_frag_color(0, element as u32, color.into());
    }
    program.push_syntax(SyntaxNode::Block(block));
    program.push_syntax(SyntaxNode::Return);
    collect_shader_info(&mut program);
    program
}

fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    logging::init(&config.debug);

    tracing::info!("Starting Oxidized-Maxwell MSL smoke run");

    let profile = Profile {
        disable_loop_safety_checks: config.shader.disable_loop_safety_checks,
        ..Profile::default()
    };
    let device = NullDevice::new();
    let mut bindings = Bindings::new();

    let mut vertex = passthrough_vertex();
    let vertex_source = emit_msl(&profile, &RuntimeInfo::default(), &mut vertex, &mut bindings)?;

    let fragment_info = RuntimeInfo {
        previous_stage_stores: vertex.info.stores,
        ..RuntimeInfo::default()
    };
    let mut fragment = passthrough_fragment();
    let fragment_source = emit_msl(&profile, &fragment_info, &mut fragment, &mut bindings)?;

    for (stage, source) in [(Stage::VertexB, &vertex_source), (Stage::Fragment, &fragment_source)] {
        device
            .compile_function(source, ENTRY_POINT)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("compiling {} stage", stage.name()))?;
        println!("// {}\n{}", stage.name(), source);
    }
    Ok(())
}
