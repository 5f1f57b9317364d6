//! Metal Shading Language backend
//!
//! [`emit_msl`] turns one IR program into a complete MSL translation unit
//! with a single `main_` entry point. Results are named from per-type pools
//! of variables (`u_0`, `f_1`, ...) that are recycled as soon as the last
//! reader of a value has been emitted, which keeps the declared variable
//! count close to the peak number of live values.

mod emit;
pub mod emit_context;
pub mod precolor;
pub mod var_alloc;

use crate::bindings::Bindings;
use crate::ir::Program;
use crate::profile::{Profile, RuntimeInfo};
use crate::types::Stage;
use emit_context::EmitContext;
use oc_core::ShaderError;
use std::fmt::Write;
use var_alloc::VarType;

const MSL_PRELUDE: &str = "#include <metal_stdlib>\nusing namespace metal;\n";

/// Entry point name; `main` is reserved in MSL
pub const ENTRY_POINT: &str = "main_";

/// Declarations of every variable the allocator handed out
fn define_variables(ctx: &EmitContext<'_>) -> String {
    let mut out = String::new();
    for ty in VarType::ALL {
        let tracker = ctx.var_alloc.use_tracker(ty);
        let msl_type = ty.msl_type();
        let prefix = ty.prefix();
        if tracker.uses_temp {
            let _ = writeln!(out, "{msl_type} t{prefix}0={msl_type}(0);");
        }
        for index in 0..tracker.num_used {
            let _ = writeln!(out, "{msl_type} {prefix}{index}={msl_type}(0);");
        }
    }
    for index in 0..ctx.num_safety_loop_vars {
        let _ = writeln!(out, "int loop{index}=0x2000;");
    }
    if ctx.info.uses_cc_carry {
        out.push_str("uint carry;\n");
    }
    if ctx.info.uses_subgroup_shuffles {
        out.push_str("bool shfl_in_bounds;\nuint shfl_result;\n");
    }
    out
}

fn shared_memory(profile: &Profile, stage: Stage, size: u32) -> String {
    if stage != Stage::Compute || size == 0 {
        return String::new();
    }
    let limit = profile.max_compute_shared_memory_size;
    let size = if size > limit {
        tracing::warn!(requested = size, limit, "shared memory size exceeds host limit, clamping");
        limit
    } else {
        size
    };
    format!("threadgroup uint smem[{}];\n", size.div_ceil(4))
}

fn local_memory(size: u32) -> String {
    if size == 0 {
        return String::new();
    }
    format!("uint lmem[{}];\n", size.div_ceil(4))
}

/// Translate `program` into MSL source.
///
/// Phis are lowered in place and emission consumes the use counts of the
/// program, so a program can only be emitted once; clone it first to emit
/// it again. `bindings` carries slot assignments across the stages of one
/// pipeline.
pub fn emit_msl(
    profile: &Profile,
    runtime_info: &RuntimeInfo,
    program: &mut Program,
    bindings: &mut Bindings,
) -> Result<String, ShaderError> {
    precolor::precolor(program);

    let Program {
        insts,
        blocks,
        syntax_list,
        info,
        stage,
        workgroup_size,
        shared_memory_size,
        local_memory_size,
        is_geometry_passthrough,
        ..
    } = program;
    let stage = *stage;

    let mut ctx = EmitContext::new(
        insts,
        info,
        stage,
        *is_geometry_passthrough,
        bindings,
        profile,
        runtime_info,
    )?;
    emit::emit_code(&mut ctx, blocks, syntax_list)?;

    let mut source = String::from(MSL_PRELUDE);
    if stage == Stage::Compute {
        let [x, y, z] = workgroup_size.map(|dim| dim.max(1));
        let _ = writeln!(
            source,
            "constant uint3 __workgroup_size=uint3({x}u,{y}u,{z}u);"
        );
    }
    source.push_str(&ctx.header);

    if stage == Stage::Fragment && runtime_info.force_early_z {
        source.push_str("[[early_fragment_tests]] ");
    }
    let return_type = if ctx.has_output { "__Output" } else { "void" };
    let _ = writeln!(
        source,
        "{} {return_type} {ENTRY_POINT}({}){{",
        ctx.stage_name,
        ctx.params.join(",")
    );
    source.push_str(&shared_memory(profile, stage, *shared_memory_size));
    source.push_str(&local_memory(*local_memory_size));
    if ctx.has_output {
        source.push_str("__Output __out={};\n");
    }
    source.push_str(&define_variables(&ctx));
    source.push_str(&ctx.global_memory_locals);
    source.push_str(&ctx.code);
    source.push_str("}\n");

    tracing::debug!(
        stage = stage.name(),
        bytes = source.len(),
        loops = ctx.num_safety_loop_vars,
        "emitted MSL"
    );
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        collect_shader_info, Attribute, IrEmitter, Opcode, SyntaxNode, Type, Value,
    };
    use crate::types::CompareFunction;

    fn emit(program: &mut Program) -> Result<String, ShaderError> {
        emit_with(&Profile::default(), &RuntimeInfo::default(), program)
    }

    fn emit_with(
        profile: &Profile,
        runtime_info: &RuntimeInfo,
        program: &mut Program,
    ) -> Result<String, ShaderError> {
        collect_shader_info(program);
        emit_msl(profile, runtime_info, program, &mut Bindings::new())
    }

    /// Two independent adds whose results are stored to shared memory
    fn sequential_adds() -> Program {
        let mut program = Program::new(Stage::Compute);
        program.shared_memory_size = 8;
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        let a = ir.iadd(Value::U32(1), Value::U32(2));
        ir.write_shared(Value::U32(0), a.into());
        let b = ir.iadd(Value::U32(3), Value::U32(4));
        ir.write_shared(Value::U32(4), b.into());
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Return);
        program
    }

    /// Counter incremented until it reaches ten, carried through a phi
    fn counting_loop() -> Program {
        let mut program = Program::new(Stage::Compute);
        program.shared_memory_size = 4;
        let entry = program.add_block();
        let body = program.add_block();
        let exit = program.add_block();

        let phi = program.add_phi(body, Type::U32);
        let mut ir = IrEmitter::new(&mut program, body);
        let next = ir.iadd(phi.into(), Value::U32(1));
        let cond = ir.less_than(next.into(), Value::U32(10));
        ir.write_shared(Value::U32(0), next.into());
        program.add_phi_operand(phi, entry, Value::U32(0));
        program.add_phi_operand(phi, body, next.into());

        program.push_syntax(SyntaxNode::Block(entry));
        program.push_syntax(SyntaxNode::Loop);
        program.push_syntax(SyntaxNode::Block(body));
        program.push_syntax(SyntaxNode::Repeat { cond: cond.into() });
        program.push_syntax(SyntaxNode::Block(exit));
        program.push_syntax(SyntaxNode::Return);
        program
    }

    #[test]
    fn test_variables_are_recycled() {
        let source = emit(&mut sequential_adds()).unwrap();
        assert!(source.starts_with(MSL_PRELUDE));
        let first = source.find("u_0=1u+2u;").unwrap();
        let store = source.find("smem[(0u)>>2]=u_0;").unwrap();
        let second = source.find("u_0=3u+4u;").unwrap();
        assert!(first < store && store < second);
        assert_eq!(source.matches("uint u_0=uint(0);").count(), 1);
        assert!(!source.contains("u_1"));
        assert!(source.contains("threadgroup uint smem[2];"));
        assert!(source.contains("kernel void main_("));
        assert!(source.trim_end().ends_with("return;\n}"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let program = sequential_adds();
        let first = emit(&mut program.clone()).unwrap();
        let second = emit(&mut program.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_loop_carried_phi() {
        let source = emit(&mut counting_loop()).unwrap();
        let init = source.find("u_0=0u;").unwrap();
        let header = source.find("for(;;){").unwrap();
        let step = source.find("u_1=u_0+1u;").unwrap();
        let carry = source.find("u_0=u_1;").unwrap();
        let back_edge = source.find("if(--loop0<0 || !b_0){break;}}").unwrap();
        assert!(init < header && header < step && step < carry && carry < back_edge);
        assert!(source.contains("int loop0=0x2000;"));
        assert!(source.contains("b_0=u_1<10u;"));
    }

    #[test]
    fn test_loop_safety_can_be_disabled() {
        let profile = Profile {
            disable_loop_safety_checks: true,
            ..Profile::default()
        };
        let source = emit_with(&profile, &RuntimeInfo::default(), &mut counting_loop()).unwrap();
        assert!(source.contains("if(!b_0){break;}}"));
        assert!(!source.contains("loop0"));
    }

    #[test]
    fn test_unused_results_are_evaluated_alone() {
        let mut program = Program::new(Stage::Compute);
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        ir.inst(Opcode::SharedAtomicIAdd32, vec![Value::U32(0), Value::U32(1)]);
        ir.iadd(Value::U32(5), Value::U32(6));
        program.shared_memory_size = 4;
        program.push_syntax(SyntaxNode::Block(block));
        let source = emit(&mut program).unwrap();
        assert!(source.contains(
            "tu_0=atomic_fetch_add_explicit((threadgroup atomic_uint*)&smem[(0u)>>2],1u,memory_order_relaxed);"
        ));
        assert!(source.contains("uint tu_0=uint(0);"));
        assert!(source.contains("5u+6u;"));
        // Missing terminator gets a return appended
        assert!(source.contains("return;"));
    }

    #[test]
    fn test_shared_memory_is_clamped() {
        let mut program = sequential_adds();
        program.shared_memory_size = 64 * 1024;
        let source = emit(&mut program).unwrap();
        assert!(source.contains("threadgroup uint smem[8192];"));
    }

    #[test]
    fn test_workgroup_size_constant() {
        let mut program = sequential_adds();
        program.workgroup_size = [8, 4, 0];
        let source = emit(&mut program).unwrap();
        assert!(source.contains("constant uint3 __workgroup_size=uint3(8u,4u,1u);"));
    }

    #[test]
    fn test_unsupported_opcode_is_not_implemented() {
        let mut program = Program::new(Stage::Compute);
        let block = program.add_block();
        let undef = IrEmitter::new(&mut program, block).inst(Opcode::UndefU8, vec![]);
        IrEmitter::new(&mut program, block).reference(undef.into());
        program.push_syntax(SyntaxNode::Block(block));
        assert!(matches!(
            emit(&mut program),
            Err(ShaderError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_indirect_cbuf_binding_is_not_implemented() {
        let mut program = Program::new(Stage::Compute);
        let block = program.add_block();
        let binding = IrEmitter::new(&mut program, block).iadd(Value::U32(0), Value::U32(1));
        let mut ir = IrEmitter::new(&mut program, block);
        let value = ir.get_cbuf_u32(binding.into(), Value::U32(0));
        ir.write_shared(Value::U32(0), value.into());
        program.push_syntax(SyntaxNode::Block(block));
        // No info pass: an indirect binding would declare every buffer
        let err = emit_msl(
            &Profile::default(),
            &RuntimeInfo::default(),
            &mut program,
            &mut Bindings::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShaderError::not_implemented("indirect constant buffer binding")
        );
    }

    #[test]
    fn test_vertex_passthrough() {
        let mut program = Program::new(Stage::VertexB);
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        ir.prologue();
        for element in 0..4 {
            let value = ir.get_attribute(Attribute::generic(0, element));
            ir.set_attribute(Attribute(Attribute::POSITION_X.0 + element as u16), value.into());
        }
        ir.epilogue();
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Return);

        let runtime_info = RuntimeInfo {
            fixed_state_point_size: Some(2.0),
            ..RuntimeInfo::default()
        };
        let source = emit_with(&Profile::default(), &runtime_info, &mut program).unwrap();
        assert!(source.contains("float4 attr0 [[attribute(0)]];"));
        assert!(source.contains("vertex __Output main_(__Input __in [[stage_in]]"));
        assert!(source.contains("__out.point_size=2.0f;"));
        assert!(source.contains("f_0=__in.attr0.x;\n__out.position.x=f_0;"));
        assert!(source.contains("f_0=__in.attr0.w;\n__out.position.w=f_0;"));
        assert!(source.contains("__Output __out={};"));
        assert!(source.contains("return __out;"));
    }

    #[test]
    fn test_fragment_alpha_test() {
        let mut program = Program::new(Stage::Fragment);
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        ir.set_frag_color(0, 3, Value::F32(0.25));
        ir.epilogue();
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Return);

        let runtime_info = RuntimeInfo {
            alpha_test_func: Some(CompareFunction::Greater),
            alpha_test_reference: 0.5,
            force_early_z: true,
            ..RuntimeInfo::default()
        };
        let source = emit_with(&Profile::default(), &runtime_info, &mut program).unwrap();
        assert!(source.contains("__out.color0.w=0.25f;"));
        assert!(source.contains("if(!(__out.color0.a>0.5f)){discard_fragment();}"));
        assert!(source.contains("[[early_fragment_tests]] fragment __Output main_("));
    }

    #[test]
    fn test_alpha_test_never_discards() {
        let mut program = Program::new(Stage::Fragment);
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        ir.set_frag_color(0, 0, Value::F32(1.0));
        ir.epilogue();
        program.push_syntax(SyntaxNode::Block(block));

        let runtime_info = RuntimeInfo {
            alpha_test_func: Some(CompareFunction::Never),
            ..RuntimeInfo::default()
        };
        let source = emit_with(&Profile::default(), &runtime_info, &mut program).unwrap();
        assert!(source.contains("discard_fragment();"));
        assert!(!source.contains("[[early_fragment_tests]]"));
    }

    #[test]
    fn test_break_on_immediate_conditions() {
        let mut program = Program::new(Stage::Compute);
        let block = program.add_block();
        program.push_syntax(SyntaxNode::Loop);
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Break {
            cond: Value::U1(false),
        });
        program.push_syntax(SyntaxNode::Break {
            cond: Value::U1(true),
        });
        program.push_syntax(SyntaxNode::Repeat {
            cond: Value::U1(true),
        });
        let source = emit(&mut program).unwrap();
        assert_eq!(source.matches("break;").count(), 2);
        assert!(source.contains("for(;;){\nbreak;\nif(--loop0<0 || !true){break;}}"));
    }

    #[test]
    fn test_carry_is_declared_only_when_read() {
        let source = emit(&mut sequential_adds()).unwrap();
        assert!(!source.contains("uint carry;"));
        assert!(!source.contains("shfl_in_bounds"));

        let mut program = Program::new(Stage::Compute);
        program.shared_memory_size = 8;
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        let sum = ir.inst(Opcode::IAddCarry32, vec![Value::U32(0xFFFF_FFFF), Value::U32(2)]);
        let carry = ir.inst(Opcode::GetCarry, vec![]);
        ir.write_shared(Value::U32(0), sum.into());
        ir.reference(carry.into());
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Return);

        let source = emit(&mut program).unwrap();
        assert!(source.contains("uint carry;"));
        let carry_out = source.find("carry=uint(2u>~4294967295u);").unwrap();
        let add = source.find("u_0=4294967295u+2u;").unwrap();
        assert!(carry_out < add);
        assert!(source.contains("carry!=0u;"));
        assert!(!source.contains("shfl_in_bounds"));
    }

    #[test]
    fn test_shuffle_temporaries_are_declared_only_when_shuffling() {
        let mut program = Program::new(Stage::Compute);
        program.shared_memory_size = 4;
        let block = program.add_block();
        let mut ir = IrEmitter::new(&mut program, block);
        let value = ir.load_shared(Value::U32(0));
        let shuffled = ir.inst(
            Opcode::ShuffleButterfly,
            vec![value.into(), Value::U32(1), Value::U32(0x1F), Value::U32(0)],
        );
        ir.write_shared(Value::U32(0), shuffled.into());
        program.push_syntax(SyntaxNode::Block(block));
        program.push_syntax(SyntaxNode::Return);

        let source = emit(&mut program).unwrap();
        assert!(source.contains("bool shfl_in_bounds;"));
        assert!(source.contains("uint shfl_result;"));
        assert!(source.contains("uint __lane [[thread_index_in_simdgroup]]"));
        assert!(source.contains("shfl_in_bounds=int(__lane^1u)<=int((__lane&0u)|(31u&~0u));"));
        assert!(source.contains("=shfl_in_bounds?shfl_result:"));
        assert!(!source.contains("uint carry;"));
    }
}
