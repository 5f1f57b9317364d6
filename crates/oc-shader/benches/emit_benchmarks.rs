//! Benchmarks for MSL emission

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oc_shader::ir::{collect_shader_info, IrEmitter, Value};
use oc_shader::{emit_msl, Bindings, Profile, Program, RuntimeInfo, Stage, SyntaxNode};

/// Compute program with `len` dependent adds stored through shared memory
fn arithmetic_chain(len: usize) -> Program {
    let mut program = Program::new(Stage::Compute);
    program.shared_memory_size = 256;
    let block = program.add_block();
    let mut ir = IrEmitter::new(&mut program, block);
    let mut value = ir.load_shared(Value::U32(0));
    for step in 0..len {
        let scaled = ir.imul(value.into(), Value::U32(3));
        value = ir.iadd(scaled.into(), Value::U32(step as u32));
        if step % 8 == 0 {
            ir.write_shared(Value::U32((step % 64) as u32 * 4), value.into());
        }
    }
    ir.write_shared(Value::U32(0), value.into());
    program.push_syntax(SyntaxNode::Block(block));
    program.push_syntax(SyntaxNode::Return);
    collect_shader_info(&mut program);
    program
}

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit_msl");
    let profile = Profile::default();
    let runtime_info = RuntimeInfo::default();

    for len in [16usize, 256, 4096].iter() {
        let program = arithmetic_chain(*len);
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("chain", len), &program, |b, program| {
            b.iter(|| {
                let mut program = program.clone();
                let source =
                    emit_msl(&profile, &runtime_info, &mut program, &mut Bindings::new());
                black_box(source)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_emit);
criterion_main!(benches);
