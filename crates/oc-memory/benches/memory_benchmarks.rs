//! Benchmarks for GPU memory access patterns

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oc_memory::{GpuMemoryManager, PageFlags};

fn bench_sequential_read_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_access");

    for size in [1024u64, 4096, 16384, 65536].iter() {
        group.throughput(Throughput::Bytes(*size));

        group.bench_with_input(BenchmarkId::new("write", size), size, |b, &size| {
            let mem = GpuMemoryManager::new();
            mem.map(0, size, PageFlags::RW).unwrap();

            b.iter(|| {
                for i in (0..size).step_by(4) {
                    mem.write(i, black_box(0xDEADBEEFu32)).unwrap();
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("read_block", size), size, |b, &size| {
            let mem = GpuMemoryManager::new();
            mem.map(0, size, PageFlags::RW).unwrap();
            let mut out = vec![0u8; size as usize];

            b.iter(|| {
                mem.read_block(0, &mut out).unwrap();
                black_box(&out);
            });
        });
    }

    group.finish();
}

fn bench_region_generation(c: &mut Criterion) {
    let mem = GpuMemoryManager::new();
    mem.map(0, 0x10_0000, PageFlags::RW).unwrap();

    c.bench_function("region_generation_64k", |b| {
        b.iter(|| black_box(mem.region_generation(black_box(0x8000), 0x1_0000)));
    });
}

criterion_group!(benches, bench_sequential_read_write, bench_region_generation);
criterion_main!(benches);
