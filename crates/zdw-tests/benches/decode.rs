use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use zdw_decoder::InclusionRule;
use zdw_output::FileSink;
use zdw_tests::{decode_lines, engine_over, golden_bytes, weblog};

fn bench_decode_golden(c: &mut Criterion) {
    let bytes = golden_bytes();
    c.bench_function("decode_golden", |b| {
        b.iter(|| decode_lines(bytes.clone()).unwrap());
    });
}

fn bench_decode_versions(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_weblog");
    for version in [5u16, 8, 11] {
        let bytes = weblog(version, 4, 2_500).build().bytes;
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(version), &bytes, |b, bytes| {
            b.iter(|| {
                let mut engine = engine_over(bytes.clone(), "bench");
                engine.read_header().unwrap();
                let mut sink = FileSink::new(std::io::sink());
                while engine.advance().unwrap() {
                    engine.decode_row_into(&mut sink).unwrap();
                }
                sink.lines_written()
            });
        });
    }
    group.finish();
}

fn bench_decode_compressed(c: &mut Criterion) {
    let builder = weblog(11, 4, 2_500);
    let raw = builder.build().bytes;
    let gzip = builder.clone().gzip().build().bytes;
    let zstd = builder.zstd().build().bytes;

    let mut group = c.benchmark_group("decode_compression");
    for (name, bytes) in [("raw", raw), ("gzip", gzip), ("zstd", zstd)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_lines(bytes.clone()).unwrap().len());
        });
    }
    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let bytes = weblog(11, 4, 2_500).build().bytes;
    c.bench_function("decode_projected_two_columns", |b| {
        b.iter(|| {
            let mut engine = engine_over(bytes.clone(), "bench");
            engine.read_header().unwrap();
            engine
                .set_columns_to_output_csv("status,virtual_export_row", InclusionRule::FailOnInvalidColumn)
                .unwrap();
            let mut rows = 0u64;
            while engine.next_row().unwrap().is_some() {
                rows += 1;
            }
            rows
        });
    });
}

criterion_group!(
    benches,
    bench_decode_golden,
    bench_decode_versions,
    bench_decode_compressed,
    bench_projection
);
criterion_main!(benches);
