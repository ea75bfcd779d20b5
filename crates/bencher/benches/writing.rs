use std::hint::black_box;
use std::io;
use std::sync::Arc;

use bencher::{Framing, INNER_LOOP_COUNT, WRITE_SIZE, WriteCase, WriteFlavour, write_cases};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use http::{header, HeaderValue};
use micro_http_output::buffer::{BlockPool, PoolConfig};
use micro_http_output::connection::{OutputPipeline, PipelineConfig};
use micro_http_output::executor::SerialQueue;
use micro_http_output::transport::Transport;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Accepts every flush without touching the bytes.
struct NullTransport;

impl Transport for NullTransport {
    async fn flush(&self, buf: &[u8]) -> io::Result<()> {
        black_box(buf);
        Ok(())
    }
}

fn new_pipeline(case: &WriteCase, pool: &BlockPool) -> OutputPipeline<NullTransport> {
    let mut pipeline = OutputPipeline::new(Arc::new(NullTransport), pool.clone(), SerialQueue::spawn(), PipelineConfig::default());
    if case.framing() == Framing::ContentLength {
        let headers = pipeline.headers_mut().expect("headers are open on a fresh pipeline");
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(case.payload_bytes()));
    }
    pipeline
}

async fn run_case(case: &WriteCase, pool: &BlockPool, data: &[u8], token: &CancellationToken) {
    if case.flavour() == WriteFlavour::ProduceEnd {
        for _ in 0..INNER_LOOP_COUNT {
            new_pipeline(case, pool).produce_end().await.expect("empty response should finish");
        }
        return;
    }

    let mut pipeline = new_pipeline(case, pool);
    for _ in 0..INNER_LOOP_COUNT {
        match case.flavour() {
            WriteFlavour::Write => pipeline.write(data).expect("write within content-length"),
            WriteFlavour::WriteAsync => pipeline.write_async(data, token).await.expect("write within content-length"),
            WriteFlavour::WriteAsyncAwaited => {
                pipeline.write_async_awaited(data, token).await.expect("write within content-length");
            }
            WriteFlavour::ProduceEnd => unreachable!(),
        }
    }
    pipeline.produce_end().await.expect("response should finish");
}

fn benchmark_writing(criterion: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let pool = BlockPool::new(PoolConfig::default());
    let data = vec![0u8; WRITE_SIZE];
    let token = CancellationToken::new();

    let mut group = criterion.benchmark_group("writing");
    for case in write_cases() {
        group.throughput(Throughput::Elements(INNER_LOOP_COUNT as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| runtime.block_on(run_case(case, &pool, &data, &token)));
        });
    }

    group.finish();
}

criterion_group!(writing, benchmark_writing);
criterion_main!(writing);
