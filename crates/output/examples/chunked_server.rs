use std::sync::Arc;
use std::time::Duration;

use http::{HeaderValue, StatusCode, header};
use micro_http_output::buffer::{BlockPool, PoolConfig};
use micro_http_output::connection::{OutputPipeline, PipelineConfig};
use micro_http_output::executor::SerialQueue;
use micro_http_output::protocol::OutputError;
use micro_http_output::transport::StreamTransport;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let pool = BlockPool::new(PoolConfig::default());
    loop {
        let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let pool = pool.clone();
        tokio::spawn(async move {
            match respond(tcp_stream, pool).await {
                Ok(()) => info!("finished response, connection shutdown"),
                Err(e) => error!(cause = %e, "response failed, connection shutdown"),
            }
        });
    }
}

/// Streams a slow chunked countdown to the peer, ignoring whatever it sent.
async fn respond(tcp_stream: TcpStream, pool: BlockPool) -> Result<(), OutputError> {
    let (mut reader, writer) = tcp_stream.into_split();
    let mut request = [0u8; 1024];
    let _ = reader.read(&mut request).await.map_err(OutputError::transport)?;

    let transport = Arc::new(StreamTransport::new(writer));
    let config = PipelineConfig::default().with_emit_head(true);
    let mut pipeline = OutputPipeline::new(Arc::clone(&transport), pool, SerialQueue::spawn(), config);

    let head = pipeline.head_mut()?;
    *head.status_mut() = StatusCode::OK;
    head.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

    let token = CancellationToken::new();
    for n in (1..=5).rev() {
        pipeline.write_async_awaited(format!("{n}...\r\n").as_bytes(), &token).await?;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    pipeline.write(b"liftoff\r\n")?;
    pipeline.produce_end().await?;

    transport.shutdown().await.map_err(OutputError::transport)
}
