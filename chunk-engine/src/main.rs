use chunk_engine::worker::serve;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn main() {
    // stdout carries the reply stream, so logs go to stderr only.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("off")),
                ),
        )
        .init();

    if let Err(e) = serve(std::io::stdin().lock(), std::io::stdout().lock()) {
        eprintln!("chunk-worker: {}", e);
        std::process::exit(1);
    }
}
