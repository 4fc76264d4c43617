use std::path::Path;

use chunk_bench::{print_report, self_serving, BenchmarkRunner, TrialPlan, SERVE_WORKER};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn print_usage() {
    eprintln!("Usage: chunk-bench [OPTIONS]");
    eprintln!();
    eprintln!("  --config <file>      JSON trial plan; flags below override it");
    eprintln!("  --backend <list>     threaded, multiprocess, all (default: all)");
    eprintln!("  --workers <list>     Worker counts, e.g. 1,2,4,8 (default: 1,2,4,8)");
    eprintln!("  --shape <z,y,x>      Volume shape (default: 16,64,64)");
    eprintln!("  --chunk <z,y,x>      Chunk shape (default: 2,64,64)");
    eprintln!("  --steps <n>          Time steps (default: 10)");
    eprintln!("  --rounds <n>         Repetitions per measurement (default: 3)");
    eprintln!("  --seed <n>           Microstructure seed (default: 99)");
    eprintln!("  --timeout-ms <n>     Abort an execution after this long");
    eprintln!("  --serve-worker       Serve the worker protocol on stdin/stdout");
    eprintln!("  --help               Show this help");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    print_usage();
    std::process::exit(1);
}

fn main() {
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

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == SERVE_WORKER) {
        if let Err(e) = chunk_engine::worker::serve(std::io::stdin().lock(), std::io::stdout().lock()) {
            eprintln!("chunk-bench worker: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    // --config is applied first so later flags override it wherever they appear.
    let mut plan = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => TrialPlan::from_json_file(Path::new(path)).unwrap_or_else(|e| fail(e)),
            None => fail("missing value for --config"),
        },
        None => TrialPlan::default(),
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let Some(value) = args.get(i + 1) else {
            fail(format!("missing value for {}", flag));
        };
        if flag != "--config" {
            if let Err(e) = plan.apply_flag(flag, value) {
                fail(e);
            }
        }
        i += 2;
    }

    let exec = self_serving(plan.exec_config());

    let params = plan.params();
    println!(
        "shape {}  chunk {}  steps {}  rounds {}",
        params.shape, params.chunk, params.n_steps, plan.rounds
    );

    let runner = BenchmarkRunner::new(plan.kernel(), exec);
    let outcome = runner.run_suite(&params, &plan.backends, &plan.workers, plan.rounds);

    print_report(&outcome.rows);

    if !outcome.is_success() {
        for failure in &outcome.failures {
            eprintln!("FAILED: {}", failure);
        }
        std::process::exit(1);
    }
}
