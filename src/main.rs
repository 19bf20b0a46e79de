use clap::Parser;
use lead_sheet::{Cli, render, run};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // stdout только для результата, логи уходят в stderr
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let as_json = cli.json;
    let result = run(cli);
    let (text, ok) = render(&result, as_json);

    if ok || as_json {
        println!("{text}");
    } else {
        eprintln!("{text}");
    }
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
