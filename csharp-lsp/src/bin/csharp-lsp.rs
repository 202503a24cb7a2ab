use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use csharp_lsp::{CSharpLanguageServer, ServerOptions};

struct CliOptions {
    server: ServerOptions,
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: csharp-lsp [--solution <path>] [--loglevel <error|warn|info|debug|trace>]");
            return ExitCode::from(3);
        }
    };

    // stdout carries the protocol; logs go to stderr. RUST_LOG overrides
    // the --loglevel default.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(options.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("starting csharp-lsp");

    let stdin = stdin();
    let stdout = stdout();
    let (service, socket) = LspService::build(move |client| {
        CSharpLanguageServer::with_options(client, options.server.clone())
    })
    .custom_method("csharp/metadata", CSharpLanguageServer::metadata)
    .finish();

    // A panic out of the serve loop is a startup/runtime crash, reported as
    // exit code 3; a clean shutdown/exit sequence lands in the Ok arm.
    let serve = tokio::spawn(async move {
        Server::new(stdin, stdout, socket).serve(service).await;
    });
    match serve.await {
        Ok(()) => {
            tracing::info!("csharp-lsp stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "csharp-lsp crashed");
            ExitCode::from(3)
        }
    }
}

fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut solution_path: Option<PathBuf> = None;
    let mut log_level = "info".to_string();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if (arg == "-s" || arg == "--solution") && i + 1 < args.len() {
            solution_path = Some(PathBuf::from(&args[i + 1]));
            i += 2;
        } else if (arg == "-l" || arg == "--loglevel") && i + 1 < args.len() {
            let level = args[i + 1].as_str();
            if !matches!(level, "error" | "warn" | "info" | "debug" | "trace") {
                return Err(format!("unknown log level: {level}"));
            }
            log_level = level.to_string();
            i += 2;
        } else if !arg.starts_with('-') && solution_path.is_none() {
            solution_path = Some(PathBuf::from(arg));
            i += 1;
        } else {
            return Err(format!("unknown argument: {arg}"));
        }
    }

    Ok(CliOptions {
        server: ServerOptions { solution_path },
        log_level,
    })
}
