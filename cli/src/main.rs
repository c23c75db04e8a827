use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use domain::Request;
use orchestrator::Orchestrator;

/// Thin stdin/stdout front end for the orchestrator pipeline. Stands in
/// for the HTTP transport layer, which is out of scope here: this binary
/// wires configuration, handler registration, and `Orchestrator::process`
/// together for local invocation and scripting.
#[derive(Parser, Debug)]
#[command(
    name = "orchestrator-cli",
    version,
    about = "Clinical decision-support orchestrator, stdin/stdout front end"
)]
struct Args {
    /// Path to the orchestrator TOML configuration file.
    #[arg(long, default_value = "config/orchestrator.toml")]
    config: PathBuf,

    /// Submit a single message and exit instead of reading a line-oriented
    /// request loop from stdin.
    #[arg(long)]
    message: Option<String>,

    /// Caller identity attached to `--message` requests.
    #[arg(long, default_value = "cli-user")]
    user_id: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = platform::init_tracing("orchestrator-cli") {
        eprintln!("failed to init tracing: {e}");
    }

    let orchestrator = match Orchestrator::from_config_file(&args.config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("failed to load configuration from {:?}: {e}", args.config);
            std::process::exit(1);
        }
    };

    register_handlers(&orchestrator);

    if let Some(message) = args.message {
        let request = Request::new(args.user_id, message);
        let response = orchestrator.process(request).await;
        print_response(&response);
        return;
    }

    run_stdin_loop(&orchestrator, &args.user_id).await;
}

fn register_handlers(orchestrator: &Orchestrator) {
    let registry = orchestrator.registry();
    registry.register(Arc::new(triage::TriageHandler::new()));
    registry.register(Arc::new(communication::CommunicationHandler::new()));
    registry.register(Arc::new(diagnostic::DiagnosticHandler::new()));
    registry.register(Arc::new(image_analysis::ImageAnalysisHandler::new()));
    registry.register(Arc::new(drug_info::DrugInfoHandler::new()));
}

/// Reads one request per line from stdin: either a bare message (taken as
/// the request text) or a JSON object matching `Request`'s shape. Exits on
/// EOF.
async fn run_stdin_loop(orchestrator: &Orchestrator, default_user_id: &str) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => request,
            Err(_) => Request::new(default_user_id, trimmed),
        };

        let response = orchestrator.process(request).await;
        print_response(&response);
        let _ = stdout.flush();
    }
}

fn print_response(response: &domain::WrappedResponse) {
    match serde_json::to_string(response) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize response: {e}"),
    }
}
