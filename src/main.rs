//! Claude Agent - run Claude Code queries from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_agent::config::ConfigLoader;
use claude_agent::display;
use claude_agent::options::AgentOptions;
use claude_agent::{ClaudeAgent, QueryResult};

#[derive(Parser)]
#[command(
    name = "claude-agent",
    about = "Run Claude Code queries and decode their output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print the final answer.
    Query {
        /// The prompt to send.
        prompt: String,
        #[command(flatten)]
        query: QueryArgs,
        /// Print a JSON summary instead of the answer text.
        #[arg(long)]
        json: bool,
    },
    /// Run a query and show messages as they arrive.
    Stream {
        /// The prompt to send.
        prompt: String,
        #[command(flatten)]
        query: QueryArgs,
        /// Show full values and unmodelled messages.
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Model to use.
    #[arg(short, long)]
    model: Option<String>,
    /// Maximum number of agent turns.
    #[arg(long)]
    max_turns: Option<u32>,
}

impl QueryArgs {
    fn apply(self, mut options: AgentOptions) -> AgentOptions {
        if let Some(model) = self.model {
            options = options.model(model);
        }
        if let Some(turns) = self.max_turns {
            options = options.max_turns(turns);
        }
        options
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let agent = ClaudeAgent::new(config);
    tracing::debug!(cli = %agent.transport().cli_path().display(), "Using Claude CLI");

    match cli.command {
        Commands::Query {
            prompt,
            query,
            json,
        } => run_query(&agent, &prompt, query, json).await,
        Commands::Stream { prompt, query, raw } => run_stream(&agent, &prompt, query, raw).await,
    }
}

async fn run_query(agent: &ClaudeAgent, prompt: &str, args: QueryArgs, json: bool) -> ExitCode {
    let options = args.apply(agent.options());
    let result = match agent.query(prompt, Some(options)).await {
        Ok(result) => result,
        Err(e) => {
            display::print_transport_error(&e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&summary(&result)) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to encode summary: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if let Some(text) = result.text() {
        println!("{text}");
    } else {
        println!("{}", result.full_text());
    }

    if result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_stream(agent: &ClaudeAgent, prompt: &str, args: QueryArgs, raw: bool) -> ExitCode {
    let options = args.apply(agent.options());
    let mut stream = match agent.stream(prompt, Some(options)) {
        Ok(stream) => stream,
        Err(e) => {
            display::print_transport_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let stopper = agent.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping Claude CLI");
            stopper.stop();
        }
    });

    let mut code = ExitCode::SUCCESS;
    while let Some(item) = stream.next_message().await {
        match item {
            Ok(message) => display::print_message(&message, raw),
            Err(e) => {
                display::print_transport_error(&e);
                code = ExitCode::FAILURE;
            }
        }
    }

    interrupt.abort();
    code
}

fn summary(result: &QueryResult) -> serde_json::Value {
    serde_json::json!({
        "session_id": result.session_id,
        "text": result.text(),
        "is_error": result.is_error(),
        "cost_usd": result.cost_usd(),
        "turns": result.turns(),
        "duration_ms": result.duration_ms(),
        "structured_output": result.structured(),
    })
}
