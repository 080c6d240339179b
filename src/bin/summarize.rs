//! summarize — run summarization requests from the terminal.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use summarizerrrr::{
    Config, ExecutionContext, FnListener, GenerationRequest, ProviderKind, Secrets,
};

/// Summarizerrrr CLI
#[derive(Parser)]
#[command(name = "summarize")]
#[command(version = summarizerrrr::PKG_VERSION)]
#[command(about = "Summarize text with automatic provider fallback")]
struct Args {
    /// Config file (default: ~/.summarizerrrr/config.toml)
    #[arg(short, long, env = "SUMMARIZERRRR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate text with a configured provider
    Generate {
        /// Provider id from the config file
        #[arg(short, long)]
        provider: String,
        /// Model override (default: the provider's first model)
        #[arg(short, long)]
        model: Option<String>,
        /// System instruction
        #[arg(short, long, default_value = "Summarize the following text concisely.")]
        system: String,
        /// Run as a restricted context (block mode, local providers via proxy)
        #[arg(long)]
        restricted: bool,
        /// Never stream
        #[arg(long)]
        no_stream: bool,
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
    },

    /// List configured providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    debug!(version = summarizerrrr::version_string(), "summarize starting");
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Providers => {
            let secrets = Secrets::load()?;
            for provider in &config.providers {
                let keys = if provider.kind.requires_api_key() {
                    format!("{} key(s)", secrets.api_keys(&provider.id).len())
                } else {
                    "no key needed".to_string()
                };
                let streaming = if provider.supports_streaming {
                    "stream"
                } else {
                    "block only"
                };
                println!("{} ({}, {streaming}, {keys})", provider.id, provider.kind);
                for model in &provider.models {
                    println!("  {}", model.name);
                }
                if provider.kind == ProviderKind::Ollama && provider.base_url.is_none() {
                    println!("  endpoint: default local");
                }
            }
        }

        Command::Generate {
            provider,
            model,
            system,
            restricted,
            no_stream,
            prompt,
        } => {
            let prompt = read_input(prompt)?;
            let secrets = Secrets::load()?;

            let mut builder = config
                .builder(&secrets)
                .listener(FnListener::new(|event| {
                    eprintln!("⚠ {}", event.toast_message());
                }));
            if restricted {
                builder = builder
                    .execution_context(ExecutionContext::Restricted)
                    .local_proxy(true);
            }
            let orchestrator = builder.build()?;

            let mut request = GenerationRequest::new(provider, system, prompt)
                .prefer_streaming(config.orchestrator.prefer_streaming && !no_stream);
            if let Some(model) = model {
                request = request.model(model);
            }

            let generation = orchestrator.generate(&request).await?;
            println!("{}", generation.result.text);
            if let Some(last) = generation.final_attempt() {
                eprintln!(
                    "[{} / {} / {} / {} attempt(s)]",
                    generation.provider,
                    last.model,
                    last.transport,
                    generation.attempts.len()
                );
            }
        }
    }

    Ok(())
}

/// Use the argument if given, otherwise read stdin (unless it is a terminal).
fn read_input(arg: Option<String>) -> io::Result<String> {
    if let Some(text) = arg {
        return Ok(text);
    }
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no prompt given and stdin is a terminal",
        ));
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    Ok(buffer)
}
