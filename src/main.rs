#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use skycast::agent::{ChatService, TurnRequest, TurnState};
use skycast::config::Config;
use skycast::observability::{self, Observer};
use skycast::sessions::SessionService;
use skycast::{gateway, weather};

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `Skycast` - a weather assistant that remembers the conversation.
#[derive(Parser, Debug)]
#[command(name = "skycast")]
#[command(version)]
#[command(about = "Conversational weather assistant.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the assistant in the terminal
    #[command(long_about = "\
Chat with the weather assistant in the terminal.

Keeps one conversation for the whole run. Type /new to start a fresh \
conversation and /quit to leave. Use --message for a single question.

Examples:
  skycast chat
  skycast chat --city Oslo
  skycast chat -m \"Do I need an umbrella in London today?\"")]
    Chat {
        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,

        /// City to attach to every question
        #[arg(long)]
        city: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0)
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,
    },

    /// Start the HTTP gateway
    #[command(long_about = "\
Start the HTTP gateway.

Serves the chat and session API. Bind address defaults to the values \
in your config file (gateway.host / gateway.port).

Examples:
  skycast gateway                  # use config defaults
  skycast gateway -p 8080          # listen on port 8080
  skycast gateway --host 0.0.0.0   # bind to all interfaces (needs allow_public_bind)")]
    Gateway {
        /// Port to listen on; defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the effective configuration
    Status,

    /// Manage configuration
    #[command(long_about = "\
Manage Skycast configuration.

Use 'schema' to dump the full JSON Schema for the config file, which \
documents every available key, type, and default value.

Examples:
  skycast config schema              # print JSON Schema to stdout
  skycast config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `skycast`.

Examples:
  source <(skycast completions bash)
  skycast completions zsh > ~/.zfunc/_skycast")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Both ring and aws-lc-rs may be linked; pick one explicitly.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("SKYCAST_CONFIG_DIR", config_dir);
    }

    // Completions must stay stdout-only: no config, no logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load_or_init().await?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Chat {
            message,
            city,
            model,
            temperature,
        } => {
            if let Some(model) = model {
                config.default_model = Some(model);
            }
            if let Some(temperature) = temperature {
                config.default_temperature = temperature;
            }
            config.validate()?;
            run_chat(config, message, city).await
        }

        Commands::Gateway { port, host } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            config.validate()?;
            info!(
                "Starting Skycast gateway on {}:{}",
                config.gateway.host, config.gateway.port
            );
            gateway::run_gateway(config).await
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(Config);
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
        },
    }
}

fn print_status(config: &Config) {
    let has_key = |key: &Option<String>| key.as_deref().is_some_and(|k| !k.trim().is_empty());

    println!("Skycast Status");
    println!();
    println!("Version:      {}", env!("CARGO_PKG_VERSION"));
    println!("Config:       {}", config.config_path.display());
    println!();
    println!(
        "Model:        {}",
        config.default_model.as_deref().unwrap_or("(default)")
    );
    println!(
        "Endpoint:     {}",
        config.api_url.as_deref().unwrap_or("(default)")
    );
    println!("API key:      {}", if has_key(&config.api_key) { "set" } else { "missing" });
    println!(
        "Weather key:  {}",
        if has_key(&config.weather.api_key) { "set" } else { "missing" }
    );
    println!(
        "Air quality:  {}",
        if config.weather.air_quality { "on" } else { "off" }
    );
    println!("Observability: {}", config.observability.backend);
    println!();
    println!("Sessions:");
    println!("  TTL:               {}s", config.sessions.ttl_secs);
    println!("  Sweep interval:    {}s", config.sessions.cleanup_interval_secs);
    println!("  Context messages:  {}", config.sessions.max_context_messages);
    println!("  Context chars:     {}", config.sessions.max_context_chars);
    println!();
    println!(
        "Gateway:      {}:{}",
        config.gateway.host, config.gateway.port
    );
}

/// Run one turn and print the reply. Returns the session id to continue with.
async fn chat_once(chat: &ChatService, request: TurnRequest) -> Result<String> {
    let outcome = chat.process_turn(request).await?;
    match (outcome.state, &outcome.reply) {
        (TurnState::Complete, Some(reply)) => println!("{}", reply.content),
        _ => eprintln!(
            "Turn failed: {} (send the question again to retry)",
            outcome.failure.as_deref().unwrap_or("unknown error")
        ),
    }
    Ok(outcome.session_id)
}

async fn run_chat(config: Config, message: Option<String>, city: Option<String>) -> Result<()> {
    let observer: Arc<dyn Observer> =
        Arc::from(observability::create_observer(&config.observability));
    let sessions = Arc::new(SessionService::from_config(&config.sessions, observer.clone()));
    let chat = ChatService::from_config(&config, sessions, observer)?;

    if weather::create_weather_source(&config.weather).is_none() {
        eprintln!("Note: no weather API key set; answers will not include live data.");
    }

    if let Some(message) = message {
        chat_once(
            &chat,
            TurnRequest {
                message,
                city,
                ..TurnRequest::default()
            },
        )
        .await?;
        return Ok(());
    }

    println!("Skycast chat. /new starts a new conversation, /quit exits.");
    let mut session_id: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                session_id = None;
                println!("Started a new conversation.");
                continue;
            }
            _ => {}
        }

        let request = TurnRequest {
            message: line.to_string(),
            session_id: session_id.clone(),
            city: city.clone(),
            user_location: None,
        };
        match chat_once(&chat, request).await {
            Ok(id) => session_id = Some(id),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
