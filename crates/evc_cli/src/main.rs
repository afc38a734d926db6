use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evc_core::{EvcConfig, Personality, PublicState, Stimulus, Subject};
use evc_session::{EngineError, SessionManager, SqliteStore};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod eval;

#[derive(Parser, Debug)]
#[command(name = "evc", author, version, about = "Affective state engine: hormones, emotions and trust per session", long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "evc.toml", global = true)]
    config: String,

    /// Path to the SQLite state database (overrides the config file)
    #[arg(long, env = "EVC_DB_PATH", global = true)]
    db: Option<String>,

    /// Session id to operate on
    #[arg(short, long, default_value = "default", global = true)]
    session: String,

    /// Personality preset: balanced, sensitive, calm, cheerful
    #[arg(long, global = true)]
    personality: Option<Personality>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive loop: one "S D [C]" triple per line
    Chat,
    /// Apply one turn and print the resulting state as JSON
    Turn {
        /// Positive stimulus magnitude (S)
        #[arg(long, allow_negative_numbers = true)]
        positive: f32,
        /// Negative stimulus magnitude (D)
        #[arg(long, allow_negative_numbers = true)]
        negative: f32,
        /// Context multiplier (C)
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        context: f32,
        #[arg(long, default_value = "assistant")]
        subject: Subject,
    },
    /// Print the current state with decay applied, without consuming a turn
    Peek {
        #[arg(long, default_value = "assistant")]
        subject: Subject,
        /// Print the prompt fragment instead of JSON
        #[arg(long)]
        context: bool,
    },
    /// Discard both records of the session
    Reset,
    /// List stored sessions
    Sessions,
    /// Replay random canned stimuli through an in-memory session
    Eval {
        #[arg(long, default_value_t = 100)]
        turns: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Write a per-turn CSV trace
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = EvcConfig::load_or_default(&args.config);
    if let Some(personality) = args.personality.clone() {
        config.personality = personality;
    }
    if let Some(db) = &args.db {
        config.session.db_path = db.clone();
    }

    match args.command {
        Command::Eval { turns, seed, csv } => {
            let personality = format!("{:?}", config.personality).to_lowercase();
            let report = eval::run_eval(config, turns, seed).await?;
            eval::print_report(&report, &personality);
            if let Some(path) = csv {
                eval::write_csv(&report, &path)?;
                println!("  CSV written to {}", path.display());
            }
            Ok(())
        }
        Command::Chat => {
            let (manager, _) = open_manager(config).await?;
            chat(&manager, &args.session).await
        }
        Command::Turn {
            positive,
            negative,
            context,
            subject,
        } => {
            let (manager, _) = open_manager(config).await?;
            let stimulus = Stimulus::new(positive, negative, context);
            let public = manager
                .apply_turn_for(&args.session, subject, stimulus)
                .await
                .or_else(recover_applied)?;
            print_json(&public)
        }
        Command::Peek { subject, context } => {
            let (manager, _) = open_manager(config).await?;
            let public = manager.peek_for(&args.session, subject).await?;
            if context {
                println!("{}", public.describe_for_context());
                Ok(())
            } else {
                print_json(&public)
            }
        }
        Command::Reset => {
            let (manager, _) = open_manager(config).await?;
            manager.reset(&args.session).await?;
            println!("Session '{}' reset.", args.session);
            Ok(())
        }
        Command::Sessions => {
            let (_, store) = open_manager(config).await?;
            for key in store.list_keys().await? {
                println!("{}", key);
            }
            Ok(())
        }
    }
}

async fn open_manager(config: EvcConfig) -> Result<(SessionManager, Arc<SqliteStore>)> {
    info!("Opening state database at {}", config.session.db_path);
    let store = Arc::new(
        SqliteStore::new(&config.session.db_path)
            .await
            .with_context(|| format!("Failed to open {}", config.session.db_path))?,
    );
    Ok((SessionManager::new(config, store.clone()), store))
}

/// A turn that was applied but not persisted still has a result worth
/// showing; report the storage problem and carry on.
fn recover_applied(err: EngineError) -> Result<PublicState, EngineError> {
    match err.applied_state() {
        Some(state) => {
            error!("{}", err);
            eprintln!("warning: state was not persisted: {}", err);
            Ok(state.clone())
        }
        None => Err(err),
    }
}

fn print_json(state: &PublicState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

fn parse_triple(line: &str) -> Option<Stimulus> {
    let values: Vec<f32> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    match values.as_slice() {
        [s, d] => Some(Stimulus::new(*s, *d, 1.0)),
        [s, d, c] => Some(Stimulus::new(*s, *d, *c)),
        _ => None,
    }
}

async fn chat(manager: &SessionManager, session_id: &str) -> Result<()> {
    println!("EVC session '{}'. Enter \"S D [C]\" per turn; 'peek', 'reset' or 'quit'.", session_id);
    print!("> ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        match trimmed {
            "quit" | "exit" => break,
            "" => {}
            "peek" => {
                let public = manager.peek(session_id).await?;
                println!("{}\n", public.describe_for_context());
            }
            "reset" => {
                manager.reset(session_id).await?;
                println!("Session reset.\n");
            }
            _ => match parse_triple(trimmed) {
                Some(stimulus) => match manager.apply_exchange(session_id, stimulus).await {
                    Ok((assistant, user)) => {
                        println!("{}", assistant.describe_for_context());
                        println!("User mood: {} (trend: {})\n", user.mood, user.trend);
                    }
                    Err(e) => {
                        error!("Turn failed: {}", e);
                        println!("\n[Error]: {}\n", e);
                    }
                },
                None => println!("Could not parse '{}'. Expected \"S D [C]\", e.g. 0.2 0.6 1.1\n", trimmed),
            },
        }

        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}
