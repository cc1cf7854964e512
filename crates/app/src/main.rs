use std::fmt;
use std::path::Path;
use std::sync::Arc;

use services::{Clock, ImportPayload, SyncService, deck_name_from_file, parse_import};
use storage::cache::JsonFileCache;
use storage::http::{HttpRemoteStore, RemoteConfig};
use storage::repository::RemoteStore;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFile { command: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFile { command } => write!(f, "{command} requires a file path"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- sync");
    eprintln!("  cargo run -p app -- import <file.json> [--folder <name>]");
    eprintln!("  cargo run -p app -- export <file.json>");
    eprintln!("  cargo run -p app -- stats");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --cache <path>   local cache file (default quizmaster_cache.json)");
    eprintln!("  --url <url>      remote document base URL (no URL = offline)");
    eprintln!("  --key <key>      remote API key");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_CACHE, QUIZ_SYNC_URL, QUIZ_SYNC_KEY");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Sync,
    Import { file: String, folder: Option<String> },
    Export { file: String },
    Stats,
}

struct Args {
    command: Command,
    cache_path: String,
    sync_url: Option<String>,
    sync_key: Option<String>,
}

impl Args {
    fn parse(mut argv: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut cache_path =
            std::env::var("QUIZ_CACHE").unwrap_or_else(|_| "quizmaster_cache.json".into());
        let mut sync_url = std::env::var("QUIZ_SYNC_URL").ok();
        let mut sync_key = std::env::var("QUIZ_SYNC_KEY").ok();

        let mut command: Option<&'static str> = None;
        let mut file: Option<String> = None;
        let mut folder: Option<String> = None;

        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--cache" => cache_path = require_value(&mut argv, "--cache")?,
                "--url" => sync_url = Some(require_value(&mut argv, "--url")?),
                "--key" => sync_key = Some(require_value(&mut argv, "--key")?),
                "--folder" => folder = Some(require_value(&mut argv, "--folder")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                "sync" | "import" | "export" | "stats" if command.is_none() => {
                    command = Some(match arg.as_str() {
                        "sync" => "sync",
                        "import" => "import",
                        "export" => "export",
                        _ => "stats",
                    });
                }
                other if command.is_some() && file.is_none() && !other.starts_with("--") => {
                    file = Some(other.to_owned());
                }
                other if other.starts_with("--") => {
                    return Err(ArgsError::UnknownArg(other.to_owned()));
                }
                other => return Err(ArgsError::UnknownCommand(other.to_owned())),
            }
        }

        let command = match command {
            None | Some("sync") => Command::Sync,
            Some("stats") => Command::Stats,
            Some("import") => Command::Import {
                file: file.ok_or(ArgsError::MissingFile { command: "import" })?,
                folder,
            },
            Some("export") => Command::Export {
                file: file.ok_or(ArgsError::MissingFile { command: "export" })?,
            },
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        Ok(Self {
            command,
            cache_path,
            sync_url,
            sync_key,
        })
    }
}

fn build_sync(args: &Args) -> SyncService {
    let cache = Arc::new(JsonFileCache::open(&args.cache_path));
    let remote = args.sync_url.as_ref().map(|url| {
        Arc::new(HttpRemoteStore::new(RemoteConfig::new(
            url.clone(),
            args.sync_key.clone(),
        ))) as Arc<dyn RemoteStore>
    });
    SyncService::new(Clock::default_clock(), cache, remote)
}

fn print_stats(sync: &SyncService) {
    let stats = sync.snapshot().overall_stats();
    println!("folders:   {}", sync.snapshot().folders().len());
    println!("questions: {}", stats.total);
    println!("attempted: {}", stats.attempted);
    println!("correct:   {}", stats.correct);
    println!("incorrect: {}", stats.incorrect);
    println!("skipped:   {}", stats.skipped);
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut sync = build_sync(&args);
    sync.load().await;

    match args.command {
        Command::Sync => {
            let outcome = sync.reconcile_poll().await;
            println!("status:  {}", sync.status());
            println!("poll:    {outcome:?}");
            match sync.last_synced() {
                Some(at) => println!("synced:  {at}"),
                None => println!("synced:  never"),
            }
        }
        Command::Import { file, folder } => {
            let raw = std::fs::read_to_string(&file)?;
            match parse_import(&raw)? {
                ImportPayload::Backup(snapshot) => {
                    sync.import_merge(*snapshot).await?;
                    println!("merged backup from {file}");
                }
                ImportPayload::Deck(import) => {
                    // A --folder flag beats the hint inside the file.
                    let folder = folder.unwrap_or_else(|| import.folder().to_owned());
                    let file_name = Path::new(&file)
                        .file_name()
                        .map_or_else(|| file.clone(), |n| n.to_string_lossy().into_owned());
                    let name = deck_name_from_file(&file_name);
                    let count = import.question_count();
                    let deck = import.into_deck(&name, Clock::default_clock().now())?;
                    sync.mutate(|s| s.add_deck(&folder, deck)).await?;
                    println!("imported \"{name}\" ({count} questions) into {folder}");
                }
            }
            println!("status:  {}", sync.status());
        }
        Command::Export { file } => {
            let doc = sync.snapshot().to_document();
            std::fs::write(&file, serde_json::to_string_pretty(&doc)?)?;
            println!("exported snapshot to {file}");
        }
        Command::Stats => print_stats(&sync),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
