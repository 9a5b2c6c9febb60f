//! vault-cert-storage command line entry point

use std::io::{Read, Write};
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vault_cert_storage::config::Config;
use vault_cert_storage::storage::{Storage, VaultStorage};

/// Print usage information
fn print_usage() {
    eprintln!("Usage: vault-cert-storage <config.yaml> <command> [args]");
    eprintln!();
    eprintln!("vault-cert-storage - Certificate storage on a KV v2 secrets engine");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  get KEY                      Write the value at KEY to stdout");
    eprintln!("  put KEY [FILE]               Store FILE (or stdin) at KEY");
    eprintln!("  delete KEY                   Delete KEY");
    eprintln!("  exists KEY                   Exit 0 if KEY holds a value, 1 otherwise");
    eprintln!("  stat KEY                     Print size and modification time of KEY");
    eprintln!("  list [PREFIX] [--recursive]  List keys under PREFIX");
    eprintln!("  lock KEY                     Acquire the lock for KEY (Ctrl+C to give up)");
    eprintln!("  unlock KEY                   Release the lock for KEY");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  vault-cert-storage /etc/vault-cert-storage/config.yaml list --recursive");
}

/// A parsed command line command
#[derive(Debug)]
enum Command {
    Get(String),
    Put(String, Option<PathBuf>),
    Delete(String),
    Exists(String),
    Stat(String),
    List(String, bool),
    Lock(String),
    Unlock(String),
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let (name, rest) = args.split_first()?;
        let key = || rest.first().cloned();

        let command = match (name.as_str(), rest.len()) {
            ("get", 1) => Command::Get(key()?),
            ("put", 1) => Command::Put(key()?, None),
            ("put", 2) => Command::Put(key()?, Some(PathBuf::from(&rest[1]))),
            ("delete", 1) => Command::Delete(key()?),
            ("exists", 1) => Command::Exists(key()?),
            ("stat", 1) => Command::Stat(key()?),
            ("lock", 1) => Command::Lock(key()?),
            ("unlock", 1) => Command::Unlock(key()?),
            ("list", 0..=2) => {
                let mut recursive = false;
                let mut prefix: Option<String> = None;
                for arg in rest {
                    match arg.as_str() {
                        "--recursive" | "-r" => recursive = true,
                        flag if flag.starts_with('-') => return None,
                        _ if prefix.is_some() => return None,
                        _ => prefix = Some(arg.clone()),
                    }
                }
                Command::List(prefix.unwrap_or_default(), recursive)
            }
            _ => return None,
        };

        Some(command)
    }
}

/// Run one command. Returns the process exit code.
async fn run(
    storage: &VaultStorage,
    command: Command,
    cancel: &CancellationToken,
) -> Result<i32, Box<dyn std::error::Error>> {
    match command {
        Command::Get(key) => {
            let value = storage.load(&key).await?;
            std::io::stdout().write_all(&value)?;
        }
        Command::Put(key, file) => {
            let value = match file {
                Some(path) => std::fs::read(&path)?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            storage.store(&key, &value).await?;
            info!("Stored {} bytes at {}", value.len(), key);
        }
        Command::Delete(key) => {
            storage.delete(&key).await?;
            info!("Deleted {}", key);
        }
        Command::Exists(key) => {
            if !storage.exists(&key).await {
                return Ok(1);
            }
        }
        Command::Stat(key) => {
            let info = storage.stat(&key).await?;
            println!("key:      {}", info.key);
            println!("size:     {}", info.size);
            println!("modified: {}", info.modified.to_rfc3339());
        }
        Command::List(prefix, recursive) => {
            for key in storage.list(&prefix, recursive).await? {
                println!("{}", key);
            }
        }
        Command::Lock(key) => {
            storage.lock(&key, cancel).await?;
            info!("Lock acquired for {}", key);
        }
        Command::Unlock(key) => {
            storage.unlock(&key).await?;
            info!("Lock released for {}", key);
        }
    }

    Ok(0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let Some(command) = Command::parse(&args[2..]) else {
        print_usage();
        std::process::exit(1);
    };

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging; stdout carries command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Loaded configuration from {:?}", config_path);

    let storage = VaultStorage::new(config.storage)?;

    // Ctrl+C abandons a pending lock wait
    let cancel = CancellationToken::new();
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        c.cancel();
    })?;

    let code = match run(&storage, command, &cancel).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            1
        }
    };

    if let Err(e) = storage.logout().await {
        warn!("Logout failed: {}", e);
    }

    std::process::exit(code);
}
