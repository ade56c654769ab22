mod console;
mod error;

use crate::console::{ConsoleNotifier, StdinConfirm};
use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use futures::StreamExt;
use imgshelf_config::{Config, FailurePolicy, JsonFileStore, MemoryStore, Settings, SettingsStore, StartupMode};
use imgshelf_library::host::{Confirm, FixedAnswer, NotifierHandle};
use imgshelf_library::organize::{sweep, unique_path};
use imgshelf_library::{Context, SessionEvent, Startup, session};
use imgshelf_storage::BackendHandle;
use imgshelf_storage::backend::{LocalBackend, ReadOnlyBackend};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgshelf", version)]
#[command(about = "Keep a vault's images in one folder")]
struct Cli {
    /// Config file layered over the user-level `imgshelf.toml`
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Root folder of the vault
    #[arg(long, global = true)]
    vault: Option<PathBuf>,
    /// Report moves without performing them (settings are not saved either)
    #[arg(long, global = true)]
    dry_run: bool,
    /// What a sweep does when an image can't be moved: `fail-fast` or `best-effort`
    #[arg(long, global = true)]
    on_error: Option<FailurePolicy>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deal with existing images, then move new images as they appear
    Run {
        /// `gated` asks once per vault, `always` sweeps on every start
        #[arg(long)]
        startup: Option<StartupMode>,
        /// Answer yes to the one-time question
        #[arg(long, short)]
        yes: bool,
    },
    /// Move every image in the vault into the destination folder, then exit
    Sweep,
    /// Print where an image with the given file name would be moved to
    Resolve { name: String },
    /// Ask the one-time question again on the next `run`
    Reset,
    /// Print the vault's settings
    Settings,
}

/// Command-line values that take precedence over every other config source.
/// Only flags that were actually given are serialized.
#[derive(Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    vault: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    startup: Option<StartupMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    on_error: Option<FailurePolicy>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
}
impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        let startup = match &cli.command {
            Commands::Run { startup, .. } => *startup,
            _ => None,
        };
        Self {
            vault: cli.vault.clone(),
            startup,
            on_error: cli.on_error,
            dry_run: cli.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).compact().init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref(), Overrides::from(&cli)).or_raise(|| ErrorKind::Config)?;
    let vault = std::path::absolute(&config.vault).or_raise(|| ErrorKind::Vault(config.vault.clone()))?;
    config.vault = vault;
    if config.dry_run {
        tracing::info!("Dry run: nothing in the vault will be moved");
    }

    let store = settings_store(&config).await?;
    let notifier: NotifierHandle = Arc::new(ConsoleNotifier);

    match cli.command {
        Commands::Run { yes, .. } => {
            let backend = open_backend(&config)?;
            let confirm: Box<dyn Confirm> = match yes {
                true => Box::new(FixedAnswer::new(true)),
                false => Box::new(StdinConfirm),
            };
            run_vault(&backend, &config, store.as_ref(), notifier, confirm.as_ref()).await
        },
        Commands::Sweep => {
            let backend = open_backend(&config)?;
            let settings = Settings::load(store.as_ref()).await.or_raise(|| ErrorKind::Settings)?;
            let ctx = Context::new(&settings, notifier).or_raise(|| ErrorKind::Settings)?.with_policy(config.on_error);
            let summary = sweep(&backend, &ctx).await.or_raise(|| ErrorKind::Organize)?;
            for path in &summary.failed {
                tracing::warn!(path = %path.display(), "Left in place");
            }
            Ok(())
        },
        Commands::Resolve { name } => {
            let backend = open_backend(&config)?;
            let settings = Settings::load(store.as_ref()).await.or_raise(|| ErrorKind::Settings)?;
            let ctx = Context::new(&settings, notifier).or_raise(|| ErrorKind::Settings)?;
            if Path::new(&name).file_name().and_then(|n| n.to_str()) != Some(name.as_str()) {
                exn::bail!(ErrorKind::InvalidName(name));
            }
            match ctx.folder() {
                Some(folder) => {
                    let path = unique_path(&backend, folder, &name).await.or_raise(|| ErrorKind::Organize)?;
                    println!("{}", path.display());
                },
                None => println!("No destination folder configured."),
            }
            Ok(())
        },
        Commands::Reset => {
            let mut settings = Settings::load(store.as_ref()).await.or_raise(|| ErrorKind::Settings)?;
            settings.has_organized_existing = false;
            settings.save(store.as_ref()).await.or_raise(|| ErrorKind::Settings)?;
            println!("Existing images will be offered for organizing on the next run.");
            Ok(())
        },
        Commands::Settings => {
            let settings = Settings::load(store.as_ref()).await.or_raise(|| ErrorKind::Settings)?;
            let json = serde_json::to_string_pretty(&settings).or_raise(|| ErrorKind::Settings)?;
            println!("{json}");
            Ok(())
        },
    }
}

/// Watch the vault until interrupted, handling existing images on the way.
async fn run_vault(
    backend: &BackendHandle,
    config: &Config,
    store: &dyn SettingsStore,
    notifier: NotifierHandle,
    confirm: &dyn Confirm,
) -> Result<()> {
    let mut settings = Settings::load(store).await.or_raise(|| ErrorKind::Settings)?;
    let ctx = Context::new(&settings, notifier).or_raise(|| ErrorKind::Settings)?.with_policy(config.on_error);

    let mut events = std::pin::pin!(session(backend, &ctx, &mut settings, store, config.startup, confirm));
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Stopping");
                break;
            },
            event = events.next() => match event {
                Some(SessionEvent::Started(result)) => match result.or_raise(|| ErrorKind::Organize)? {
                    Startup::Swept(summary) => tracing::debug!(moved = summary.moved, "Startup sweep done"),
                    Startup::Declined => tracing::info!("Existing images left where they are"),
                    Startup::Skipped => (),
                },
                // Failures are logged by the watcher and don't stop it.
                Some(SessionEvent::Organized(_)) => (),
                None => {
                    tracing::warn!("Vault stopped reporting new files");
                    break;
                },
            },
        }
    }
    Ok(())
}

fn open_backend(config: &Config) -> Result<BackendHandle> {
    let local = LocalBackend::new("vault", &config.vault).or_raise(|| ErrorKind::Vault(config.vault.clone()))?;
    let backend: BackendHandle = Arc::new(local);
    Ok(match config.dry_run {
        true => Arc::new(ReadOnlyBackend::new(backend)),
        false => backend,
    })
}

/// The vault's settings file. A dry run reads it but keeps changes in memory.
async fn settings_store(config: &Config) -> Result<Box<dyn SettingsStore>> {
    let file = JsonFileStore::new(config.settings_path());
    if !config.dry_run {
        return Ok(Box::new(file));
    }
    Ok(match file.load().await.or_raise(|| ErrorKind::Settings)? {
        Some(raw) => Box::new(MemoryStore::with_contents(raw)),
        None => Box::new(MemoryStore::default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(args: &[&str]) -> serde_json::Value {
        let cli = Cli::try_parse_from(args).unwrap();
        serde_json::to_value(Overrides::from(&cli)).unwrap()
    }

    #[test]
    fn test_only_given_flags_override() {
        assert_eq!(overrides(&["imgshelf", "sweep"]), serde_json::json!({}));
        assert_eq!(
            overrides(&["imgshelf", "sweep", "--vault", "/notes", "--dry-run", "--on-error", "best-effort"]),
            serde_json::json!({"vault": "/notes", "on_error": "best-effort", "dry_run": true})
        );
    }

    #[test]
    fn test_run_startup_mode_overrides() {
        assert_eq!(overrides(&["imgshelf", "run", "--startup", "always"]), serde_json::json!({"startup": "always"}));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["imgshelf", "sweep", "--on-error", "sometimes"]).is_err());
    }
}
