//! Deciding whether the images already in the vault get swept on startup.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::host::Confirm;
use crate::organize::{Summary, sweep};
use exn::ResultExt;
use imgshelf_config::{Settings, SettingsStore, StartupMode};
use imgshelf_storage::BackendHandle;

/// What happened to the images already in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    /// A sweep ran.
    Swept(Summary),
    /// The user was asked and said no.
    Declined,
    /// The one-time question had already been asked on an earlier run.
    Skipped,
}

/// Runs the startup sweep according to `mode`.
///
/// With [`StartupMode::Gated`] the user is asked once per vault, ever. The
/// `has_organized_existing` flag is set and saved before the sweep starts,
/// whatever the answer, so a declined or interrupted sweep is not offered
/// again until the flag is cleared.
///
/// With [`StartupMode::Always`] the vault is swept without asking and the
/// settings are left alone.
///
/// # Errors
/// [`ErrorKind::Startup`] if the flag can't be saved, [`ErrorKind::Sweep`]
/// if the sweep itself fails.
pub async fn startup(
    backend: &BackendHandle,
    ctx: &Context,
    settings: &mut Settings,
    store: &dyn SettingsStore,
    mode: StartupMode,
    confirm: &dyn Confirm,
) -> Result<Startup> {
    if mode == StartupMode::Always {
        return sweep(backend, ctx).await.map(Startup::Swept);
    }
    if settings.has_organized_existing {
        tracing::debug!("Existing images were offered for organizing on an earlier run");
        return Ok(Startup::Skipped);
    }

    let prompt = format!("Organize existing images into the {} folder?", settings.folder_name);
    let accepted = confirm.confirm(&prompt).await;

    settings.has_organized_existing = true;
    settings.save(store).await.or_raise(|| ErrorKind::Startup)?;
    tracing::info!(store = store.describe(), accepted, "Recorded startup decision");

    match accepted {
        true => sweep(backend, ctx).await.map(Startup::Swept),
        false => Ok(Startup::Declined),
    }
}
