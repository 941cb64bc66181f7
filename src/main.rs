//! ME3 Manager - startup driver for the profile and mod-state engine.
//!
//! Runs the startup reconciliation a frontend would run before showing
//! anything:
//! 1. Initialize logging → `<data dir>/logs/me3-manager.<date>`
//! 2. Build the [`ConfigContext`] at the standard ME3 location (or the
//!    directory given as the first argument)
//! 3. Guarantee `default` profiles and prune profiles whose files are gone
//! 4. Reconcile each game's active profile and log a mod summary
//!
//! Set `ME3_MANAGER_DEBUG=1` for debug-level logs.

use anyhow::Result;
use camino::Utf8PathBuf;
use me3_manager::logging::{LogOptions, setup_logging};
use me3_manager::{APP_NAME, ConfigContext, ModRegistry, ProfileManager, VERSION};

fn main() -> Result<()> {
    let config_root = match std::env::args().nth(1) {
        Some(root) => Utf8PathBuf::from(root),
        None => ConfigContext::default_config_root()?,
    };
    let log_dir = config_root
        .parent()
        .unwrap_or(&config_root)
        .join("logs");

    let debug_mode = std::env::var("ME3_MANAGER_DEBUG").is_ok_and(|v| v == "1");
    let _guard = setup_logging(&LogOptions {
        log_dir: &log_dir,
        log_prefix: APP_NAME,
        debug_mode,
        console_output: true,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let mut ctx = ConfigContext::new(&config_root)?;
    let profiles = ProfileManager::new();
    profiles.ensure_default_profiles(&mut ctx)?;

    for pruned in profiles.validate_and_prune_profiles(&mut ctx)? {
        tracing::warn!(
            "Profile {} of {} was removed (active: {})",
            pruned.id,
            pruned.game,
            pruned.was_active
        );
    }

    let registry = ModRegistry::new();
    for game in ctx.game_order() {
        let report = registry.reconcile(&mut ctx, &game)?;
        if !report.is_clean() {
            tracing::warn!(
                "{}: dropped {} missing entries and {} stale tracked paths",
                game,
                report.missing.len(),
                report.untracked.len()
            );
        }

        let mods = registry.get_all_mods(&ctx, &game)?;
        let enabled = mods.values().filter(|m| m.is_enabled()).count();
        let active = profiles.active_profile(&ctx, &game)?;
        tracing::info!(
            "{} [{}]: {} mods, {} enabled",
            game,
            active.name,
            mods.len(),
            enabled
        );
    }

    tracing::info!("Startup reconciliation complete");
    Ok(())
}
