//! Mod status reconciliation.
//!
//! [`ModRegistry`] cross-references the active profile document with a scan of
//! the active mods directory and the tracked external mods, producing one
//! [`ModRecord`] per mod. Enabled means "has an entry in the profile": toggling
//! adds or removes that entry, so a disabled mod keeps no advanced options.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use thiserror::Error;

use crate::config::{CatalogError, ConfigContext};
use crate::models::{
    AdvancedOptions, Game, ModKind, ModRecord, ModStatus, NativeEntry, PackageEntry,
    ProfileDocument,
};
use crate::paths::{
    absolute_forward, canonical_key, is_within, native_config_path, resolve_profile_path,
    same_path, to_forward_slashes,
};
use crate::profile::{ProfileStore, ProfileWriter, SchemaMigrator};
use crate::services::profiles::{ProfileError, ProfileManager};

pub const REGULATION_FILE: &str = "regulation.bin";
pub const REGULATION_DISABLED_FILE: &str = "regulation.bin.disabled";

/// Content-category folders ME3 loads from a package.
pub const PACKAGE_CONTENT_FOLDERS: [&str; 21] = [
    "_backup", "_unknown", "action", "asset", "chr", "cutscene", "event", "font", "map",
    "material", "menu", "movie", "msg", "other", "param", "parts", "script", "sd", "sfx",
    "shader", "sound",
];

/// Errors raised while changing mod state.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("Invalid mod folder name: {0:?}")]
    InvalidModName(String),

    #[error("Not a DLL file: {0}")]
    NotADll(String),

    #[error("{0} is inside the active mods directory")]
    NotExternal(String),

    #[error("{0} is already tracked")]
    AlreadyTracked(String),

    #[error("{0} has no regulation file to activate")]
    NoRegulationFile(String),

    #[error("{0} is not enabled")]
    NotEnabled(String),

    #[error("External package folders cannot be removed: {0}")]
    ExternalFolder(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What [`ModRegistry::remove_mod`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Files were deleted from the mods directory
    Deleted,
    /// An external DLL was disabled and untracked; nothing was deleted
    Untracked,
}

/// Result of [`ModRegistry::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Profile entries whose target vanished, with status `Missing`
    pub missing: Vec<ModRecord>,
    /// Tracked external paths that were dropped
    pub untracked: Vec<String>,
    /// The profile file was rewritten
    pub profile_updated: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.untracked.is_empty()
    }
}

/// The game and profile an operation works on.
struct ActiveLayout {
    game: Game,
    profile_path: Utf8PathBuf,
    mods_dir: Utf8PathBuf,
    default_mods_dir: Utf8PathBuf,
    config_root: Utf8PathBuf,
}

impl ActiveLayout {
    /// Filesystem location of a path written in the active profile.
    fn resolve(&self, raw: &str) -> Utf8PathBuf {
        resolve_profile_path(raw, &self.profile_path, &self.config_root)
    }
}

/// Profile entries indexed for lookup by scanned paths.
struct EnabledSet<'a> {
    natives: HashMap<String, &'a NativeEntry>,
    packages: HashMap<String, &'a PackageEntry>,
}

impl<'a> EnabledSet<'a> {
    fn new(doc: &'a ProfileDocument, layout: &ActiveLayout) -> Self {
        let mut natives = HashMap::new();
        for native in &doc.natives {
            natives.insert(canonical_key(&native.path), native);
            let resolved = layout.resolve(&native.path);
            natives.insert(canonical_key(resolved.as_str()), native);
        }
        let packages = doc
            .packages
            .iter()
            .map(|package| (package.id.trim().to_ascii_lowercase(), package))
            .collect();
        Self { natives, packages }
    }

    fn native(&self, config_path: &str, fs_path: &str) -> Option<&'a NativeEntry> {
        self.natives
            .get(&canonical_key(config_path))
            .or_else(|| self.natives.get(&canonical_key(fs_path)))
            .copied()
    }

    fn package(&self, id: &str) -> Option<&'a PackageEntry> {
        self.packages.get(&id.trim().to_ascii_lowercase()).copied()
    }
}

/// Derives and mutates per-mod state for the active profile of each game.
pub struct ModRegistry {
    store: ProfileStore,
    profiles: ProfileManager,
}

impl Default for ModRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModRegistry {
    pub fn new() -> Self {
        Self {
            store: ProfileStore::new(),
            profiles: ProfileManager,
        }
    }

    /// Every mod visible to the active profile of `game`, keyed by forward-slash path.
    ///
    /// Order: DLLs in the mods directory, then package folders, then external
    /// mods. Tracked external paths missing on disk are skipped but stay tracked;
    /// see [`ModRegistry::reconcile`].
    pub fn get_all_mods(
        &self,
        ctx: &ConfigContext,
        game: &str,
    ) -> Result<IndexMap<String, ModRecord>, RegistryError> {
        let layout = self.layout(ctx, game)?;
        let doc = self.load_document(ctx, &layout);
        let enabled = EnabledSet::new(&doc, &layout);
        let mut records = IndexMap::new();

        if layout.mods_dir.is_dir() {
            for dll in list_dlls(&layout.mods_dir)? {
                let record = self.native_record(&layout, &enabled, &dll, false)?;
                records.insert(record.path.clone(), record);
            }

            for folder in list_dirs(&layout.mods_dir)? {
                let Some(name) = folder.file_name() else {
                    continue;
                };
                if name.eq_ignore_ascii_case(&layout.game.mods_dir) || !is_package_folder(&folder) {
                    continue;
                }
                let record = package_record(&enabled, &folder, false);
                records.insert(record.path.clone(), record);
            }
        } else {
            tracing::debug!("Mods directory {} does not exist", layout.mods_dir);
        }

        for path in self.external_candidates(ctx, &layout, &doc) {
            let fs_path = Utf8PathBuf::from(&path);
            if !fs_path.exists() {
                tracing::warn!("Skipping missing external mod {}", path);
                continue;
            }
            let record = if fs_path.is_dir() {
                package_record(&enabled, &fs_path, true)
            } else {
                self.native_record(&layout, &enabled, &fs_path, true)?
            };
            records.insert(record.path.clone(), record);
        }

        tracing::debug!(
            "{}: {} mods ({} enabled)",
            game,
            records.len(),
            records.values().filter(|r| r.is_enabled()).count()
        );
        Ok(records)
    }

    /// Enable or disable a DLL or package folder.
    ///
    /// Disabling removes the profile entry together with any advanced options
    /// on it; enabling again starts from a bare entry.
    pub fn set_mod_enabled(
        &self,
        ctx: &ConfigContext,
        game: &str,
        path: &Utf8Path,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        let layout = self.layout(ctx, game)?;
        let mut doc = self.load_document(ctx, &layout);

        let changed = if path.is_dir() {
            let id = folder_id(path)?;
            match (enabled, doc.package_index(&id)) {
                (true, None) => {
                    doc.packages
                        .push(PackageEntry::new(&id, absolute_forward(path)?));
                    true
                }
                (false, Some(_)) => doc.remove_package(&id) > 0,
                _ => false,
            }
        } else {
            if enabled && !path.is_file() {
                return Err(RegistryError::ModNotFound(path.to_string()));
            }
            let config_path =
                native_config_path(path, &layout.default_mods_dir, &layout.game.mods_dir)?;
            let present = find_native(&doc, &layout, &config_path, path);
            match (enabled, present) {
                (true, None) => {
                    doc.natives.push(NativeEntry::new(config_path));
                    true
                }
                (false, Some(_)) => remove_natives(&mut doc, &layout, &config_path, path) > 0,
                _ => false,
            }
        };

        if changed {
            self.save_document(ctx, &layout, &doc)?;
            tracing::info!(
                "{} {} for {}",
                if enabled { "Enabled" } else { "Disabled" },
                path,
                game
            );
        }
        Ok(())
    }

    /// Make `mod_name`'s regulation file the active one for the mods directory.
    ///
    /// Every other package holding a live `regulation.bin` has it renamed to
    /// `regulation.bin.disabled` first. If the target has no regulation file the
    /// call fails before anything is renamed.
    pub fn set_regulation_active(
        &self,
        ctx: &ConfigContext,
        game: &str,
        mod_name: &str,
    ) -> Result<(), RegistryError> {
        if !is_single_component(mod_name) {
            return Err(RegistryError::InvalidModName(mod_name.to_string()));
        }
        let layout = self.layout(ctx, game)?;
        let target = layout.mods_dir.join(mod_name);
        if !target.is_dir() {
            return Err(RegistryError::ModNotFound(target.to_string()));
        }

        let target_active = target.join(REGULATION_FILE);
        let target_disabled = target.join(REGULATION_DISABLED_FILE);
        if !target_active.is_file() && !target_disabled.is_file() {
            return Err(RegistryError::NoRegulationFile(mod_name.to_string()));
        }

        for folder in list_dirs(&layout.mods_dir)? {
            if same_path(folder.as_str(), target.as_str()) {
                continue;
            }
            let live = folder.join(REGULATION_FILE);
            if live.is_file() {
                let disabled = folder.join(REGULATION_DISABLED_FILE);
                fs::rename(&live, &disabled)
                    .with_context(|| format!("Failed to disable regulation file: {}", live))?;
                tracing::info!("Disabled regulation file in {}", folder);
            }
        }

        if !target_active.is_file() {
            fs::rename(&target_disabled, &target_active).with_context(|| {
                format!("Failed to activate regulation file: {}", target_disabled)
            })?;
        }

        tracing::info!("Regulation file of {} is now active for {}", mod_name, game);
        Ok(())
    }

    /// Replace the advanced options of an enabled mod.
    ///
    /// Packages only take `load_before`/`load_after`.
    pub fn set_advanced_options(
        &self,
        ctx: &ConfigContext,
        game: &str,
        path: &Utf8Path,
        options: &AdvancedOptions,
    ) -> Result<(), RegistryError> {
        let layout = self.layout(ctx, game)?;
        let mut doc = self.load_document(ctx, &layout);

        if path.is_dir() {
            let id = folder_id(path)?;
            let index = doc
                .package_index(&id)
                .ok_or_else(|| RegistryError::NotEnabled(path.to_string()))?;
            doc.packages[index].apply_advanced(options);
        } else {
            let config_path =
                native_config_path(path, &layout.default_mods_dir, &layout.game.mods_dir)?;
            let index = find_native(&doc, &layout, &config_path, path)
                .ok_or_else(|| RegistryError::NotEnabled(path.to_string()))?;
            doc.natives[index].apply_advanced(options);
        }

        self.save_document(ctx, &layout, &doc)?;
        tracing::info!("Updated advanced options of {} for {}", path, game);
        Ok(())
    }

    /// Track and enable a DLL that lives outside the mods directory.
    pub fn add_external_mod(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
        path: &Utf8Path,
    ) -> Result<(), RegistryError> {
        if !path.exists() {
            return Err(RegistryError::ModNotFound(path.to_string()));
        }
        let is_dll = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"));
        if !is_dll {
            return Err(RegistryError::NotADll(path.to_string()));
        }

        let layout = self.layout(ctx, game)?;
        if in_directory(path, &layout.mods_dir) {
            return Err(RegistryError::NotExternal(path.to_string()));
        }

        let stored = absolute_forward(path)?;
        let profile_id = ctx.active_profile_id(game).to_string();
        if ctx
            .tracked_external_mods(game, &profile_id)
            .iter()
            .any(|tracked| same_path(tracked, &stored))
        {
            return Err(RegistryError::AlreadyTracked(stored));
        }

        let stored_path = Utf8PathBuf::from(&stored);
        ctx.track_external_mod(game, &stored_path)?;
        if let Err(e) = self.set_mod_enabled(ctx, game, &stored_path, true) {
            tracing::warn!("Enabling {} failed, untracking it: {}", stored, e);
            ctx.untrack_external_mod(game, &stored_path)?;
            return Err(e);
        }

        tracing::info!("Added external mod {} for {}", stored, game);
        Ok(())
    }

    /// Disable a mod, then delete it from the mods directory or untrack it.
    ///
    /// Deleting a DLL also deletes its `<stem>/` config folder next to it.
    pub fn remove_mod(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
        path: &Utf8Path,
    ) -> Result<RemoveOutcome, RegistryError> {
        let layout = self.layout(ctx, game)?;
        let in_mods_dir = in_directory(path, &layout.mods_dir);

        if path.is_dir() {
            if !in_mods_dir {
                return Err(RegistryError::ExternalFolder(path.to_string()));
            }
            self.set_mod_enabled(ctx, game, path, false)?;
            fs::remove_dir_all(path)
                .with_context(|| format!("Failed to delete package folder: {}", path))?;
            tracing::info!("Deleted package {}", path);
            return Ok(RemoveOutcome::Deleted);
        }

        self.set_mod_enabled(ctx, game, path, false)?;

        if in_mods_dir {
            if !path.is_file() {
                return Err(RegistryError::ModNotFound(path.to_string()));
            }
            fs::remove_file(path).with_context(|| format!("Failed to delete DLL: {}", path))?;

            if let (Some(parent), Some(stem)) = (path.parent(), path.file_stem()) {
                let config_dir = parent.join(stem);
                if config_dir.is_dir() {
                    fs::remove_dir_all(&config_dir).with_context(|| {
                        format!("Failed to delete config folder: {}", config_dir)
                    })?;
                }
            }
            tracing::info!("Deleted DLL {}", path);
            Ok(RemoveOutcome::Deleted)
        } else {
            if !ctx.untrack_external_mod(game, path)? {
                tracing::debug!("{} was not tracked", path);
            }
            tracing::info!("Removed external mod {} from {}", path, game);
            Ok(RemoveOutcome::Untracked)
        }
    }

    /// Drop everything the active profile references that is gone from disk.
    ///
    /// Tracked external paths that no longer exist are untracked. Natives and
    /// packages whose targets vanished are removed from the profile (the game's
    /// implicit default package is kept), and the profile is written only if
    /// something changed.
    pub fn reconcile(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
    ) -> Result<ReconcileReport, RegistryError> {
        let layout = self.layout(ctx, game)?;
        let mut report = ReconcileReport::default();

        let profile_id = ctx.active_profile_id(game).to_string();
        let gone: Vec<String> = ctx
            .tracked_external_mods(game, &profile_id)
            .iter()
            .filter(|tracked| !Utf8Path::new(tracked.as_str()).exists())
            .cloned()
            .collect();
        for tracked in gone {
            ctx.untrack_external_mod(game, Utf8Path::new(&tracked))?;
            tracing::info!("Untracked missing external mod {}", tracked);
            report.untracked.push(tracked);
        }

        let mut doc = self.load_document(ctx, &layout);

        doc.natives.retain(|native| {
            let target = layout.resolve(&native.path);
            if target.exists() {
                return true;
            }
            let mut record = ModRecord::new(
                to_forward_slashes(target.as_str()),
                target.file_stem().unwrap_or(native.path.as_str()),
                ModKind::Native,
            );
            record.status = ModStatus::Missing;
            record.external = !in_directory(&target, &layout.mods_dir);
            record.advanced = native.advanced();
            report.missing.push(record);
            false
        });

        doc.packages.retain(|package| {
            if package.id.trim().eq_ignore_ascii_case(&layout.game.mods_dir) {
                return true;
            }
            let target = match package.source.as_deref() {
                Some(source) if !source.trim().is_empty() => layout.resolve(source),
                _ => layout.mods_dir.join(&package.id),
            };
            if target.exists() {
                return true;
            }
            let mut record = ModRecord::new(
                to_forward_slashes(target.as_str()),
                package.id.clone(),
                ModKind::Package,
            );
            record.status = ModStatus::Missing;
            record.external = !in_directory(&target, &layout.mods_dir);
            record.advanced = package.advanced();
            report.missing.push(record);
            false
        });

        if !report.missing.is_empty() {
            self.save_document(ctx, &layout, &doc)?;
            report.profile_updated = true;
        }

        if !report.is_clean() {
            tracing::info!(
                "Reconciled {}: {} missing entries removed, {} paths untracked",
                game,
                report.missing.len(),
                report.untracked.len()
            );
        }
        Ok(report)
    }

    /// Entry point for an external filesystem watcher.
    ///
    /// Re-reads every game whose watch targets include one of `changed_paths`.
    pub fn notify(
        &self,
        ctx: &ConfigContext,
        changed_paths: &[Utf8PathBuf],
    ) -> Result<IndexMap<String, IndexMap<String, ModRecord>>, RegistryError> {
        let mut refreshed = IndexMap::new();
        for game in ctx.games().keys() {
            let targets = self.profiles.watch_targets(ctx, game)?;
            if changed_paths.iter().any(|path| targets.contains(path)) {
                refreshed.insert(game.clone(), self.get_all_mods(ctx, game)?);
            }
        }
        Ok(refreshed)
    }

    fn layout(&self, ctx: &ConfigContext, game: &str) -> Result<ActiveLayout, RegistryError> {
        let game_info = ctx.game(game)?.clone();
        let profile = self.profiles.active_profile(ctx, game)?;
        Ok(ActiveLayout {
            default_mods_dir: game_info.default_mods_dir(ctx.config_root()),
            game: game_info,
            profile_path: profile.profile_path,
            mods_dir: profile.mods_path,
            config_root: ctx.config_root().to_path_buf(),
        })
    }

    /// Migrate the profile if it still uses the legacy layout, then parse it.
    fn load_document(&self, ctx: &ConfigContext, layout: &ActiveLayout) -> ProfileDocument {
        let writer = ProfileWriter::for_context(ctx);
        let migrator = SchemaMigrator::new(&self.store, &writer);
        if let Err(e) = migrator.migrate_if_needed(&layout.profile_path, &layout.game) {
            tracing::warn!("Migration of {} failed: {:#}", layout.profile_path, e);
        }
        self.store.parse(&layout.profile_path)
    }

    fn save_document(
        &self,
        ctx: &ConfigContext,
        layout: &ActiveLayout,
        doc: &ProfileDocument,
    ) -> anyhow::Result<()> {
        ProfileWriter::for_context(ctx).write(&layout.profile_path, doc)
    }

    fn native_record(
        &self,
        layout: &ActiveLayout,
        enabled: &EnabledSet<'_>,
        dll: &Utf8Path,
        external: bool,
    ) -> Result<ModRecord, RegistryError> {
        let config_path = native_config_path(dll, &layout.default_mods_dir, &layout.game.mods_dir)?;
        let fs_path = to_forward_slashes(dll.as_str());
        let name = dll.file_stem().unwrap_or(dll.as_str());

        let mut record = ModRecord::new(fs_path.clone(), name, ModKind::Native);
        record.external = external;
        if let Some(entry) = enabled.native(&config_path, &fs_path) {
            record.status = ModStatus::Enabled;
            record.advanced = entry.advanced();
        }
        Ok(record)
    }

    /// Tracked paths plus profile natives outside both the config root and the
    /// active mods directory, deduplicated by canonical key.
    fn external_candidates(
        &self,
        ctx: &ConfigContext,
        layout: &ActiveLayout,
        doc: &ProfileDocument,
    ) -> Vec<String> {
        let profile_id = ctx.active_profile_id(&layout.game.name);
        let from_profile = doc.natives.iter().filter_map(|native| {
            let resolved = layout.resolve(&native.path);
            let outside = !is_within(resolved.as_str(), ctx.config_root().as_str())
                && !in_directory(&resolved, &layout.mods_dir);
            outside.then(|| to_forward_slashes(resolved.as_str()))
        });
        let tracked = ctx
            .tracked_external_mods(&layout.game.name, profile_id)
            .iter()
            .map(|path| to_forward_slashes(path))
            .filter(|path| !in_directory(Utf8Path::new(path), &layout.mods_dir));

        let mut seen = Vec::new();
        let mut candidates = Vec::new();
        for path in from_profile.chain(tracked) {
            let key = canonical_key(&path);
            if !seen.contains(&key) {
                seen.push(key);
                candidates.push(path);
            }
        }
        candidates
    }
}

fn package_record(enabled: &EnabledSet<'_>, folder: &Utf8Path, external: bool) -> ModRecord {
    let name = folder.file_name().unwrap_or(folder.as_str());
    let mut record = ModRecord::new(to_forward_slashes(folder.as_str()), name, ModKind::Package);
    record.external = external;
    record.has_regulation =
        folder.join(REGULATION_FILE).is_file() || folder.join(REGULATION_DISABLED_FILE).is_file();
    record.regulation_active = folder.join(REGULATION_FILE).is_file();
    if let Some(entry) = enabled.package(name) {
        record.status = ModStatus::Enabled;
        record.advanced = entry.advanced();
    }
    record
}

/// A folder qualifies as a package if it is a content folder itself, holds one,
/// or carries a regulation file.
pub fn is_package_folder(folder: &Utf8Path) -> bool {
    if folder.file_name().is_some_and(is_content_folder) {
        return true;
    }
    if folder.join(REGULATION_FILE).is_file() || folder.join(REGULATION_DISABLED_FILE).is_file() {
        return true;
    }
    match folder.read_dir_utf8() {
        Ok(entries) => entries.flatten().any(|entry| {
            entry.file_type().is_ok_and(|t| t.is_dir()) && is_content_folder(entry.file_name())
        }),
        Err(_) => false,
    }
}

fn is_content_folder(name: &str) -> bool {
    PACKAGE_CONTENT_FOLDERS
        .iter()
        .any(|folder| folder.eq_ignore_ascii_case(name))
}

/// `path` sits directly inside `dir`.
fn in_directory(path: &Utf8Path, dir: &Utf8Path) -> bool {
    path.parent()
        .is_some_and(|parent| same_path(parent.as_str(), dir.as_str()))
}

/// A bare folder name: no separators, not `.` or `..`.
fn is_single_component(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', ':'])
}

fn folder_id(path: &Utf8Path) -> Result<String, RegistryError> {
    path.file_name()
        .map(str::to_string)
        .ok_or_else(|| RegistryError::ModNotFound(path.to_string()))
}

fn find_native(
    doc: &ProfileDocument,
    layout: &ActiveLayout,
    config_path: &str,
    fs_path: &Utf8Path,
) -> Option<usize> {
    doc.native_index(config_path).or_else(|| {
        doc.natives
            .iter()
            .position(|native| same_path(layout.resolve(&native.path).as_str(), fs_path.as_str()))
    })
}

/// Remove every native written as `config_path` or resolving to `fs_path`.
fn remove_natives(
    doc: &mut ProfileDocument,
    layout: &ActiveLayout,
    config_path: &str,
    fs_path: &Utf8Path,
) -> usize {
    let removed = doc.remove_native(config_path);
    let before = doc.natives.len();
    doc.natives
        .retain(|native| !same_path(layout.resolve(&native.path).as_str(), fs_path.as_str()));
    removed + before - doc.natives.len()
}

fn list_dlls(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, RegistryError> {
    let mut dlls: Vec<Utf8PathBuf> = dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to read mods directory: {}", dir))?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
        })
        .collect();
    dlls.sort();
    Ok(dlls)
}

fn list_dirs(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, RegistryError> {
    let mut dirs: Vec<Utf8PathBuf> = dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to read mods directory: {}", dir))?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| entry.path().to_path_buf())
        .collect();
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_package_folder() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();

        let direct = root.join("param");
        fs::create_dir_all(&direct).unwrap();
        assert!(is_package_folder(&direct));

        let nested = root.join("CoolMod");
        fs::create_dir_all(nested.join("Chr")).unwrap();
        assert!(is_package_folder(&nested));

        let regulation = root.join("Rebalance");
        fs::create_dir_all(&regulation).unwrap();
        fs::write(regulation.join(REGULATION_DISABLED_FILE), b"").unwrap();
        assert!(is_package_folder(&regulation));

        let config_only = root.join("Foo");
        fs::create_dir_all(config_only.join("settings")).unwrap();
        assert!(!is_package_folder(&config_only));
    }

    #[test]
    fn test_in_directory() {
        let dir = Utf8Path::new("/cfg/profiles/eldenring-mods");
        assert!(in_directory(Utf8Path::new("/cfg/profiles/eldenring-mods/a.dll"), dir));
        assert!(!in_directory(
            Utf8Path::new("/cfg/profiles/eldenring-mods/sub/a.dll"),
            dir
        ));
    }

    fn layout_at(profile_path: &str) -> ActiveLayout {
        let root = Utf8PathBuf::from("/cfg/profiles");
        ActiveLayout {
            game: crate::models::default_games()["Elden Ring"].clone(),
            profile_path: Utf8PathBuf::from(profile_path),
            mods_dir: root.join("eldenring-mods"),
            default_mods_dir: root.join("eldenring-mods"),
            config_root: root,
        }
    }

    #[test]
    fn test_is_single_component() {
        assert!(is_single_component("Rebalance"));
        assert!(is_single_component("My Mod v1.2"));
        assert!(!is_single_component(""));
        assert!(!is_single_component(".."));
        assert!(!is_single_component("../outside"));
        assert!(!is_single_component("nested/folder"));
        assert!(!is_single_component("nested\\folder"));
        assert!(!is_single_component("C:"));
    }

    #[test]
    fn test_remove_natives_matches_any_form() {
        let layout = layout_at("/cfg/profiles/eldenring-default.me3");
        let mut doc = ProfileDocument::default();
        doc.natives.push(NativeEntry::new("eldenring-mods\\Foo.dll"));
        doc.natives.push(NativeEntry::new("/cfg/profiles/eldenring-mods/foo.dll"));
        doc.natives.push(NativeEntry::new("eldenring-mods\\Bar.dll"));

        let removed = remove_natives(
            &mut doc,
            &layout,
            "eldenring-mods\\Foo.dll",
            Utf8Path::new("/cfg/profiles/eldenring-mods/Foo.dll"),
        );
        assert_eq!(removed, 2);
        assert_eq!(doc.natives, vec![NativeEntry::new("eldenring-mods\\Bar.dll")]);
    }

    #[test]
    fn test_lookups_in_root_subdirectory_profile_resolve_against_root() {
        let layout = layout_at("/cfg/profiles/eldenring-mods/alt.me3");
        let mut doc = ProfileDocument::default();
        doc.natives.push(NativeEntry::new("pvp-mods/Foo.dll"));

        let dll = Utf8Path::new("/cfg/profiles/pvp-mods/Foo.dll");
        assert_eq!(find_native(&doc, &layout, dll.as_str(), dll), Some(0));

        let enabled = EnabledSet::new(&doc, &layout);
        assert!(enabled.native(dll.as_str(), dll.as_str()).is_some());

        assert_eq!(remove_natives(&mut doc, &layout, dll.as_str(), dll), 1);
        assert!(doc.natives.is_empty());
    }
}
