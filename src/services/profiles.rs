//! Profile lifecycle: the named profiles of each game and the active pointer.
//!
//! Every game always has a `default` profile living directly under the config
//! root. Other profiles keep their `.me3` file inside their own mods directory.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

use crate::config::{CatalogError, ConfigContext};
use crate::models::{DEFAULT_PROFILE_ID, Profile, ProfileDocument};
use crate::paths::{is_within, same_path};
use crate::profile::ProfileWriter;

/// Errors raised by profile lifecycle operations.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile '{id}' not found for {game}")]
    NotFound { game: String, id: String },

    #[error("Profile name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Paths an external filesystem watcher should observe for a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTargets {
    pub mods_dir: Utf8PathBuf,
    pub profile_file: Utf8PathBuf,
}

impl WatchTargets {
    /// True if a change at `path` affects these targets.
    pub fn contains(&self, path: &Utf8Path) -> bool {
        same_path(path.as_str(), self.profile_file.as_str())
            || is_within(path.as_str(), self.mods_dir.as_str())
    }
}

/// A profile dropped by [`ProfileManager::validate_and_prune_profiles`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedProfile {
    pub game: String,
    pub id: String,
    pub was_active: bool,
}

/// Stateless service over the profile tables in [`ConfigContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileManager;

impl ProfileManager {
    pub fn new() -> Self {
        Self
    }

    /// Make sure every game has a `default` profile and an active pointer that
    /// resolves. Returns true if settings had to be changed.
    pub fn ensure_default_profiles(&self, ctx: &mut ConfigContext) -> Result<bool, ProfileError> {
        let root = ctx.config_root().to_path_buf();
        let games: Vec<_> = ctx.games().values().cloned().collect();
        let mut changed = false;

        for game in &games {
            let expected = Profile::default_for(game, &root);
            let profiles = ctx.settings.profiles.entry(game.name.clone()).or_default();

            match profiles.iter_mut().find(|p| p.is_default()) {
                Some(existing) => {
                    // The config root can move between installs
                    if existing.profile_path != expected.profile_path
                        || existing.mods_path != expected.mods_path
                    {
                        existing.profile_path = expected.profile_path;
                        existing.mods_path = expected.mods_path;
                        changed = true;
                    }
                }
                None => {
                    profiles.insert(0, expected);
                    changed = true;
                }
            }

            let active = ctx.active_profile_id(&game.name).to_string();
            let resolves = ctx
                .settings
                .profiles
                .get(&game.name)
                .is_some_and(|profiles| profiles.iter().any(|p| p.id == active));
            if !resolves || !ctx.settings.active_profiles.contains_key(&game.name) {
                if !resolves {
                    tracing::warn!(
                        "Active profile '{}' for {} no longer exists, using default",
                        active,
                        game.name
                    );
                }
                ctx.settings
                    .active_profiles
                    .insert(game.name.clone(), DEFAULT_PROFILE_ID.to_string());
                changed = true;
            }
        }

        if changed {
            ctx.save_settings()?;
        }
        Ok(changed)
    }

    /// All profiles of `game`, `default` first.
    pub fn profiles(&self, ctx: &ConfigContext, game: &str) -> Result<Vec<Profile>, ProfileError> {
        let game_info = ctx.game(game)?;
        let mut profiles = ctx.settings.profiles.get(game).cloned().unwrap_or_default();

        match profiles.iter().position(Profile::is_default) {
            Some(0) => {}
            Some(index) => {
                let default = profiles.remove(index);
                profiles.insert(0, default);
            }
            None => profiles.insert(0, Profile::default_for(game_info, ctx.config_root())),
        }
        Ok(profiles)
    }

    /// The active profile of `game`, falling back to `default`.
    pub fn active_profile(&self, ctx: &ConfigContext, game: &str) -> Result<Profile, ProfileError> {
        let active = ctx.active_profile_id(game);
        let mut profiles = self.profiles(ctx, game)?;

        match profiles.iter().position(|p| p.id == active) {
            Some(index) => Ok(profiles.swap_remove(index)),
            None => Ok(profiles.swap_remove(0)),
        }
    }

    /// Create a profile whose `.me3` file lives inside `mods_path`.
    ///
    /// # Arguments
    /// * `name` - Display name; the id is a unique slug of it
    /// * `mods_path` - Mods directory of the new profile, created if missing
    /// * `make_active` - Switch the game to the new profile
    ///
    /// # Returns
    /// The id of the new profile
    pub fn add_profile(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
        name: &str,
        mods_path: &Utf8Path,
        make_active: bool,
    ) -> Result<String, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        let game_info = ctx.game(game)?.clone();
        let existing = self.profiles(ctx, game)?;

        let slug = slugify(name);
        let id = unique_id(&slug, |candidate| existing.iter().any(|p| p.id == candidate));

        fs::create_dir_all(mods_path)
            .with_context(|| format!("Failed to create mods directory: {}", mods_path))?;

        let profile_path = unique_file(mods_path, &slug);
        ProfileWriter::for_context(ctx).write(&profile_path, &ProfileDocument::for_game(&game_info))?;

        ctx.settings
            .profiles
            .entry(game.to_string())
            .or_insert(existing)
            .push(Profile {
                id: id.clone(),
                name: name.to_string(),
                profile_path,
                mods_path: mods_path.to_path_buf(),
            });
        if make_active {
            ctx.settings
                .active_profiles
                .insert(game.to_string(), id.clone());
        }
        ctx.save_settings()?;

        tracing::info!("Added profile '{}' ({}) for {}", name, id, game);
        Ok(id)
    }

    /// Change a profile's display name. The id never changes.
    pub fn rename_profile(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
        id: &str,
        new_name: &str,
    ) -> Result<(), ProfileError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(ProfileError::EmptyName);
        }

        let mut profiles = self.profiles(ctx, game)?;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(game, id))?;
        profile.name = new_name.to_string();

        ctx.settings.profiles.insert(game.to_string(), profiles);
        ctx.save_settings()?;

        tracing::info!("Renamed profile {} of {} to '{}'", id, game, new_name);
        Ok(())
    }

    /// Switch the active profile and return what the watcher should observe now.
    pub fn set_active_profile(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
        id: &str,
    ) -> Result<WatchTargets, ProfileError> {
        let profile = self
            .profiles(ctx, game)?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(game, id))?;

        ctx.settings
            .active_profiles
            .insert(game.to_string(), id.to_string());
        ctx.save_settings()?;

        tracing::info!("Active profile for {} is now {}", game, id);
        Ok(WatchTargets {
            mods_dir: profile.mods_path,
            profile_file: profile.profile_path,
        })
    }

    /// Delete a profile's registration and its tracked-mod bucket.
    ///
    /// Returns `Ok(false)` without touching anything for `default`. Files on
    /// disk are left in place.
    pub fn delete_profile(
        &self,
        ctx: &mut ConfigContext,
        game: &str,
        id: &str,
    ) -> Result<bool, ProfileError> {
        if id == DEFAULT_PROFILE_ID {
            tracing::warn!("Refusing to delete the default profile of {}", game);
            return Ok(false);
        }

        let mut profiles = self.profiles(ctx, game)?;
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        if profiles.len() == before {
            return Err(not_found(game, id));
        }

        ctx.settings.profiles.insert(game.to_string(), profiles);
        drop_tracked_bucket(ctx, game, id);
        if ctx.active_profile_id(game) == id {
            ctx.settings
                .active_profiles
                .insert(game.to_string(), DEFAULT_PROFILE_ID.to_string());
        }
        ctx.save_settings()?;

        tracing::info!("Deleted profile {} of {}", id, game);
        Ok(true)
    }

    /// Drop every non-default profile whose mods directory or profile file is gone.
    ///
    /// Active pointers of pruned profiles fall back to `default`. Idempotent.
    pub fn validate_and_prune_profiles(
        &self,
        ctx: &mut ConfigContext,
    ) -> Result<Vec<PrunedProfile>, ProfileError> {
        let mut pruned = Vec::new();
        let games: Vec<String> = ctx.settings.profiles.keys().cloned().collect();

        for game in games {
            let active = ctx.active_profile_id(&game).to_string();
            let Some(profiles) = ctx.settings.profiles.get_mut(&game) else {
                continue;
            };

            let mut dropped = Vec::new();
            profiles.retain(|profile| {
                let keep = profile.is_default() || profile.is_backed_on_disk();
                if !keep {
                    dropped.push(profile.id.clone());
                }
                keep
            });

            for id in dropped {
                tracing::info!("Pruned profile {} of {}: backing files are gone", id, game);
                drop_tracked_bucket(ctx, &game, &id);
                let was_active = id == active;
                if was_active {
                    ctx.settings
                        .active_profiles
                        .insert(game.clone(), DEFAULT_PROFILE_ID.to_string());
                }
                pruned.push(PrunedProfile {
                    game: game.clone(),
                    id,
                    was_active,
                });
            }
        }

        if !pruned.is_empty() {
            ctx.save_settings()?;
        }
        Ok(pruned)
    }

    /// Paths to watch for the active profile of `game`.
    pub fn watch_targets(&self, ctx: &ConfigContext, game: &str) -> Result<WatchTargets, ProfileError> {
        let profile = self.active_profile(ctx, game)?;
        Ok(WatchTargets {
            mods_dir: profile.mods_path,
            profile_file: profile.profile_path,
        })
    }

    /// Raw text of the active profile file, for an editor.
    pub fn profile_content(&self, ctx: &ConfigContext, game: &str) -> Result<String, ProfileError> {
        let profile = self.active_profile(ctx, game)?;
        let content = fs::read_to_string(&profile.profile_path)
            .with_context(|| format!("Failed to read profile: {}", profile.profile_path))?;
        Ok(content)
    }

    /// Replace the active profile file with `content` verbatim.
    pub fn save_profile_content(
        &self,
        ctx: &ConfigContext,
        game: &str,
        content: &str,
    ) -> Result<(), ProfileError> {
        let profile = self.active_profile(ctx, game)?;
        fs::write(&profile.profile_path, content)
            .with_context(|| format!("Failed to write profile: {}", profile.profile_path))?;

        tracing::info!("Saved edited profile {}", profile.profile_path);
        Ok(())
    }
}

fn not_found(game: &str, id: &str) -> ProfileError {
    ProfileError::NotFound {
        game: game.to_string(),
        id: id.to_string(),
    }
}

fn drop_tracked_bucket(ctx: &mut ConfigContext, game: &str, id: &str) {
    if let Some(buckets) = ctx.settings.tracked_external_mods.get_mut(game) {
        buckets.shift_remove(id);
    }
}

/// Lowercase ASCII slug: runs of anything but `[a-z0-9]` become one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "profile".to_string()
    } else {
        slug.to_string()
    }
}

/// `base`, `base-2`, `base-3`, ... skipping `default` and anything `taken`.
fn unique_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while candidate == DEFAULT_PROFILE_ID || taken(&candidate) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    candidate
}

/// `<dir>/<slug>.me3`, or `<dir>/<slug>-N.me3` if that file already exists.
fn unique_file(dir: &Utf8Path, slug: &str) -> Utf8PathBuf {
    let mut path = dir.join(format!("{}.me3", slug));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{}-{}.me3", slug, n));
        n += 1;
    }
    path
}
