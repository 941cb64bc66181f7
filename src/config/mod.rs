use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;
use thiserror::Error;

use crate::models::{DEFAULT_PROFILE_ID, Game, ProfileDocument, Settings, default_games};
use crate::paths::{canonical_key, to_forward_slashes};
use crate::profile::ProfileWriter;

/// File name of the settings document, stored next to the config root.
pub const SETTINGS_FILE: &str = "manager_settings.json";

/// Errors raised while editing the game catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unknown game: {0}")]
    UnknownGame(String),

    #[error("Game field '{0}' must not be empty")]
    MissingField(&'static str),

    #[error("A game named '{0}' already exists")]
    DuplicateName(String),

    #[error("Mods directory '{0}' is already used by another game")]
    DuplicateModsDir(String),

    #[error("Profile file '{0}' is already used by another game")]
    DuplicateProfile(String),

    #[error("CLI id '{0}' is already used by another game")]
    DuplicateCliId(String),

    #[error("Profile file name must end in .me3: {0}")]
    InvalidProfileName(String),

    #[error("'{0}' is not a built-in game")]
    NotBuiltIn(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Explicit configuration context handed to every service.
///
/// Owns:
/// - the config root (`.../me3/config/profiles`) holding default profiles and mods dirs
/// - the settings document (`manager_settings.json` in the root's parent)
/// - the game catalog: built-in games minus removed ones, plus user-added games
///
/// Services borrow it (`&ConfigContext` for reads, `&mut ConfigContext` for
/// anything that persists settings); nothing is cached globally.
#[derive(Debug, Clone)]
pub struct ConfigContext {
    config_root: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    games: IndexMap<String, Game>,
    pub settings: Settings,
}

impl ConfigContext {
    /// Create a context rooted at `config_root`.
    ///
    /// Creates the root, loads settings (tolerating a missing or corrupt file),
    /// builds the game catalog and makes sure every game has its default mods
    /// directory and profile file.
    ///
    /// # Arguments
    /// * `config_root` - Directory holding default profiles and mods directories
    pub fn new<P: AsRef<Utf8Path>>(config_root: P) -> Result<Self> {
        let config_root = config_root.as_ref().to_path_buf();
        let settings_path = config_root
            .parent()
            .unwrap_or(&config_root)
            .join(SETTINGS_FILE);
        Self::with_settings_path(config_root, settings_path)
    }

    /// Like [`ConfigContext::new`] with an explicit settings file location.
    pub fn with_settings_path(config_root: Utf8PathBuf, settings_path: Utf8PathBuf) -> Result<Self> {
        if !config_root.exists() {
            fs::create_dir_all(&config_root)
                .with_context(|| format!("Failed to create config root: {}", config_root))?;
        }

        let settings = Self::load_settings(&settings_path);

        let mut games: IndexMap<String, Game> = default_games()
            .into_iter()
            .filter(|(name, _)| !settings.removed_default_games.contains(name))
            .collect();
        for (name, game) in &settings.games {
            games.entry(name.clone()).or_insert_with(|| game.clone());
        }

        let context = Self {
            config_root,
            settings_path,
            games,
            settings,
        };
        context.ensure_directories()?;

        tracing::info!(
            "Config context ready: root={}, games={}",
            context.config_root,
            context.games.len()
        );
        Ok(context)
    }

    /// Context at the standard ME3 location under the local data directory.
    pub fn from_default_location() -> Result<Self> {
        Self::new(Self::default_config_root()?)
    }

    /// `<local data dir>/garyttierney/me3/config/profiles`
    pub fn default_config_root() -> Result<Utf8PathBuf> {
        let data_dir = dirs::data_local_dir().context("No local data directory on this system")?;
        let data_dir = Utf8PathBuf::try_from(data_dir).context("Local data directory is not UTF-8")?;
        Ok(data_dir
            .join("garyttierney")
            .join("me3")
            .join("config")
            .join("profiles"))
    }

    /// Load the settings document. Missing or unreadable files give defaults.
    pub fn load_settings(path: &Utf8Path) -> Settings {
        if !path.exists() {
            tracing::debug!("Settings file not found at {}, using defaults", path);
            return Settings::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to read settings {}: {}, using defaults", path, e);
                return Settings::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("Settings file {} is corrupt: {}, using defaults", path, e);
                Settings::default()
            }
        }
    }

    /// Persist the in-memory settings document.
    pub fn save_settings(&self) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self.settings)
            .context("Failed to serialize settings to JSON")?;

        fs::write(&self.settings_path, json)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn config_root(&self) -> &Utf8Path {
        &self.config_root
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// The game catalog keyed by display name.
    pub fn games(&self) -> &IndexMap<String, Game> {
        &self.games
    }

    pub fn game(&self, name: &str) -> Result<&Game, CatalogError> {
        self.games
            .get(name)
            .ok_or_else(|| CatalogError::UnknownGame(name.to_string()))
    }

    /// Create the config root, default mods directories and default profiles.
    ///
    /// Existing profile files are never touched.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.config_root)
            .with_context(|| format!("Failed to create config root: {}", self.config_root))?;

        let writer = ProfileWriter::for_context(self);
        for game in self.games.values() {
            let mods_dir = game.default_mods_dir(&self.config_root);
            fs::create_dir_all(&mods_dir)
                .with_context(|| format!("Failed to create mods directory: {}", mods_dir))?;

            let profile_path = game.default_profile_path(&self.config_root);
            if !profile_path.exists() {
                writer.write(&profile_path, &ProfileDocument::for_game(game))?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Game catalog
    // -----------------------------------------------------------------------

    /// Add a user-defined game to the catalog.
    ///
    /// Every field is required; name, mods directory, profile file and CLI id
    /// must not collide with an existing game, and the profile must be a `.me3`
    /// file.
    pub fn add_game(&mut self, game: Game) -> Result<(), CatalogError> {
        let game = Game::new(
            game.name.trim(),
            game.cli_id.trim(),
            game.executable.trim(),
            game.mods_dir.trim(),
            game.profile.trim(),
        );

        for (field, value) in [
            ("name", &game.name),
            ("cli_id", &game.cli_id),
            ("executable", &game.executable),
            ("mods_dir", &game.mods_dir),
            ("profile", &game.profile),
        ] {
            if value.is_empty() {
                return Err(CatalogError::MissingField(field));
            }
        }

        if !game.profile.to_ascii_lowercase().ends_with(".me3") {
            return Err(CatalogError::InvalidProfileName(game.profile));
        }

        for existing in self.games.values() {
            if existing.name.eq_ignore_ascii_case(&game.name) {
                return Err(CatalogError::DuplicateName(game.name));
            }
            if existing.mods_dir.eq_ignore_ascii_case(&game.mods_dir) {
                return Err(CatalogError::DuplicateModsDir(game.mods_dir));
            }
            if existing.profile.eq_ignore_ascii_case(&game.profile) {
                return Err(CatalogError::DuplicateProfile(game.profile));
            }
            if existing.cli_id.eq_ignore_ascii_case(&game.cli_id) {
                return Err(CatalogError::DuplicateCliId(game.cli_id));
            }
        }

        let name = game.name.clone();
        self.settings.games.insert(name.clone(), game.clone());
        self.settings.removed_default_games.retain(|removed| *removed != name);
        self.games.insert(name.clone(), game);
        self.settings.game_order = self.game_order();

        self.ensure_directories()?;
        self.save_settings()?;

        tracing::info!("Added game {}", name);
        Ok(())
    }

    /// Remove a game and every settings bucket belonging to it.
    ///
    /// Files on disk are left alone.
    pub fn remove_game(&mut self, name: &str) -> Result<(), CatalogError> {
        if self.games.shift_remove(name).is_none() {
            return Err(CatalogError::UnknownGame(name.to_string()));
        }

        let settings = &mut self.settings;
        settings.games.shift_remove(name);
        settings.profiles.shift_remove(name);
        settings.active_profiles.shift_remove(name);
        settings.tracked_external_mods.shift_remove(name);
        settings.game_exe_paths.shift_remove(name);
        settings.custom_config_paths.shift_remove(name);
        settings.game_order.retain(|game| game != name);

        if default_games().contains_key(name)
            && !settings.removed_default_games.iter().any(|g| g == name)
        {
            settings.removed_default_games.push(name.to_string());
        }

        self.save_settings()?;
        tracing::info!("Removed game {}", name);
        Ok(())
    }

    /// Bring back a built-in game that was removed.
    pub fn restore_default_game(&mut self, name: &str) -> Result<(), CatalogError> {
        let builtin = default_games()
            .shift_remove(name)
            .ok_or_else(|| CatalogError::NotBuiltIn(name.to_string()))?;

        self.settings.removed_default_games.retain(|g| g != name);
        if !self.games.contains_key(name) {
            self.games.insert(name.to_string(), builtin);
        }
        self.settings.game_order = self.game_order();

        self.ensure_directories()?;
        self.save_settings()?;

        tracing::info!("Restored built-in game {}", name);
        Ok(())
    }

    /// Built-in games currently missing from the catalog.
    pub fn missing_default_games(&self) -> Vec<String> {
        default_games()
            .into_keys()
            .filter(|name| !self.games.contains_key(name))
            .collect()
    }

    /// Display order: the saved order restricted to known games, then the rest.
    pub fn game_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for name in &self.settings.game_order {
            if self.games.contains_key(name) && !order.contains(name) {
                order.push(name.clone());
            }
        }
        for name in self.games.keys() {
            if !order.contains(name) {
                order.push(name.clone());
            }
        }
        order
    }

    pub fn set_game_order(&mut self, order: &[String]) -> Result<()> {
        self.settings.game_order = order.to_vec();
        self.settings.game_order = self.game_order();
        self.save_settings()
    }

    // -----------------------------------------------------------------------
    // Per-game settings
    // -----------------------------------------------------------------------

    /// Custom executable override for `game`, if one is set.
    pub fn game_exe_path(&self, game: &str) -> Option<Utf8PathBuf> {
        self.settings
            .game_exe_paths
            .get(game)
            .filter(|path| !path.trim().is_empty())
            .map(Utf8PathBuf::from)
    }

    /// Set or clear the executable override.
    pub fn set_game_exe_path(&mut self, game: &str, path: Option<&Utf8Path>) -> Result<()> {
        match path {
            Some(path) => {
                self.settings
                    .game_exe_paths
                    .insert(game.to_string(), to_forward_slashes(path.as_str()));
            }
            None => {
                self.settings.game_exe_paths.shift_remove(game);
            }
        }
        self.save_settings()
    }

    /// Config file for a mod: the user's override, else `<dir>/<stem>/config.ini`.
    pub fn mod_config_path(&self, game: &str, mod_path: &Utf8Path) -> Utf8PathBuf {
        let file_name = mod_path.file_name().unwrap_or(mod_path.as_str());

        if let Some(custom) = self
            .settings
            .custom_config_paths
            .get(game)
            .and_then(|overrides| overrides.get(file_name))
        {
            return Utf8PathBuf::from(custom);
        }

        let stem = mod_path.file_stem().unwrap_or(file_name);
        mod_path
            .parent()
            .unwrap_or(Utf8Path::new(""))
            .join(stem)
            .join("config.ini")
    }

    pub fn set_mod_config_path(
        &mut self,
        game: &str,
        mod_path: &Utf8Path,
        config_path: &Utf8Path,
    ) -> Result<()> {
        let file_name = mod_path.file_name().unwrap_or(mod_path.as_str());
        self.settings
            .custom_config_paths
            .entry(game.to_string())
            .or_default()
            .insert(file_name.to_string(), to_forward_slashes(config_path.as_str()));
        self.save_settings()
    }

    /// Active profile id for `game`, `default` when unset.
    pub fn active_profile_id(&self, game: &str) -> &str {
        self.settings
            .active_profiles
            .get(game)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PROFILE_ID)
    }

    /// Tracked external paths for one profile of `game`.
    pub fn tracked_external_mods(&self, game: &str, profile_id: &str) -> &[String] {
        self.settings
            .tracked_external_mods
            .get(game)
            .and_then(|buckets| buckets.get(profile_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Track an external mod for the active profile. Returns false if already tracked.
    pub fn track_external_mod(&mut self, game: &str, path: &Utf8Path) -> Result<bool> {
        let profile_id = self.active_profile_id(game).to_string();
        let stored = to_forward_slashes(path.as_str());
        let key = canonical_key(&stored);

        let bucket = self
            .settings
            .tracked_external_mods
            .entry(game.to_string())
            .or_default()
            .entry(profile_id)
            .or_default();

        if bucket.iter().any(|existing| canonical_key(existing) == key) {
            return Ok(false);
        }
        bucket.push(stored);
        self.save_settings()?;
        Ok(true)
    }

    /// Stop tracking an external mod for the active profile. Returns false if it wasn't tracked.
    pub fn untrack_external_mod(&mut self, game: &str, path: &Utf8Path) -> Result<bool> {
        let profile_id = self.active_profile_id(game).to_string();
        let key = canonical_key(path.as_str());

        let Some(bucket) = self
            .settings
            .tracked_external_mods
            .get_mut(game)
            .and_then(|buckets| buckets.get_mut(&profile_id))
        else {
            return Ok(false);
        };

        let before = bucket.len();
        bucket.retain(|existing| canonical_key(existing) != key);
        if bucket.len() == before {
            return Ok(false);
        }
        self.save_settings()?;
        Ok(true)
    }
}
