//! Typed form of a `.me3` profile file.
//!
//! A mod is enabled purely by the presence of its entry: there is no `enabled`
//! flag anywhere in this model.

use crate::models::game::Game;
use crate::paths::canonical_key;

/// Version string written to fresh profiles.
pub const PROFILE_VERSION: &str = "v1";

/// Parsed profile document. All four top-level fields are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDocument {
    pub profile_version: String,
    pub natives: Vec<NativeEntry>,
    pub supports: Vec<SupportEntry>,
    pub packages: Vec<PackageEntry>,
}

impl Default for ProfileDocument {
    fn default() -> Self {
        Self {
            profile_version: PROFILE_VERSION.to_string(),
            natives: Vec::new(),
            supports: Vec::new(),
            packages: Vec::new(),
        }
    }
}

impl ProfileDocument {
    /// Fresh profile declaring support for a single game.
    pub fn for_game(game: &Game) -> Self {
        Self {
            supports: vec![SupportEntry::new(&game.cli_id)],
            ..Self::default()
        }
    }

    /// Index of the native whose path matches `path` once normalized.
    pub fn native_index(&self, path: &str) -> Option<usize> {
        let key = canonical_key(path);
        self.natives
            .iter()
            .position(|native| canonical_key(&native.path) == key)
    }

    /// Index of the package with the given id (case-insensitive).
    pub fn package_index(&self, id: &str) -> Option<usize> {
        let key = id.trim().to_ascii_lowercase();
        self.packages
            .iter()
            .position(|package| package.id.trim().to_ascii_lowercase() == key)
    }

    /// Remove every native matching `path`. Returns how many were removed.
    pub fn remove_native(&mut self, path: &str) -> usize {
        let key = canonical_key(path);
        let before = self.natives.len();
        self.natives.retain(|native| canonical_key(&native.path) != key);
        before - self.natives.len()
    }

    /// Remove every package with the given id. Returns how many were removed.
    pub fn remove_package(&mut self, id: &str) -> usize {
        let key = id.trim().to_ascii_lowercase();
        let before = self.packages.len();
        self.packages
            .retain(|package| package.id.trim().to_ascii_lowercase() != key);
        before - self.packages.len()
    }
}

/// `natives = [ {path = '...'} ]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeEntry {
    pub path: String,
    pub optional: Option<bool>,
    pub initializer: Option<Initializer>,
    pub finalizer: Option<String>,
    pub load_before: Vec<Dependency>,
    pub load_after: Vec<Dependency>,
}

impl NativeEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Snapshot of every field except `path`.
    pub fn advanced(&self) -> AdvancedOptions {
        AdvancedOptions {
            optional: self.optional,
            initializer: self.initializer.clone(),
            finalizer: self.finalizer.clone(),
            load_before: self.load_before.clone(),
            load_after: self.load_after.clone(),
        }
    }

    pub fn apply_advanced(&mut self, options: &AdvancedOptions) {
        self.optional = options.optional;
        self.initializer = options.initializer.clone();
        self.finalizer = options.finalizer.clone();
        self.load_before = options.load_before.clone();
        self.load_after = options.load_after.clone();
    }
}

/// How ME3 calls into a native once it is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initializer {
    /// `{function = "name"}`
    Function(String),
    /// `{delay = {ms = N}}`
    Delay { ms: u64 },
}

/// Load-order constraint on another mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub id: String,
    pub optional: bool,
}

impl Dependency {
    pub fn new(id: impl Into<String>, optional: bool) -> Self {
        Self {
            id: id.into(),
            optional,
        }
    }
}

/// `supports = [ {game = "..."} ]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportEntry {
    pub game: String,
}

impl SupportEntry {
    pub fn new(game: impl Into<String>) -> Self {
        Self { game: game.into() }
    }
}

/// `packages = [ { id = "...", source = '...' } ]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageEntry {
    /// Folder name, unique within a profile
    pub id: String,
    /// Folder location; older files call this `path`
    pub source: Option<String>,
    pub load_before: Vec<Dependency>,
    pub load_after: Vec<Dependency>,
}

impl PackageEntry {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn advanced(&self) -> AdvancedOptions {
        AdvancedOptions {
            load_before: self.load_before.clone(),
            load_after: self.load_after.clone(),
            ..AdvancedOptions::default()
        }
    }

    /// Packages only carry load-order constraints; other fields are ignored.
    pub fn apply_advanced(&mut self, options: &AdvancedOptions) {
        self.load_before = options.load_before.clone();
        self.load_after = options.load_after.clone();
    }
}

/// Optional per-entry metadata, detached from the entry it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedOptions {
    pub optional: Option<bool>,
    pub initializer: Option<Initializer>,
    pub finalizer: Option<String>,
    pub load_before: Vec<Dependency>,
    pub load_after: Vec<Dependency>,
}

impl AdvancedOptions {
    pub fn is_empty(&self) -> bool {
        self.optional.is_none()
            && self.initializer.is_none()
            && self.finalizer.is_none()
            && self.load_before.is_empty()
            && self.load_after.is_empty()
    }
}
