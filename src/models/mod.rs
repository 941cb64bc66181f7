//! Data models for the manager.
//!
//! - [`Game`]: a launchable game and its default file layout
//! - [`Profile`]: a named profile file + mods directory for one game
//! - [`ProfileDocument`]: the typed contents of a `.me3` profile file
//! - [`ModRecord`]: derived per-mod status handed to the UI
//! - [`Settings`]: the persisted `manager_settings.json` document

pub mod document;
pub mod game;
pub mod mod_record;
pub mod profile;
pub mod settings;

pub use document::{
    AdvancedOptions, Dependency, Initializer, NativeEntry, PROFILE_VERSION, PackageEntry,
    ProfileDocument, SupportEntry,
};
pub use game::{Game, default_games, normalize_game_alias};
pub use mod_record::{ModKind, ModRecord, ModStatus};
pub use profile::{DEFAULT_PROFILE_ID, Profile};
pub use settings::{Settings, TrackedExternalMods, UiSettings};
