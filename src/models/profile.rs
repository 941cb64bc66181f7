use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::models::game::Game;

/// Id of the profile every game always has. Never deletable.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// A named mod configuration for one game: a profile file plus the mods
/// directory it draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub profile_path: Utf8PathBuf,
    pub mods_path: Utf8PathBuf,
}

impl Profile {
    /// The implicit `default` profile living directly under the config root.
    pub fn default_for(game: &Game, config_root: &Utf8Path) -> Self {
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: "Default".to_string(),
            profile_path: game.default_profile_path(config_root),
            mods_path: game.default_mods_dir(config_root),
        }
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PROFILE_ID
    }

    /// Both the mods directory and the profile file exist on disk.
    pub fn is_backed_on_disk(&self) -> bool {
        self.mods_path.is_dir() && self.profile_path.is_file()
    }
}
