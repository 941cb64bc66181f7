use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::game::Game;
use crate::models::profile::{DEFAULT_PROFILE_ID, Profile};

/// game name → profile id → absolute forward-slash paths
pub type TrackedExternalMods = IndexMap<String, IndexMap<String, Vec<String>>>;

/// Persisted manager settings (`manager_settings.json`).
///
/// Every key is optional on disk so older and hand-edited files still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// game name → custom executable override
    #[serde(default)]
    pub game_exe_paths: IndexMap<String, String>,

    #[serde(default)]
    pub game_order: Vec<String>,

    #[serde(default)]
    pub ui_settings: UiSettings,

    #[serde(default, deserialize_with = "deserialize_tracked")]
    pub tracked_external_mods: TrackedExternalMods,

    /// game name → profiles
    #[serde(default)]
    pub profiles: IndexMap<String, Vec<Profile>>,

    /// game name → active profile id
    #[serde(default)]
    pub active_profiles: IndexMap<String, String>,

    /// game name → mod file name → config file override
    #[serde(default)]
    pub custom_config_paths: IndexMap<String, IndexMap<String, String>>,

    /// Games added by the user on top of the built-in catalog
    #[serde(default)]
    pub games: IndexMap<String, Game>,

    /// Built-in games the user removed
    #[serde(default)]
    pub removed_default_games: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_mods_per_page")]
    pub mods_per_page: u32,

    #[serde(default = "default_true")]
    pub check_for_updates: bool,

    #[serde(default)]
    pub auto_launch_steam: bool,

    #[serde(default)]
    pub steam_path: Option<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            mods_per_page: default_mods_per_page(),
            check_for_updates: true,
            auto_launch_steam: false,
            steam_path: None,
        }
    }
}

fn default_mods_per_page() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// Older settings stored a flat list per game instead of one list per profile.
#[derive(Deserialize)]
#[serde(untagged)]
enum TrackedBucket {
    PerProfile(IndexMap<String, Vec<String>>),
    Legacy(Vec<String>),
}

fn deserialize_tracked<'de, D>(deserializer: D) -> Result<TrackedExternalMods, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, TrackedBucket> = IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(game, bucket)| {
            let per_profile = match bucket {
                TrackedBucket::PerProfile(map) => map,
                TrackedBucket::Legacy(paths) => {
                    let mut map = IndexMap::new();
                    map.insert(DEFAULT_PROFILE_ID.to_string(), paths);
                    map
                }
            };
            (game, per_profile)
        })
        .collect())
}
