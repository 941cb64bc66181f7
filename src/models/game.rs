use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A game ME3 can launch, with the file layout the manager keeps for it.
///
/// The built-in catalog comes from [`default_games`]; users may add more, which
/// are persisted in the settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Display name, also the key used throughout the settings document
    pub name: String,

    /// Identifier passed to `me3 --game` and written to `supports`
    pub cli_id: String,

    /// Executable file name, e.g. `eldenring.exe`
    pub executable: String,

    /// Name of the default mods directory under the config root
    pub mods_dir: String,

    /// File name of the default profile under the config root
    pub profile: String,
}

impl Game {
    pub fn new(name: &str, cli_id: &str, executable: &str, mods_dir: &str, profile: &str) -> Self {
        Self {
            name: name.to_string(),
            cli_id: cli_id.to_string(),
            executable: executable.to_string(),
            mods_dir: mods_dir.to_string(),
            profile: profile.to_string(),
        }
    }

    /// `<config_root>/<mods_dir>`
    pub fn default_mods_dir(&self, config_root: &Utf8Path) -> Utf8PathBuf {
        config_root.join(&self.mods_dir)
    }

    /// `<config_root>/<profile>`
    pub fn default_profile_path(&self, config_root: &Utf8Path) -> Utf8PathBuf {
        config_root.join(&self.profile)
    }
}

/// The games shipped with the manager, in display order.
pub fn default_games() -> IndexMap<String, Game> {
    let mut games = IndexMap::new();
    games.insert(
        "Elden Ring".to_string(),
        Game::new(
            "Elden Ring",
            "eldenring",
            "eldenring.exe",
            "eldenring-mods",
            "eldenring-default.me3",
        ),
    );
    games.insert(
        "Nightreign".to_string(),
        Game::new(
            "Nightreign",
            "nightreign",
            "nightreign.exe",
            "nightreign-mods",
            "nightreign-default.me3",
        ),
    );
    games
}

/// Map the game names and short codes found in older profiles to cli ids.
///
/// `"ELDEN RING"` and `"ER"` become `eldenring`, `"NIGHTREIGN"` and `"NR"` become
/// `nightreign`. Unknown values are returned trimmed but otherwise untouched.
pub fn normalize_game_alias(value: &str) -> String {
    let trimmed = value.trim();
    let folded: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();

    match folded.as_str() {
        "eldenring" | "er" => "eldenring".to_string(),
        "nightreign" | "nr" | "eldenringnightreign" => "nightreign".to_string(),
        _ => trimmed.to_string(),
    }
}
