//! Integration tests for ModRegistry
//!
//! These tests verify:
//! - Enable/disable toggling and how entries are written to the profile
//! - Regulation file exclusivity
//! - External mod tracking, removal and reconciliation
//! - Advanced options and watcher notifications
//! - Profiles stored in a subdirectory of the config root

use camino::{Utf8Path, Utf8PathBuf};
use me3_manager::models::{AdvancedOptions, Dependency, Initializer, ModKind, ModStatus};
use me3_manager::services::{
    REGULATION_DISABLED_FILE, REGULATION_FILE, RegistryError, RemoveOutcome,
};
use me3_manager::{ConfigContext, ModRegistry, ProfileManager};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

const GAME: &str = "Elden Ring";

struct Fixture {
    _temp_dir: TempDir,
    base: Utf8PathBuf,
    ctx: ConfigContext,
    registry: ModRegistry,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let mut ctx = ConfigContext::new(base.join("profiles")).unwrap();
        ProfileManager::new().ensure_default_profiles(&mut ctx).unwrap();
        Self {
            _temp_dir: temp_dir,
            base,
            ctx,
            registry: ModRegistry::new(),
        }
    }

    fn mods_dir(&self) -> Utf8PathBuf {
        self.ctx.config_root().join("eldenring-mods")
    }

    fn profile_text(&self) -> String {
        let profile = ProfileManager::new().active_profile(&self.ctx, GAME).unwrap();
        fs::read_to_string(profile.profile_path).unwrap()
    }

    fn touch(&self, path: &Utf8Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }
}

fn key(path: &Utf8Path) -> String {
    path.as_str().replace('\\', "/")
}

#[test]
fn test_enable_native_in_default_dir_writes_relative_path() {
    let fx = Fixture::new();
    let dll = fx.mods_dir().join("Foo.dll");
    fx.touch(&dll);

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods[&key(&dll)].status, ModStatus::Disabled);
    assert_eq!(mods[&key(&dll)].kind, ModKind::Native);

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();
    assert!(fx.profile_text().contains("natives = [\n    {path = 'eldenring-mods\\Foo.dll'},\n]"));

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods[&key(&dll)].status, ModStatus::Enabled);
    assert!(!mods[&key(&dll)].external);

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, false).unwrap();
    assert!(!fx.profile_text().contains("Foo.dll"));
    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods[&key(&dll)].status, ModStatus::Disabled);
}

#[test]
fn test_enable_native_in_custom_dir_writes_absolute_path() {
    let mut fx = Fixture::new();
    let custom = fx.base.join("custom-mods");
    ProfileManager::new()
        .add_profile(&mut fx.ctx, GAME, "Custom", &custom, true)
        .unwrap();

    let dll = custom.join("Foo.dll");
    fx.touch(&dll);
    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();

    assert!(fx.profile_text().contains(&format!("{{path = '{}'}}", key(&dll))));

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    let record = &mods[&key(&dll)];
    assert_eq!(record.status, ModStatus::Enabled);
    assert!(!record.external);
    assert_eq!(mods.len(), 1);
}

#[test]
fn test_enable_missing_dll_fails() {
    let fx = Fixture::new();
    let dll = fx.mods_dir().join("Ghost.dll");
    let result = fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true);
    assert!(matches!(result, Err(RegistryError::ModNotFound(_))));
}

#[test]
fn test_package_detection_and_toggle() {
    let fx = Fixture::new();
    let package = fx.mods_dir().join("CoolMod");
    fs::create_dir_all(package.join("chr")).unwrap();
    fs::create_dir_all(fx.mods_dir().join("Foo").join("settings")).unwrap();

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods.len(), 1, "config-only folders are not packages");
    assert_eq!(mods[&key(&package)].kind, ModKind::Package);

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &package, true).unwrap();
    assert!(fx.profile_text().contains(
        "{ id = \"CoolMod\", source = 'eldenring-mods/CoolMod', load_after = [], load_before = [] }"
    ));
    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert!(mods[&key(&package)].is_enabled());

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &package, false).unwrap();
    assert!(fx.profile_text().ends_with("packages = []\n"));
}

#[test]
fn test_regulation_switch_is_exclusive() {
    let fx = Fixture::new();
    let a = fx.mods_dir().join("A");
    let b = fx.mods_dir().join("B");
    fx.touch(&a.join(REGULATION_FILE));
    fx.touch(&b.join(REGULATION_DISABLED_FILE));

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert!(mods[&key(&a)].regulation_active);
    assert!(mods[&key(&b)].has_regulation);
    assert!(!mods[&key(&b)].regulation_active);

    fx.registry.set_regulation_active(&fx.ctx, GAME, "B").unwrap();

    assert!(a.join(REGULATION_DISABLED_FILE).is_file());
    assert!(!a.join(REGULATION_FILE).exists());
    assert!(b.join(REGULATION_FILE).is_file());

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert!(!mods[&key(&a)].regulation_active);
    assert!(mods[&key(&b)].regulation_active);
    assert_eq!(mods.values().filter(|m| m.regulation_active).count(), 1);

    // Re-activating the active one is harmless
    fx.registry.set_regulation_active(&fx.ctx, GAME, "B").unwrap();
    assert!(b.join(REGULATION_FILE).is_file());
}

#[test]
fn test_regulation_switch_without_file_changes_nothing() {
    let fx = Fixture::new();
    let a = fx.mods_dir().join("A");
    fx.touch(&a.join(REGULATION_FILE));
    fs::create_dir_all(fx.mods_dir().join("Plain").join("param")).unwrap();

    let result = fx.registry.set_regulation_active(&fx.ctx, GAME, "Plain");
    assert!(matches!(result, Err(RegistryError::NoRegulationFile(_))));
    assert!(a.join(REGULATION_FILE).is_file());
}

#[test]
fn test_external_mod_lifecycle() {
    let mut fx = Fixture::new();
    let ext = fx.base.join("elsewhere").join("Ext.dll");
    fx.touch(&ext);

    fx.registry.add_external_mod(&mut fx.ctx, GAME, &ext).unwrap();
    assert_eq!(fx.ctx.tracked_external_mods(GAME, "default"), &[key(&ext)]);
    assert!(fx.profile_text().contains(&format!("{{path = '{}'}}", key(&ext))));

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    let record = &mods[&key(&ext)];
    assert!(record.external);
    assert_eq!(record.status, ModStatus::Enabled);

    assert!(matches!(
        fx.registry.add_external_mod(&mut fx.ctx, GAME, &ext),
        Err(RegistryError::AlreadyTracked(_))
    ));

    let outcome = fx.registry.remove_mod(&mut fx.ctx, GAME, &ext).unwrap();
    assert_eq!(outcome, RemoveOutcome::Untracked);
    assert!(ext.is_file(), "external files are never deleted");
    assert!(fx.ctx.tracked_external_mods(GAME, "default").is_empty());
    assert!(!fx.profile_text().contains("Ext.dll"));
}

#[test]
fn test_add_external_mod_validation() {
    let mut fx = Fixture::new();

    let text = fx.base.join("elsewhere").join("readme.txt");
    fx.touch(&text);
    assert!(matches!(
        fx.registry.add_external_mod(&mut fx.ctx, GAME, &text),
        Err(RegistryError::NotADll(_))
    ));

    let local = fx.mods_dir().join("Local.dll");
    fx.touch(&local);
    assert!(matches!(
        fx.registry.add_external_mod(&mut fx.ctx, GAME, &local),
        Err(RegistryError::NotExternal(_))
    ));

    let missing = fx.base.join("nowhere.dll");
    assert!(matches!(
        fx.registry.add_external_mod(&mut fx.ctx, GAME, &missing),
        Err(RegistryError::ModNotFound(_))
    ));
    assert!(fx.ctx.tracked_external_mods(GAME, "default").is_empty());
}

#[test]
fn test_remove_mod_deletes_dll_and_config_folder() {
    let mut fx = Fixture::new();
    let dll = fx.mods_dir().join("Foo.dll");
    fx.touch(&dll);
    fx.touch(&fx.mods_dir().join("Foo").join("config.ini"));
    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();

    let outcome = fx.registry.remove_mod(&mut fx.ctx, GAME, &dll).unwrap();
    assert_eq!(outcome, RemoveOutcome::Deleted);
    assert!(!dll.exists());
    assert!(!fx.mods_dir().join("Foo").exists());
    assert!(!fx.profile_text().contains("Foo.dll"));
}

#[test]
fn test_remove_external_folder_is_refused() {
    let mut fx = Fixture::new();
    let folder = fx.base.join("elsewhere").join("Pkg");
    fs::create_dir_all(folder.join("param")).unwrap();

    let result = fx.registry.remove_mod(&mut fx.ctx, GAME, &folder);
    assert!(matches!(result, Err(RegistryError::ExternalFolder(_))));
    assert!(folder.is_dir());
}

#[test]
fn test_missing_tracked_mod_skipped_until_reconcile() {
    let mut fx = Fixture::new();
    let dll = fx.mods_dir().join("Foo.dll");
    fx.touch(&dll);
    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();

    let gone = fx.base.join("elsewhere").join("Gone.dll");
    fx.ctx.track_external_mod(GAME, &gone).unwrap();
    fs::remove_file(&dll).unwrap();

    // A plain read skips the missing mod but keeps tracking it
    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert!(!mods.contains_key(&key(&gone)));
    assert_eq!(fx.ctx.tracked_external_mods(GAME, "default").len(), 1);

    let report = fx.registry.reconcile(&mut fx.ctx, GAME).unwrap();
    assert_eq!(report.untracked, vec![key(&gone)]);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].status, ModStatus::Missing);
    assert_eq!(report.missing[0].name, "Foo");
    assert!(report.profile_updated);
    assert!(!fx.profile_text().contains("Foo.dll"));

    let again = fx.registry.reconcile(&mut fx.ctx, GAME).unwrap();
    assert!(again.is_clean());
    assert!(!again.profile_updated);
}

#[test]
fn test_advanced_options_lost_on_disable() {
    let fx = Fixture::new();
    let dll = fx.mods_dir().join("Foo.dll");
    fx.touch(&dll);

    let options = AdvancedOptions {
        optional: Some(true),
        initializer: Some(Initializer::Delay { ms: 500 }),
        load_after: vec![Dependency::new("Bar.dll", false)],
        ..AdvancedOptions::default()
    };
    assert!(matches!(
        fx.registry.set_advanced_options(&fx.ctx, GAME, &dll, &options),
        Err(RegistryError::NotEnabled(_))
    ));

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();
    fx.registry
        .set_advanced_options(&fx.ctx, GAME, &dll, &options)
        .unwrap();
    assert!(fx.profile_text().contains("initializer = {delay = {ms = 500}}"));

    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert!(mods[&key(&dll)].has_advanced_options());
    assert_eq!(mods[&key(&dll)].advanced, options);

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, false).unwrap();
    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();
    let mods = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert!(!mods[&key(&dll)].has_advanced_options());
}

#[test]
fn test_notify_refreshes_affected_games_only() {
    let fx = Fixture::new();
    let dll = fx.mods_dir().join("Foo.dll");
    fx.touch(&dll);

    let refreshed = fx.registry.notify(&fx.ctx, &[dll.clone()]).unwrap();
    assert_eq!(refreshed.keys().collect::<Vec<_>>(), vec![GAME]);
    assert!(refreshed[GAME].contains_key(&key(&dll)));

    let unrelated = fx.base.join("somewhere-else.txt");
    assert!(fx.registry.notify(&fx.ctx, &[unrelated]).unwrap().is_empty());
}

#[test]
fn test_regulation_switch_rejects_paths_outside_mods_dir() {
    let fx = Fixture::new();
    let outside = fx.ctx.config_root().join("Escape");
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join(REGULATION_DISABLED_FILE), b"").unwrap();

    for name in ["../Escape", "..", "sub/dir", "sub\\dir", ""] {
        let result = fx.registry.set_regulation_active(&fx.ctx, GAME, name);
        assert!(
            matches!(result, Err(RegistryError::InvalidModName(_))),
            "{:?} was accepted",
            name
        );
    }
    assert!(outside.join(REGULATION_DISABLED_FILE).is_file());
    assert!(!outside.join(REGULATION_FILE).exists());
}

#[test]
fn test_toggle_in_profile_under_config_root_subdirectory() {
    let mut fx = Fixture::new();
    let mods = fx.ctx.config_root().join("pvp-mods");
    ProfileManager::new()
        .add_profile(&mut fx.ctx, GAME, "PvP", &mods, true)
        .unwrap();

    let dll = mods.join("Foo.dll");
    fx.touch(&dll);
    let package = mods.join("CoolMod");
    fs::create_dir_all(package.join("param")).unwrap();

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();
    fx.registry.set_mod_enabled(&fx.ctx, GAME, &package, true).unwrap();

    // Absolute paths under the config root are written relative to the root
    let text = fx.profile_text();
    assert!(text.contains("{path = 'pvp-mods/Foo.dll'}"), "{}", text);
    assert!(text.contains("source = 'pvp-mods/CoolMod'"), "{}", text);

    let mods_map = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods_map[&key(&dll)].status, ModStatus::Enabled);
    assert!(!mods_map[&key(&dll)].external);
    assert_eq!(mods_map[&key(&package)].status, ModStatus::Enabled);

    let report = fx.registry.reconcile(&mut fx.ctx, GAME).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert!(!report.profile_updated);

    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, false).unwrap();
    assert!(!fx.profile_text().contains("Foo.dll"));
    let mods_map = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods_map[&key(&dll)].status, ModStatus::Disabled);
}

#[test]
fn test_reconcile_keeps_natives_of_profile_in_default_mods_dir() {
    let mut fx = Fixture::new();
    let mods = fx.mods_dir();
    ProfileManager::new()
        .add_profile(&mut fx.ctx, GAME, "Alt", &mods, true)
        .unwrap();

    let dll = mods.join("Foo.dll");
    fx.touch(&dll);
    fx.registry.set_mod_enabled(&fx.ctx, GAME, &dll, true).unwrap();
    assert!(fx.profile_text().contains("{path = 'eldenring-mods\\Foo.dll'}"));

    let report = fx.registry.reconcile(&mut fx.ctx, GAME).unwrap();
    assert!(report.missing.is_empty(), "{:?}", report.missing);
    assert!(!report.profile_updated);
    assert!(fx.profile_text().contains("Foo.dll"));

    let mods_map = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
    assert_eq!(mods_map[&key(&dll)].status, ModStatus::Enabled);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_enabled_state_survives_write_and_reconcile(
        subdir in "[a-z]{1,8}-mods",
        names in proptest::collection::btree_set("[A-Z][a-z]{2,8}", 1..5),
        mask in proptest::collection::vec(any::<bool>(), 5),
    ) {
        let mut fx = Fixture::new();
        let mods = fx.ctx.config_root().join(&subdir);
        ProfileManager::new()
            .add_profile(&mut fx.ctx, GAME, &subdir, &mods, true)
            .unwrap();

        let dlls: Vec<(Utf8PathBuf, bool)> = names
            .iter()
            .zip(mask.iter().copied())
            .map(|(name, enabled)| (mods.join(format!("{}.dll", name)), enabled))
            .collect();
        for (dll, enabled) in &dlls {
            fx.touch(dll);
            if *enabled {
                fx.registry.set_mod_enabled(&fx.ctx, GAME, dll, true).unwrap();
            }
        }

        let report = fx.registry.reconcile(&mut fx.ctx, GAME).unwrap();
        prop_assert!(report.missing.is_empty());

        let mods_map = fx.registry.get_all_mods(&fx.ctx, GAME).unwrap();
        for (dll, enabled) in &dlls {
            let expected = if *enabled { ModStatus::Enabled } else { ModStatus::Disabled };
            prop_assert_eq!(mods_map[&key(dll)].status, expected);
        }
    }
}
