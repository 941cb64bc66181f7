//! Upgrading legacy profile layouts to the canonical inline-array form.
//!
//! Older tools wrote one `[[natives]]` / `[[packages]]` / `[[supports]]` block per
//! entry and used `{name, id}` for supported games. Parsing already understands
//! those shapes; migration persists the upgrade so the file is rewritten once.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;

use crate::models::{Game, PackageEntry, ProfileDocument, SupportEntry, normalize_game_alias};
use crate::paths::to_forward_slashes;
use crate::profile::parser::ProfileStore;
use crate::profile::writer::ProfileWriter;

/// Substrings that only appear in the legacy block layout.
pub const LEGACY_MARKERS: [&str; 3] = ["[[natives]]", "[[packages]]", "[[supports]]"];

/// Rewrites legacy profiles into canonical form.
pub struct SchemaMigrator<'a> {
    store: &'a ProfileStore,
    writer: &'a ProfileWriter,
}

impl<'a> SchemaMigrator<'a> {
    pub fn new(store: &'a ProfileStore, writer: &'a ProfileWriter) -> Self {
        Self { store, writer }
    }

    /// True if the text still uses the legacy block layout.
    pub fn needs_migration(content: &str) -> bool {
        LEGACY_MARKERS.iter().any(|marker| content.contains(marker))
    }

    /// Migrate the profile at `profile_path` if it carries legacy markers.
    ///
    /// Returns `Ok(true)` if the file was rewritten. Canonical files are left
    /// untouched, so calling this on every load is cheap and idempotent.
    pub fn migrate_if_needed(&self, profile_path: &Utf8Path, game: &Game) -> Result<bool> {
        if !profile_path.is_file() {
            return Ok(false);
        }

        let content = fs::read_to_string(profile_path)
            .with_context(|| format!("Failed to read profile: {}", profile_path))?;

        if !Self::needs_migration(&content) {
            return Ok(false);
        }

        tracing::info!("Migrating legacy profile layout: {}", profile_path);
        self.migrate(profile_path, game)?;
        Ok(true)
    }

    /// Parse, fix up and rewrite the profile unconditionally.
    pub fn migrate(&self, profile_path: &Utf8Path, game: &Game) -> Result<ProfileDocument> {
        let mut doc = self.store.parse(profile_path);
        if fix_document(&mut doc, game, self.writer.config_root()) {
            tracing::debug!("Applied structural fix-ups to {}", profile_path);
        }
        self.writer.write(profile_path, &doc)?;
        Ok(doc)
    }
}

/// Structural fix-ups on an already-typed document. Returns true if anything changed.
///
/// - packages without a source get `<config_root>/<id>`
/// - an empty package list gets the game's implicit default-mods-dir package
pub fn fix_document(doc: &mut ProfileDocument, game: &Game, config_root: &Utf8Path) -> bool {
    let mut changed = false;

    for package in &mut doc.packages {
        let missing = package
            .source
            .as_deref()
            .is_none_or(|source| source.trim().is_empty());
        if missing {
            package.source = Some(to_forward_slashes(config_root.join(&package.id).as_str()));
            changed = true;
        }
    }

    if doc.packages.is_empty() {
        doc.packages.push(implicit_package(game));
        changed = true;
    }

    changed
}

/// The package standing for the game's own default mods directory.
///
/// It is never written to disk; see [`ProfileWriter`].
pub fn implicit_package(game: &Game) -> PackageEntry {
    PackageEntry::new(&game.mods_dir, &game.mods_dir)
}

/// Build a support entry from whichever of `game`, `id`, `name` is present.
pub fn support_from_fields(
    game: Option<&str>,
    name: Option<&str>,
    id: Option<&str>,
) -> Option<SupportEntry> {
    [game, id, name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(|value| SupportEntry::new(normalize_game_alias(value)))
}

/// Build a package entry; a missing id is taken from the source's last segment.
pub fn package_from_fields(id: Option<String>, source: Option<String>) -> Option<PackageEntry> {
    let source = source.filter(|s| !s.trim().is_empty());
    let id = id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| {
            source.as_deref().and_then(|s| {
                to_forward_slashes(s)
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
        })?;

    Some(PackageEntry {
        id,
        source,
        ..PackageEntry::default()
    })
}
