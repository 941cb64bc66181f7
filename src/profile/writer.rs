//! Writing `.me3` profile files in the canonical layout.
//!
//! The output is formatted by hand rather than through a TOML serializer so the
//! file always looks the same:
//!
//! ```text
//! profileVersion = "v1"
//!
//! natives = [
//!     {path = 'eldenring-mods\Foo.dll'},
//! ]
//!
//! supports = [
//!     {game = "eldenring"},
//! ]
//!
//! packages = []
//! ```
//!
//! Path-bearing values use single-quoted literal strings so Windows backslashes
//! need no escaping; identifiers use double quotes.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

use crate::config::ConfigContext;
use crate::models::{Dependency, Initializer, NativeEntry, PackageEntry, ProfileDocument};
use crate::paths::{
    RenderMode, is_absolute_str, relative_to, render_mode, resolve_profile_path, to_forward_slashes,
};

/// Serializes [`ProfileDocument`]s to disk.
#[derive(Debug, Clone)]
pub struct ProfileWriter {
    config_root: Utf8PathBuf,
    /// Package ids that stand for a game's default mods directory; never emitted
    implicit_package_ids: Vec<String>,
}

impl ProfileWriter {
    pub fn new(config_root: impl Into<Utf8PathBuf>, implicit_package_ids: Vec<String>) -> Self {
        Self {
            config_root: config_root.into(),
            implicit_package_ids,
        }
    }

    /// Writer for every game in the context's catalog.
    pub fn for_context(ctx: &ConfigContext) -> Self {
        Self::new(
            ctx.config_root(),
            ctx.games().values().map(|g| g.mods_dir.clone()).collect(),
        )
    }

    pub fn config_root(&self) -> &Utf8Path {
        &self.config_root
    }

    /// Write `doc` to `profile_path`. The document itself is never modified.
    pub fn write(&self, profile_path: &Utf8Path, doc: &ProfileDocument) -> Result<()> {
        let rendered = self.render(profile_path, doc);

        if let Some(parent) = profile_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create profile directory: {}", parent)
                })?;
            }
        }

        fs::write(profile_path, rendered)
            .with_context(|| format!("Failed to write profile: {}", profile_path))?;

        tracing::info!(
            "Wrote profile {} ({} natives, {} packages)",
            profile_path,
            doc.natives.len(),
            doc.packages.len()
        );
        Ok(())
    }

    /// Render `doc` as it would be written to `profile_path`.
    pub fn render(&self, profile_path: &Utf8Path, doc: &ProfileDocument) -> String {
        let mode = render_mode(profile_path, &self.config_root);
        let mut out = String::new();

        out.push_str(&format!(
            "profileVersion = {}\n\n",
            basic_string(&doc.profile_version)
        ));

        let natives: Vec<String> = doc
            .natives
            .iter()
            .map(|native| self.render_native(native, mode, profile_path))
            .collect();
        push_array(&mut out, "natives", &natives);
        out.push('\n');

        let supports: Vec<String> = doc
            .supports
            .iter()
            .map(|support| format!("{{game = {}}}", basic_string(&support.game)))
            .collect();
        push_array(&mut out, "supports", &supports);
        out.push('\n');

        let packages: Vec<String> = doc
            .packages
            .iter()
            .filter(|package| !self.is_implicit(package))
            .map(|package| self.render_package(package, mode, profile_path))
            .collect();
        push_array(&mut out, "packages", &packages);

        out
    }

    fn is_implicit(&self, package: &PackageEntry) -> bool {
        self.implicit_package_ids
            .iter()
            .any(|id| id.eq_ignore_ascii_case(package.id.trim()))
    }

    fn render_native(&self, native: &NativeEntry, mode: RenderMode, profile_path: &Utf8Path) -> String {
        let path = self.render_path(&native.path, mode, profile_path, false);
        let mut parts = vec![format!("path = {}", literal_string(&path))];

        if let Some(optional) = native.optional {
            parts.push(format!("optional = {}", optional));
        }
        match &native.initializer {
            Some(Initializer::Function(function)) => {
                parts.push(format!("initializer = {{function = {}}}", basic_string(function)));
            }
            Some(Initializer::Delay { ms }) => {
                parts.push(format!("initializer = {{delay = {{ms = {}}}}}", ms));
            }
            None => {}
        }
        if let Some(finalizer) = &native.finalizer {
            parts.push(format!("finalizer = {}", basic_string(finalizer)));
        }
        if !native.load_before.is_empty() {
            parts.push(format!("load_before = {}", render_dependencies(&native.load_before)));
        }
        if !native.load_after.is_empty() {
            parts.push(format!("load_after = {}", render_dependencies(&native.load_after)));
        }

        format!("{{{}}}", parts.join(", "))
    }

    fn render_package(&self, package: &PackageEntry, mode: RenderMode, profile_path: &Utf8Path) -> String {
        let mut parts = vec![format!("id = {}", basic_string(&package.id))];
        if let Some(source) = &package.source {
            let source = self.render_path(source, mode, profile_path, true);
            parts.push(format!("source = {}", literal_string(&source)));
        }
        parts.push(format!("load_after = {}", render_dependencies(&package.load_after)));
        parts.push(format!("load_before = {}", render_dependencies(&package.load_before)));

        format!("{{ {} }}", parts.join(", "))
    }

    /// Apply the relative/absolute policy for the profile's location.
    ///
    /// Relative native paths are kept verbatim under the config root because
    /// `dir\file.dll` is the form ME3 and other tools write for managed DLLs.
    fn render_path(
        &self,
        raw: &str,
        mode: RenderMode,
        profile_path: &Utf8Path,
        normalize_relative: bool,
    ) -> String {
        let raw = raw.trim();
        match mode {
            RenderMode::ConfigRelative => {
                if is_absolute_str(raw) {
                    relative_to(raw, self.config_root.as_str())
                        .filter(|rel| !rel.is_empty())
                        .unwrap_or_else(|| to_forward_slashes(raw))
                } else if normalize_relative {
                    to_forward_slashes(raw)
                } else {
                    raw.to_string()
                }
            }
            RenderMode::Absolute => {
                if is_absolute_str(raw) {
                    return to_forward_slashes(raw);
                }
                let candidate = resolve_profile_path(raw, profile_path, &self.config_root);
                if candidate.exists() {
                    to_forward_slashes(candidate.as_str())
                } else {
                    to_forward_slashes(raw)
                }
            }
        }
    }
}

fn push_array(out: &mut String, key: &str, items: &[String]) {
    if items.is_empty() {
        out.push_str(&format!("{} = []\n", key));
        return;
    }
    out.push_str(&format!("{} = [\n", key));
    for item in items {
        out.push_str(&format!("    {},\n", item));
    }
    out.push_str("]\n");
}

fn render_dependencies(deps: &[Dependency]) -> String {
    let items: Vec<String> = deps
        .iter()
        .map(|dep| format!("{{id = {}, optional = {}}}", basic_string(&dep.id), dep.optional))
        .collect();
    format!("[{}]", items.join(", "))
}

/// `'value'`, or an escaped basic string when the value cannot be a literal.
fn literal_string(value: &str) -> String {
    if value.contains('\'') || value.contains('\n') || value.contains('\r') {
        basic_string(value)
    } else {
        format!("'{}'", value)
    }
}

/// `"value"` with TOML basic-string escaping.
fn basic_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
