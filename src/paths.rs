//! Path normalization for profile entries and filesystem scans.
//!
//! Profile files are written on Windows by hand and by tools, so the same mod can
//! appear as `eldenring-mods\Foo.dll`, `eldenring-mods/foo.dll` or
//! `C:\Users\...\Foo.dll`. Everything that compares paths goes through
//! [`canonical_key`]; everything that renders paths for a profile goes through
//! [`render_mode`] and [`native_config_path`].
//!
//! String-level checks are used instead of [`Utf8Path::is_absolute`] because a
//! profile authored on Windows must be understood the same way on any host.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// How paths are rendered into a profile file, decided by where the profile lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Profile lives under the config root: paths inside the root become relative.
    ConfigRelative,
    /// Profile lives elsewhere ("custom" profile): every path is absolute.
    Absolute,
}

/// Replace every backslash with a forward slash.
pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Comparable key for a path: forward slashes, ASCII-lowercased, no trailing slash.
pub fn canonical_key(path: &str) -> String {
    let mut key = to_forward_slashes(path.trim()).to_ascii_lowercase();
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }
    key
}

/// True for `/unix`, `\\server\share` and `C:\drive` style paths.
pub fn is_absolute_str(path: &str) -> bool {
    let path = path.trim();
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// True if `path` is `root` itself or lies somewhere below it (case-insensitive).
pub fn is_within(path: &str, root: &str) -> bool {
    let path = canonical_key(path);
    let root = canonical_key(root);
    path == root || path.starts_with(&format!("{}/", root.trim_end_matches('/')))
}

/// Forward-slash remainder of `path` below `root`, or `None` if it is not inside.
///
/// The remainder keeps the original casing of `path`.
pub fn relative_to(path: &str, root: &str) -> Option<String> {
    if !is_within(path, root) {
        return None;
    }
    let forward = to_forward_slashes(path.trim());
    let root_len = canonical_key(root).trim_end_matches('/').len();
    let rest = forward.get(root_len..)?.trim_start_matches('/');
    Some(rest.trim_end_matches('/').to_string())
}

/// Two paths name the same location once normalized.
pub fn same_path(a: &str, b: &str) -> bool {
    canonical_key(a) == canonical_key(b)
}

/// Absolute, forward-slash form of a filesystem path.
///
/// Relative paths are resolved against the current directory without touching
/// the filesystem, so missing paths still get a stable key.
pub fn absolute_forward(path: &Utf8Path) -> Result<String> {
    if is_absolute_str(path.as_str()) {
        return Ok(to_forward_slashes(path.as_str()));
    }
    let absolute = std::path::absolute(path.as_std_path())
        .with_context(|| format!("Failed to resolve absolute path for {}", path))?;
    let absolute = Utf8PathBuf::try_from(absolute)
        .with_context(|| format!("Path is not valid UTF-8: {}", path))?;
    Ok(to_forward_slashes(absolute.as_str()))
}

/// Decide how a profile at `profile_path` renders its paths.
pub fn render_mode(profile_path: &Utf8Path, config_root: &Utf8Path) -> RenderMode {
    let parent = profile_path.parent().unwrap_or(profile_path);
    if is_within(parent.as_str(), config_root.as_str()) {
        RenderMode::ConfigRelative
    } else {
        RenderMode::Absolute
    }
}

/// The string a DLL is referenced by inside a profile's `natives` list.
///
/// A DLL directly inside the game's *default* mods directory is written as
/// `<mods_dir_name>\<file>.dll`; anything else uses its absolute forward-slash path.
pub fn native_config_path(
    dll_path: &Utf8Path,
    default_mods_dir: &Utf8Path,
    mods_dir_name: &str,
) -> Result<String> {
    let in_default_dir = dll_path
        .parent()
        .is_some_and(|parent| same_path(parent.as_str(), default_mods_dir.as_str()));

    match dll_path.file_name() {
        Some(file_name) if in_default_dir => Ok(format!("{}\\{}", mods_dir_name, file_name)),
        _ => absolute_forward(dll_path),
    }
}

/// Resolve a path found in a profile to a filesystem location.
///
/// A profile under the config root has its relative entries written relative to
/// the root (see [`render_mode`]), so they resolve against the root. A profile
/// elsewhere tries its own directory first and falls back to the root.
pub fn resolve_profile_path(
    raw: &str,
    profile_path: &Utf8Path,
    config_root: &Utf8Path,
) -> Utf8PathBuf {
    let forward = to_forward_slashes(raw.trim());
    if is_absolute_str(&forward) {
        return Utf8PathBuf::from(forward);
    }
    match render_mode(profile_path, config_root) {
        RenderMode::ConfigRelative => config_root.join(forward),
        RenderMode::Absolute => {
            let base = profile_path.parent().unwrap_or(Utf8Path::new("."));
            let local = base.join(&forward);
            if local.exists() {
                local
            } else {
                config_root.join(forward)
            }
        }
    }
}
