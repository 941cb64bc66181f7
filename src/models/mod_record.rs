use crate::models::document::AdvancedOptions;

/// Whether a mod is a single DLL or a content folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModKind {
    Native,
    Package,
}

/// Status derived from the profile document and the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModStatus {
    Enabled,
    Disabled,
    Missing,
}

/// One mod as seen by the UI. Derived on every read, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRecord {
    /// Filesystem path of the DLL or folder (tracked string for external mods)
    pub path: String,
    /// File stem or folder name
    pub name: String,
    pub kind: ModKind,
    pub status: ModStatus,
    /// Lives outside the active mods directory
    pub external: bool,
    /// Folder holds `regulation.bin` or `regulation.bin.disabled`
    pub has_regulation: bool,
    /// Folder holds the live `regulation.bin`
    pub regulation_active: bool,
    /// Advanced fields of the matching profile entry, empty when disabled
    pub advanced: AdvancedOptions,
}

impl ModRecord {
    pub fn new(path: impl Into<String>, name: impl Into<String>, kind: ModKind) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            kind,
            status: ModStatus::Disabled,
            external: false,
            has_regulation: false,
            regulation_active: false,
            advanced: AdvancedOptions::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == ModStatus::Enabled
    }

    pub fn has_advanced_options(&self) -> bool {
        !self.advanced.is_empty()
    }
}
