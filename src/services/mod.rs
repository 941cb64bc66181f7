//! Services: the operations collaborators (UI, file watcher, launcher) call into.
//!
//! - [`ProfileManager`]: named profiles per game, the active pointer and the
//!   startup prune pass
//! - [`ModRegistry`]: derives [`ModRecord`](crate::models::ModRecord)s from the
//!   active profile and the mods directory, and applies toggles, regulation
//!   switches, external-mod tracking and cleanup
//!
//! Both are stateless with respect to settings: every call takes the
//! [`ConfigContext`](crate::config::ConfigContext) explicitly, `&mut` when it
//! persists settings.
//!
//! # Usage Example
//!
//! ```ignore
//! use me3_manager::{ConfigContext, ModRegistry, ProfileManager};
//!
//! let mut ctx = ConfigContext::from_default_location()?;
//! ProfileManager::new().ensure_default_profiles(&mut ctx)?;
//!
//! let registry = ModRegistry::new();
//! for (path, record) in registry.get_all_mods(&ctx, "Elden Ring")? {
//!     println!("{} {:?}", path, record.status);
//! }
//! ```

pub mod profiles;
pub mod registry;

pub use profiles::{PrunedProfile, ProfileError, ProfileManager, WatchTargets, slugify};
pub use registry::{
    ModRegistry, PACKAGE_CONTENT_FOLDERS, REGULATION_DISABLED_FILE, REGULATION_FILE,
    ReconcileReport, RegistryError, RemoveOutcome, is_package_folder,
};
