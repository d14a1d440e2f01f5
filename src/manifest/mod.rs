//! Versioned manifests and the builders that produce them.

mod sequence;
mod settings;
mod types;
mod version;

pub use sequence::{ManifestSequenceBuilder, NonSeedChanges, SequenceError};
pub use settings::{SettingsGenerator, FEDERATION_SECTION, SECURITY_SECTION};
pub use types::{Manifest, ManifestError, ManifestNode, SettingsSection};
pub use version::ManifestVersionAllocator;

