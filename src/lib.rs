//! Apply and inspect IPS patches.

pub mod backup;
pub mod error;
pub mod ips;

pub use error::{Field, IpsError, Result};
pub use ips::{apply, apply_to_buffer, patch, show_patches, ApplySummary, Decoder, PatchRecord};
