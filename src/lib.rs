//! wslpatch - patch guest config files of a WSL distro from the host side
//!
//! during first-launch setup nothing runs inside the distro yet, so config
//! files are edited through the host-visible distro root
//! (e.g. `\\wsl.localhost\Ubuntu-22.04`).
//!
//! # Core concepts
//!
//! - **GuestPath**: absolute POSIX path inside the distro (`/etc/fstab`)
//! - **HostPath**: host-native path; the distro root is an opaque prefix
//! - **Transformation**: old file contents (or nothing) -> new file contents
//! - **PatchSpec**: a guest path plus the transformation that owns it
//! - **PatchRegistry**: patches for every release plus per-release extras
//!
//! # Example usage
//!
//! ```no_run
//! use wslpatch::{ops, HostPath, PatchRegistry};
//!
//! let registry = PatchRegistry::builtin().unwrap();
//! let prefix = HostPath::new(r"\\wsl.localhost\Ubuntu-22.04");
//!
//! let report = ops::apply_release(&registry, "Ubuntu-22.04", &prefix, &Default::default()).unwrap();
//! assert!(report.is_success());
//! ```

mod config;
mod error;
mod patch;
mod path;
mod registry;

pub mod engine;
pub mod ops;
pub mod transform;

pub use config::{PatchEntry, RegistryConfig, ReleaseEntry};
pub use engine::{apply, ApplyOptions, PatchOutcome, PatchStatus, WriteMode};
pub use error::{Error, IoResultExt, Result};
pub use patch::PatchSpec;
pub use path::{translate, translate_str, GuestPath, HostPath};
pub use registry::{PatchRegistry, RegistryBuilder};
pub use transform::{Transform, Transformation, CLOUDIMG_ROOTFS_LABEL};
