//! high-level operations over a patch registry

mod setup;

pub use setup::{apply_release, FailurePolicy, PatchFailure, SetupOptions, SetupReport};
