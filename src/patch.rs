use crate::engine::{self, ApplyOptions, PatchOutcome};
use crate::error::Result;
use crate::path::{translate, GuestPath, HostPath};
use crate::transform::Transformation;

/// a guest config file and the transformation that owns it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchSpec {
    pub path: GuestPath,
    pub transformation: Transformation,
}

impl PatchSpec {
    /// create a patch spec
    pub fn new(path: GuestPath, transformation: Transformation) -> Self {
        Self {
            path,
            transformation,
        }
    }

    /// build from a raw guest path string
    pub fn parse(path: &str, transformation: Transformation) -> Result<Self> {
        Ok(Self::new(GuestPath::parse(path)?, transformation))
    }

    /// where this patch lands under `prefix`
    pub fn host_path(&self, prefix: &HostPath) -> HostPath {
        translate(prefix, &self.path)
    }

    /// apply with default options
    pub fn apply(&self, prefix: &HostPath) -> Result<PatchOutcome> {
        engine::apply(self, prefix, &ApplyOptions::default())
    }
}
