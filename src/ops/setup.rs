//! apply every patch a release needs, in registry order

use log::{debug, warn};

use crate::engine::{self, ApplyOptions, PatchOutcome, PatchStatus};
use crate::error::Result;
use crate::path::{GuestPath, HostPath};
use crate::registry::PatchRegistry;

/// what to do when one patch fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// stop and return the error
    #[default]
    Abort,
    /// record the failure and move on to the next patch
    Continue,
}

/// setup options
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub apply: ApplyOptions,
    pub on_failure: FailurePolicy,
}

/// a patch that failed under [`FailurePolicy::Continue`]
#[derive(Debug)]
pub struct PatchFailure {
    pub path: GuestPath,
    pub error: crate::Error,
}

/// per-run results
#[derive(Debug, Default)]
pub struct SetupReport {
    pub applied: Vec<PatchOutcome>,
    pub failed: Vec<PatchFailure>,
}

impl SetupReport {
    pub fn created(&self) -> usize {
        self.count(PatchStatus::Created)
    }

    pub fn rewritten(&self) -> usize {
        self.count(PatchStatus::Rewritten)
    }

    pub fn unchanged(&self) -> usize {
        self.count(PatchStatus::Unchanged)
    }

    /// true when no patch failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn count(&self, status: PatchStatus) -> usize {
        self.applied.iter().filter(|o| o.status == status).count()
    }
}

/// apply the effective patch set of `release` under `prefix`
///
/// patches run one at a time in registry order.
pub fn apply_release(
    registry: &PatchRegistry,
    release: &str,
    prefix: &HostPath,
    options: &SetupOptions,
) -> Result<SetupReport> {
    let patches = registry.effective_patches(release);
    debug!(
        "applying {} patches for release {:?} under {}",
        patches.len(),
        release,
        prefix
    );

    let mut report = SetupReport::default();

    for spec in &patches {
        match engine::apply(spec, prefix, &options.apply) {
            Ok(outcome) => report.applied.push(outcome),
            Err(e) => match options.on_failure {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Continue => {
                    warn!("patch for {} failed: {}", spec.path, e);
                    report.failed.push(PatchFailure {
                        path: spec.path.clone(),
                        error: e,
                    });
                }
            },
        }
    }

    Ok(report)
}
