//! applies a single patch to a guest file through the host prefix
//!
//! resolve -> create parents -> read (or empty) -> transform -> write back.
//! nothing is written unless the transformation finished successfully.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, IoResultExt, Result};
use crate::patch::PatchSpec;
use crate::path::{translate, GuestPath, HostPath};

/// symlink hops followed before giving up, same limit as linux
const MAX_SYMLINK_HOPS: usize = 40;

/// how the new contents reach the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// temp file in the same directory, fsync, rename over the destination
    #[default]
    Atomic,
    /// truncate and write the destination directly
    InPlace,
}

/// options for [`apply`]
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub write_mode: WriteMode,
    /// transform but create and write nothing
    pub dry_run: bool,
}

/// what happened to the destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// file did not exist and was created
    Created,
    /// file existed and its contents changed
    Rewritten,
    /// transformation produced the existing contents, nothing written
    Unchanged,
}

impl PatchStatus {
    /// lowercase name for output
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStatus::Created => "created",
            PatchStatus::Rewritten => "rewritten",
            PatchStatus::Unchanged => "unchanged",
        }
    }
}

/// result of a successful [`apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub path: HostPath,
    pub status: PatchStatus,
}

/// apply `spec` to the guest tree visible at `prefix`
///
/// if the guest file is a symlink it is followed inside the guest root and
/// the link's target is patched; the link itself is left alone. the outcome
/// reports the host path that was actually written.
///
/// callers must serialize applies against the same guest root; no locking
/// is done here.
pub fn apply(spec: &PatchSpec, prefix: &HostPath, options: &ApplyOptions) -> Result<PatchOutcome> {
    let dest = resolve_destination(prefix, &spec.path)?;
    let dest_path = dest.as_path();
    debug!("{} -> {}", spec.path, dest);

    if !options.dry_run {
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreation {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let original = read_existing(dest_path)?;
    let input = original.as_deref().unwrap_or_default();

    let updated = spec
        .transformation
        .transform_to_vec(input)
        .map_err(|source| Error::TransformationFailure {
            path: dest_path.to_path_buf(),
            name: spec.transformation.name().to_string(),
            source,
        })?;

    let status = match &original {
        None => PatchStatus::Created,
        Some(old) if *old == updated => PatchStatus::Unchanged,
        Some(_) => PatchStatus::Rewritten,
    };

    if options.dry_run {
        debug!(
            "dry run: {} would be {} by {}",
            dest,
            status.as_str(),
            spec.transformation.name()
        );
    } else if status != PatchStatus::Unchanged {
        match options.write_mode {
            WriteMode::Atomic => write_atomic(dest_path, &updated)?,
            WriteMode::InPlace => fs::write(dest_path, &updated).map_err(|source| Error::Write {
                path: dest_path.to_path_buf(),
                source,
            })?,
        }
        info!(
            "{} {} by {}",
            dest,
            status.as_str(),
            spec.transformation.name()
        );
    } else {
        debug!("{} already up to date", dest);
    }

    Ok(PatchOutcome {
        path: dest,
        status,
    })
}

/// follow symlinks at the final path component with guest semantics
///
/// link targets are guest paths, so an absolute target like
/// `/usr/lib/os-release` is resolved under `prefix`, never on the host.
fn resolve_destination(prefix: &HostPath, guest: &GuestPath) -> Result<HostPath> {
    let mut current = guest.clone();

    for _ in 0..MAX_SYMLINK_HOPS {
        let host = translate(prefix, &current);
        // missing or unreadable entries are not links; the read reports them
        let is_link = fs::symlink_metadata(host.as_path())
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link {
            return Ok(host);
        }

        let target = fs::read_link(host.as_path()).with_path(host.as_path())?;
        let target = target.to_str().ok_or_else(|| {
            Error::InvalidPath(format!("{} links to a non-utf8 target", current))
        })?;
        let next = current.join_link(target)?;
        debug!("{} is a symlink to {}", current, next);
        current = next;
    }

    Err(Error::SymlinkLoop(guest.to_string()))
}

/// read the destination, `None` if it does not exist
fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// atomic write: temp -> fsync -> rename
///
/// the temp file lives next to the destination so the rename never crosses a
/// filesystem. an existing file's permissions are carried over.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp_path = temp_path_for(path);

    let result = (|| -> std::io::Result<()> {
        {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(content)?;
            tmp_file.sync_all()?;
        }
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(&tmp_path, meta.permissions())?;
        }
        fs::rename(&tmp_path, path)
    })();

    result.map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;

    // fsync parent directory so the rename itself survives a crash
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        let dir = File::open(parent).with_path(parent)?;
        dir.sync_all().with_path(parent)?;
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}
