//! guest and host path types
//!
//! guest paths are POSIX paths inside the distro's own namespace. host paths
//! are whatever the host uses to reach that namespace (e.g. `\\wsl.localhost\Ubuntu`).
//! [`translate`] is the only way to get from one to the other.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// absolute POSIX path inside the guest filesystem
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestPath(String);

impl GuestPath {
    /// parse a guest path
    ///
    /// must start with `/`. `..` segments and NUL bytes are rejected, as is
    /// any segment the host would not treat as a single plain file name
    /// (e.g. `C:x` or `a\..` on Windows).
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(Error::InvalidPath(format!("{path:?} is not absolute")));
        }
        if path.contains('\0') {
            return Err(Error::InvalidPath(format!("{path:?} contains a NUL byte")));
        }
        if path.split('/').any(|seg| seg == "..") {
            return Err(Error::InvalidPath(format!(
                "{path:?} escapes the guest root"
            )));
        }
        if let Some(seg) = path
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .find(|seg| !is_plain_component(seg))
        {
            return Err(Error::InvalidPath(format!(
                "{path:?} has segment {seg:?} that is not a plain host file name"
            )));
        }
        Ok(Self(path))
    }

    /// resolve a symlink target found at this path, the way the guest would
    ///
    /// absolute targets start from the guest root, relative ones from this
    /// path's parent. `..` is folded lexically and stops at the root.
    pub fn join_link(&self, target: &str) -> Result<Self> {
        let mut segs: Vec<&str> = if target.starts_with('/') {
            Vec::new()
        } else {
            let mut parent: Vec<&str> = self.segments().collect();
            parent.pop();
            parent
        };

        for seg in target.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    segs.pop();
                }
                seg => segs.push(seg),
            }
        }

        Self::parse(format!("/{}", segs.join("/")))
    }

    /// the raw path string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// path components below the root, skipping empty and `.` segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
    }

    /// true for `/` (and spellings like `//` or `/./`)
    pub fn is_root(&self) -> bool {
        self.segments().next().is_none()
    }
}

impl fmt::Display for GuestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GuestPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for GuestPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<GuestPath> for String {
    fn from(value: GuestPath) -> Self {
        value.0
    }
}

/// host-native path, treated as an opaque prefix
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostPath(PathBuf);

impl HostPath {
    /// wrap a host path without looking at it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// borrow as a std path
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// unwrap into a std path
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for HostPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for HostPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

fn is_plain_component(seg: &str) -> bool {
    let mut components = Path::new(seg).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == seg
    )
}

/// resolve a guest path under a host prefix
///
/// each guest segment is pushed onto the prefix verbatim with the host's own
/// join rules. the prefix itself is never inspected.
pub fn translate(prefix: &HostPath, guest: &GuestPath) -> HostPath {
    let mut out = prefix.0.clone();
    for seg in guest.segments() {
        out.push(seg);
    }
    HostPath(out)
}

/// [`translate`] for raw strings, validating the guest side
pub fn translate_str(prefix: &str, guest: &str) -> Result<HostPath> {
    let guest = GuestPath::parse(guest)?;
    Ok(translate(&HostPath::new(prefix), &guest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_translate_wsl_localhost_prefix() {
        let prefix = HostPath::new(r"\\wsl.localhost\Ubuntu22.04LTS");
        let guest = GuestPath::parse("/root/here-I-am").unwrap();

        let host = translate(&prefix, &guest);

        let expected = Path::new(r"\\wsl.localhost\Ubuntu22.04LTS")
            .join("root")
            .join("here-I-am");
        assert_eq!(host.as_path(), expected);
    }

    #[test]
    fn test_translate_wsl_dollar_prefix() {
        // `$` is fine on the host side, the prefix is opaque
        let host = translate_str(r"\\wsl$\Ubuntu18.04LTS", "/root/here-I-am").unwrap();

        let expected = Path::new(r"\\wsl$\Ubuntu18.04LTS")
            .join("root")
            .join("here-I-am");
        assert_eq!(host.as_path(), expected);
    }

    #[cfg(windows)]
    #[test]
    fn test_translate_windows_literal() {
        let host = translate_str(
            r"\\host\DistroRoot",
            "/etc/systemd/system/funny.service.d/00-wsl.conf",
        )
        .unwrap();
        assert_eq!(
            host.as_path(),
            Path::new(r"\\host\DistroRoot\etc\systemd\system\funny.service.d\00-wsl.conf")
        );

        let host = translate_str(r"C:\\Temp", "/root/here-I-am").unwrap();
        assert_eq!(host.as_path(), Path::new(r"C:\\Temp\root\here-I-am"));
    }

    #[test]
    fn test_translate_root_is_prefix() {
        let prefix = HostPath::new("/srv/distro");
        let root = GuestPath::parse("/").unwrap();

        assert!(root.is_root());
        assert_eq!(translate(&prefix, &root), prefix);
    }

    #[test]
    fn test_translate_skips_empty_and_dot_segments() {
        let host = translate_str("/srv/distro", "//etc/./wsl.conf").unwrap();
        assert_eq!(host.as_path(), Path::new("/srv/distro/etc/wsl.conf"));
    }

    #[test]
    fn test_translate_keeps_segments_verbatim() {
        let host = translate_str("/srv/distro", "/etc/Some Dir/$weird:name").unwrap();
        assert_eq!(
            host.as_path(),
            Path::new("/srv/distro").join("etc").join("Some Dir").join("$weird:name")
        );
    }

    #[test]
    fn test_translate_is_pure() {
        let dir = tempdir().unwrap();
        let prefix = HostPath::new(dir.path().join("not-there"));
        let guest = GuestPath::parse("/a/b/c").unwrap();

        let first = translate(&prefix, &guest);
        let second = translate(&prefix, &guest);

        assert_eq!(first, second);
        assert!(!dir.path().join("not-there").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(matches!(
            GuestPath::parse("etc/fstab"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(GuestPath::parse(""), Err(Error::InvalidPath(_))));
        assert!(matches!(
            translate_str("/srv", "relative/path"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_parse_rejects_parent_segments() {
        assert!(matches!(
            GuestPath::parse("/etc/../../outside"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            GuestPath::parse("/etc/\0fstab"),
            Err(Error::InvalidPath(_))
        ));
        // dots inside a name are fine
        assert!(GuestPath::parse("/etc/..hidden").is_ok());
    }

    #[test]
    fn test_parse_accepts_posix_names() {
        // only the host splits on `\` or `:`; on unix these are plain names
        #[cfg(unix)]
        assert!(GuestPath::parse(r"/etc/a\b:c").is_ok());
        assert!(GuestPath::parse("/etc/systemd/system/funny.service.d/00-wsl.conf").is_ok());
    }

    #[cfg(windows)]
    #[test]
    fn test_parse_rejects_host_grammar_segments() {
        assert!(matches!(GuestPath::parse("/C:x"), Err(Error::InvalidPath(_))));
        assert!(matches!(
            GuestPath::parse(r"/a\..\..\outside"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            translate_str(r"\\host\DistroRoot", "/etc/C:evil"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_join_link_relative() {
        let link = GuestPath::parse("/etc/os-release").unwrap();
        let target = link.join_link("../usr/lib/os-release").unwrap();
        assert_eq!(target.as_str(), "/usr/lib/os-release");
    }

    #[test]
    fn test_join_link_absolute_and_clamped() {
        let link = GuestPath::parse("/etc/resolv.conf").unwrap();
        assert_eq!(
            link.join_link("/run/systemd/resolve/stub-resolv.conf")
                .unwrap()
                .as_str(),
            "/run/systemd/resolve/stub-resolv.conf"
        );
        // `..` past the root stays at the root
        assert_eq!(
            link.join_link("../../../../etc/hosts").unwrap().as_str(),
            "/etc/hosts"
        );
    }

    #[test]
    fn test_guest_path_serde_validates() {
        #[derive(Deserialize)]
        struct Wrapper {
            path: GuestPath,
        }

        let ok: Wrapper = toml::from_str(r#"path = "/etc/wsl.conf""#).unwrap();
        assert_eq!(ok.path.as_str(), "/etc/wsl.conf");

        let bad: std::result::Result<Wrapper, _> = toml::from_str(r#"path = "etc/wsl.conf""#);
        assert!(bad.is_err());
    }
}
