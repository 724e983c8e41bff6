//! content transformations
//!
//! a transformation turns the current bytes of a guest file (empty if the file
//! does not exist yet) into the bytes that should replace them. it never
//! touches the filesystem itself; the engine does all I/O.

pub mod catalogue;

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use catalogue::CLOUDIMG_ROOTFS_LABEL;

/// a code-supplied content rewriter
///
/// implement this for transformations that are not in the catalogue and wrap
/// them with [`Transformation::custom`].
pub trait Transform: Send + Sync {
    /// short name used in logs and errors
    fn name(&self) -> &str;

    /// write the new contents for `original` into `output`
    ///
    /// an error means the output is incomplete and must not be written back.
    fn transform(&self, original: &[u8], output: &mut dyn Write) -> io::Result<()>;
}

/// a named transformation
///
/// catalogue variants compare by tag and parameters, [`Transformation::Custom`]
/// compares by identity of the shared rewriter.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformation {
    /// drop every line whose trimmed content starts with `label`
    RemoveLabelLine { label: String },
    /// discard the original, write `contents`
    Replace { contents: String },
    /// keep the original, append `contents`
    Append { contents: String },
    /// keep the original, append `contents` unless it is already there
    EnsureContains { contents: String },
    #[serde(skip)]
    Custom(Arc<dyn Transform>),
}

impl Transformation {
    /// strips the cloud image root filesystem label from a mount table
    pub fn remove_cloud_img_label() -> Self {
        Self::RemoveLabelLine {
            label: CLOUDIMG_ROOTFS_LABEL.to_string(),
        }
    }

    /// full-content synthesis, the original is discarded
    pub fn replace(contents: impl Into<String>) -> Self {
        Self::Replace {
            contents: contents.into(),
        }
    }

    /// original verbatim, then `contents`
    pub fn append(contents: impl Into<String>) -> Self {
        Self::Append {
            contents: contents.into(),
        }
    }

    /// append `contents` once; later runs leave the file alone
    pub fn ensure_contains(contents: impl Into<String>) -> Self {
        Self::EnsureContains {
            contents: contents.into(),
        }
    }

    /// wrap a code-supplied transformation
    pub fn custom(transform: impl Transform + 'static) -> Self {
        Self::Custom(Arc::new(transform))
    }

    /// short name used in logs, errors and the `kind` tag
    pub fn name(&self) -> &str {
        match self {
            Self::RemoveLabelLine { .. } => "remove_label_line",
            Self::Replace { .. } => "replace",
            Self::Append { .. } => "append",
            Self::EnsureContains { .. } => "ensure_contains",
            Self::Custom(t) => t.name(),
        }
    }

    /// run the transformation
    pub fn transform(&self, original: &[u8], output: &mut dyn Write) -> io::Result<()> {
        match self {
            Self::RemoveLabelLine { label } => {
                catalogue::remove_label_line(original, label.as_bytes(), output)
            }
            Self::Replace { contents } => catalogue::replace(contents.as_bytes(), output),
            Self::Append { contents } => catalogue::append(original, contents.as_bytes(), output),
            Self::EnsureContains { contents } => {
                catalogue::ensure_contains(original, contents.as_bytes(), output)
            }
            Self::Custom(t) => t.transform(original, output),
        }
    }

    /// run the transformation into a fresh buffer
    pub fn transform_to_vec(&self, original: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(original.len());
        self.transform(original, &mut out)?;
        Ok(out)
    }
}

impl PartialEq for Transformation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::RemoveLabelLine { label: a }, Self::RemoveLabelLine { label: b }) => a == b,
            (Self::Replace { contents: a }, Self::Replace { contents: b }) => a == b,
            (Self::Append { contents: a }, Self::Append { contents: b }) => a == b,
            (Self::EnsureContains { contents: a }, Self::EnsureContains { contents: b }) => {
                a == b
            }
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Transformation {}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveLabelLine { label } => f
                .debug_struct("RemoveLabelLine")
                .field("label", label)
                .finish(),
            Self::Replace { contents } => {
                f.debug_struct("Replace").field("contents", contents).finish()
            }
            Self::Append { contents } => f.debug_struct("Append").field("contents", contents).finish(),
            Self::EnsureContains { contents } => f
                .debug_struct("EnsureContains")
                .field("contents", contents)
                .finish(),
            Self::Custom(t) => f.debug_tuple("Custom").field(&t.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout;

    impl Transform for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn transform(&self, original: &[u8], output: &mut dyn Write) -> io::Result<()> {
            output.write_all(&original.to_ascii_uppercase())
        }
    }

    #[test]
    fn test_catalogue_equality_by_parameters() {
        assert_eq!(
            Transformation::remove_cloud_img_label(),
            Transformation::RemoveLabelLine {
                label: "LABEL=cloudimg-rootfs".into()
            }
        );
        assert_ne!(
            Transformation::append("x"),
            Transformation::ensure_contains("x")
        );
        assert_ne!(Transformation::replace("a"), Transformation::replace("b"));
    }

    #[test]
    fn test_custom_equality_by_identity() {
        let a = Transformation::custom(Shout);
        let b = Transformation::custom(Shout);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.name(), "shout");
    }

    #[test]
    fn test_custom_transform_runs() {
        let t = Transformation::custom(Shout);
        assert_eq!(t.transform_to_vec(b"quiet").unwrap(), b"QUIET");
    }

    #[test]
    fn test_serde_tagged() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            t: Transformation,
        }

        let parsed: Wrapper = toml::from_str(
            r#"t = { kind = "remove_label_line", label = "LABEL=cloudimg-rootfs" }"#,
        )
        .unwrap();
        assert_eq!(parsed.t, Transformation::remove_cloud_img_label());

        let out = toml::to_string(&Wrapper {
            t: Transformation::append("[boot]\nsystemd=true\n"),
        })
        .unwrap();
        assert!(out.contains("append"));
    }
}
