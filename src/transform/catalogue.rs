//! reusable content rewriters backing the [`Transformation`](super::Transformation) variants

use std::io::{self, Write};

/// root filesystem label shipped in cloud image mount tables
///
/// it points at a device that never exists under WSL and stalls mount units.
pub const CLOUDIMG_ROOTFS_LABEL: &str = "LABEL=cloudimg-rootfs";

/// copy `original` line by line, dropping lines whose content starts with `label`
///
/// leading whitespace is ignored when matching. kept lines are copied verbatim
/// with their terminators, except that removing the final line also removes
/// the line break in front of it, so no dangling separator is left behind.
pub fn remove_label_line(original: &[u8], label: &[u8], output: &mut dyn Write) -> io::Result<()> {
    // each kept line owes its break to the next kept line
    let mut pending: &[u8] = &[];
    let mut wrote_any = false;
    let mut last_kept = true;

    for line in original.split_inclusive(|b| *b == b'\n') {
        let content = line
            .strip_suffix(b"\r\n")
            .or_else(|| line.strip_suffix(b"\n"))
            .unwrap_or(line);
        let terminator = &line[content.len()..];

        if is_label_line(content, label) {
            last_kept = false;
            continue;
        }

        if wrote_any {
            output.write_all(pending)?;
        }
        output.write_all(content)?;
        pending = terminator;
        wrote_any = true;
        last_kept = true;
    }

    if wrote_any && last_kept {
        output.write_all(pending)?;
    }

    output.flush()
}

fn is_label_line(content: &[u8], label: &[u8]) -> bool {
    !label.is_empty() && content.trim_ascii().starts_with(label)
}

/// ignore the original, write `contents`
pub fn replace(contents: &[u8], output: &mut dyn Write) -> io::Result<()> {
    output.write_all(contents)?;
    output.flush()
}

/// copy the original verbatim, then `contents`
pub fn append(original: &[u8], contents: &[u8], output: &mut dyn Write) -> io::Result<()> {
    output.write_all(original)?;
    output.write_all(contents)?;
    output.flush()
}

/// like [`append`], but a no-op when `contents` already occurs in the original
///
/// a newline is inserted between a non-empty original without one and the
/// appended block.
pub fn ensure_contains(original: &[u8], contents: &[u8], output: &mut dyn Write) -> io::Result<()> {
    output.write_all(original)?;
    if contents.is_empty() || contains(original, contents) {
        return output.flush();
    }
    if !original.is_empty() && !original.ends_with(b"\n") {
        output.write_all(b"\n")?;
    }
    output.write_all(contents)?;
    output.flush()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
