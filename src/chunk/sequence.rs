//! Sequence numbers embedded in chunk file names.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Sequence number assigned to chunks whose name carries no usable number.
pub const UNNUMBERED: i64 = -1;

/// Extracts the first run of decimal digits from the file name of `path`.
///
/// Only the base name is inspected, so digits in parent directories are
/// ignored. Names without digits, or whose digits overflow an `i64`, get
/// [`UNNUMBERED`] and therefore sort ahead of every numbered chunk.
pub fn sequence_number(path: &Path) -> i64 {
    let Some(name) = path.file_name() else {
        return UNNUMBERED;
    };
    let name = name.to_string_lossy();

    DIGITS
        .find(&name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(UNNUMBERED)
}
