//! Output path derivation.

use std::path::PathBuf;

use crate::{Error, Result};

const SEPARATORS: [char; 2] = ['/', '\\'];
const WRAPPER_EXTENSION: &str = ".pfile";
const SUFFIX: &str = "_modified";

/// Returns the extension of the final path segment, including the dot.
fn extension_of(path: &str) -> &str {
    let file_name = match path.rfind(SEPARATORS) {
        Some(index) => &path[index + 1..],
        None => path,
    };
    match file_name.rfind('.') {
        Some(index) => &file_name[index..],
        None => "",
    }
}

/// Derives the path a modified document is written to.
///
/// The result is `<name>_modified<extension>`, where `.pfile` wrappers keep
/// the wrapped extension: `report.docx.pfile` becomes
/// `report_modified.docx.pfile`. Any directory part of `file_name` is kept.
/// Both `/` and `\` are treated as separators.
///
/// Fails with [`Error::InvalidArgument`] if `file_name` has no final segment.
///
/// # Example
///
/// ```rust
/// use docseal::workflow::derive_output_path;
/// use std::path::PathBuf;
///
/// assert_eq!(derive_output_path("report.docx")?, PathBuf::from("report_modified.docx"));
/// assert_eq!(
///     derive_output_path("out/report.docx.pfile")?,
///     PathBuf::from("out/report_modified.docx.pfile"),
/// );
/// # Ok::<(), docseal::Error>(())
/// ```
pub fn derive_output_path(file_name: &str) -> Result<PathBuf> {
    if file_name.is_empty() || file_name.ends_with(SEPARATORS) {
        return Err(Error::invalid_argument(format!(
            "Cannot derive an output path from '{}': no file name",
            file_name
        )));
    }

    let mut extension_len = extension_of(file_name).len();
    let stem = &file_name[..file_name.len() - extension_len];
    if file_name[stem.len()..].eq_ignore_ascii_case(WRAPPER_EXTENSION) {
        extension_len += extension_of(stem).len();
    }

    let (stem, extension) = file_name.split_at(file_name.len() - extension_len);
    Ok(PathBuf::from(format!("{}{}{}", stem, SUFFIX, extension)))
}
