use crate::domain::error::StoreError;
use crate::domain::error::StoreError::{InvalidFilename, MissingFilename};
use std::path::{Path, PathBuf};

/// Reduce an untrusted filename to its last path segment.
///
/// Both `/` and `\` count as separators so Windows-style client paths are
/// stripped the same way on every platform.
pub fn base_name(raw: Option<&str>) -> Result<&str, StoreError> {
    let raw = raw.filter(|name| !name.is_empty()).ok_or(MissingFilename)?;

    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .find(|segment| !segment.is_empty())
        .unwrap_or("");

    match name {
        "" | "." | ".." => Err(InvalidFilename {
            filename: raw.to_string(),
        }),
        name if name.contains('\0') => Err(InvalidFilename {
            filename: raw.to_string(),
        }),
        name => Ok(name),
    }
}

/// Join a filename onto `root`, refusing anything that lands outside it.
pub fn resolve(root: &Path, raw: Option<&str>) -> Result<PathBuf, StoreError> {
    let name = base_name(raw)?;
    let resolved = root.join(name);

    if resolved.parent() != Some(root) {
        return Err(InvalidFilename {
            filename: name.to_string(),
        });
    }
    Ok(resolved)
}
