use std::path::{Path, PathBuf};

use crate::error::{PubupError, Result};

/// Directories a project root must never resolve into.
const FORBIDDEN_ROOTS: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Validate and canonicalise a project root before anything touches it.
pub fn validate_project_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();

    let canonical = path.canonicalize().map_err(|e| {
        PubupError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
    })?;

    if !canonical.is_dir() {
        return Err(PubupError::ProjectValidation(format!(
            "Path '{}' is not a directory",
            canonical.display()
        )));
    }

    for forbidden in FORBIDDEN_ROOTS {
        if canonical.starts_with(forbidden) {
            return Err(PubupError::ProjectValidation(format!(
                "Refusing to operate inside system directory '{forbidden}'"
            )));
        }
    }

    Ok(canonical)
}

/// Ensure `candidate` resolves inside `root`; returns the canonical path.
///
/// Guards every write-back and git staging step against traversal out of
/// the project tree.
pub fn ensure_within(candidate: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<PathBuf> {
    let candidate = candidate.as_ref();
    let root = root.as_ref();

    let canonical_root = root.canonicalize().map_err(|e| {
        PubupError::ProjectValidation(format!("Invalid base directory '{}': {e}", root.display()))
    })?;

    // The candidate may not exist yet (a fresh write); canonicalise its
    // parent instead and re-attach the file name.
    let canonical = match candidate.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => {
            let parent = candidate.parent().ok_or_else(|| {
                PubupError::ProjectValidation(format!(
                    "Path '{}' has no parent directory",
                    candidate.display()
                ))
            })?;
            let file_name = candidate.file_name().ok_or_else(|| {
                PubupError::ProjectValidation(format!(
                    "Path '{}' has no file name",
                    candidate.display()
                ))
            })?;
            parent
                .canonicalize()
                .map_err(|e| {
                    PubupError::ProjectValidation(format!(
                        "Invalid path '{}': {e}",
                        candidate.display()
                    ))
                })?
                .join(file_name)
        }
    };

    if !canonical.starts_with(&canonical_root) {
        return Err(PubupError::ProjectValidation(format!(
            "Path '{}' escapes the project root",
            candidate.display()
        )));
    }

    Ok(canonical)
}
