use std::path::{Component, Path};

use crate::TransferError;

/// Validates that an upload name is a single plain file name.
///
/// The store derives part and metadata file names from it, so it must not
/// carry directories.
///
/// Rejects:
/// - Empty names
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
/// - Any separator, including `\` on every platform
/// - `.` and `..`
/// - NUL bytes
pub fn validate_upload_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidName(format!(
            "separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir | Component::CurDir), None) => Err(
            TransferError::InvalidName(format!("relative marker not allowed: {name}")),
        ),
        _ => Err(TransferError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(validate_upload_name("").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(validate_upload_name("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(validate_upload_name(".").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_upload_name("../../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_subdirectory() {
        assert!(validate_upload_name("sub/file.wav").is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(validate_upload_name("/tmp/malicious").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(validate_upload_name("C:\\Windows\\evil").is_err());
    }

    #[test]
    fn rejects_nul() {
        assert!(validate_upload_name("a\0b").is_err());
    }

    #[test]
    fn accepts_simple_filename() {
        assert!(validate_upload_name("song.wav").is_ok());
    }

    #[test]
    fn accepts_dotfile() {
        assert!(validate_upload_name(".hidden.mp3").is_ok());
    }

    #[test]
    fn accepts_spaces_and_unicode() {
        assert!(validate_upload_name("Mi canción (live).mp3").is_ok());
    }
}
