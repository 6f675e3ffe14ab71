use std::io::ErrorKind;
use std::path::Path;

use rnp_core::error::RnpError;

/// Map a failed read of `path` onto the pipeline's error taxonomy
pub(crate) fn read_error(path: &Path, err: std::io::Error) -> RnpError {
    match err.kind() {
        ErrorKind::NotFound => RnpError::InputNotFound(path.to_path_buf()),
        _ => RnpError::Io(format!("{}: {err}", path.display())),
    }
}

/// Map a failed write of `path` onto the pipeline's error taxonomy
pub(crate) fn write_error(path: &Path, err: std::io::Error) -> RnpError {
    match err.kind() {
        ErrorKind::PermissionDenied => RnpError::WritePermissionDenied(path.to_path_buf()),
        _ => RnpError::Io(format!("{}: {err}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Error;

    #[test]
    fn test_not_found_maps_to_input_not_found() {
        let err = read_error(Path::new("a/cameras.txt"), Error::from(ErrorKind::NotFound));
        assert!(matches!(err, RnpError::InputNotFound(p) if p == Path::new("a/cameras.txt")));
    }

    #[test]
    fn test_other_read_errors_map_to_io() {
        let err = read_error(Path::new("x"), Error::from(ErrorKind::InvalidData));
        assert!(matches!(err, RnpError::Io(_)));
    }

    #[test]
    fn test_permission_denied_maps_to_write_permission() {
        let err = write_error(Path::new("out.json"), Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(err, RnpError::WritePermissionDenied(_)));
    }
}
