//! Face-count admission gate.

use crate::domain::ScreeningError;

/// Admits a request only when exactly one face was detected.
///
/// # Errors
///
/// Returns [`ScreeningError::NoFace`] for zero faces and
/// [`ScreeningError::MultipleFaces`] for two or more.
pub fn admit(face_count: usize) -> Result<(), ScreeningError> {
    match face_count {
        0 => Err(ScreeningError::NoFace),
        1 => Ok(()),
        n => Err(ScreeningError::MultipleFaces(n)),
    }
}
