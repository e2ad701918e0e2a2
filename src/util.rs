use log::warn;

use crate::error::PlatformError;

pub(crate) trait OptionExt<T> {
    fn non_null(self) -> Result<T, crate::Error>;
}

impl<T> OptionExt<T> for Option<T> {
    #[track_caller]
    fn non_null(self) -> Result<T, crate::Error> {
        self.ok_or_else(|| PlatformError::NullResult.into())
    }
}

pub(crate) trait BoolExt {
    fn non_false(self) -> Result<(), crate::Error>;
}

impl BoolExt for bool {
    #[track_caller]
    fn non_false(self) -> Result<(), crate::Error> {
        self.then_some(())
            .ok_or_else(|| PlatformError::CallReturnedFalse.into())
    }
}

/// Flattens a platform call that may both fail and return `false`.
pub(crate) fn queued(result: Result<bool, PlatformError>) -> Result<(), crate::Error> {
    result.map_err(crate::Error::from).and_then(|b| b.non_false())
}

pub(crate) trait ResultExt {
    /// Logs the error of a bridge operation and reduces it to "request accepted".
    fn accepted(self, operation: &str) -> bool;
}

impl ResultExt for Result<(), crate::Error> {
    fn accepted(self, operation: &str) -> bool {
        match self {
            Ok(()) => true,
            Err(e) => {
                warn!("{operation} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn queued_flattens_platform_results() {
        assert!(queued(Ok(true)).is_ok());
        assert_eq!(queued(Ok(false)).unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(
            queued(Err(PlatformError::IllegalState("off".into())))
                .unwrap_err()
                .kind(),
            ErrorKind::NotReady
        );
    }

    #[test]
    fn accepted_reduces_to_bool() {
        assert!(Ok::<(), crate::Error>(()).accepted("op"));
        assert!(!Err::<(), _>(crate::Error::from(ErrorKind::NotConnected)).accepted("op"));
        assert_eq!(None::<u8>.non_null().unwrap_err().kind(), ErrorKind::Internal);
    }
}
