//! Defines error types.

use std::fmt::Debug;

/// Failure reported by the platform layer while issuing a request.
///
/// These are caught right at the platform call and never cross the bridge boundary;
/// see [`Error`] for the public form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform rejected an argument (e.g. an invalid scan filter).
    IllegalArgument(String),
    /// The platform is in the wrong state for the request (e.g. the adapter is off).
    IllegalState(String),
    /// The app lacks a runtime permission the request needs.
    Security(String),
    /// Any other exception thrown by the platform, or a failed JNI call.
    Java(String),
    /// The platform call could not even be queued.
    CallReturnedFalse,
    /// The platform returned no object where one was expected.
    NullResult,
}

impl std::error::Error for PlatformError {}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalArgument(msg) => write!(f, "illegal argument: {msg}"),
            Self::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            Self::Security(msg) => write!(f, "security exception: {msg}"),
            Self::Java(msg) => write!(f, "java exception: {msg}"),
            Self::CallReturnedFalse => write!(f, "platform call unexpectedly returned false"),
            Self::NullResult => write!(f, "platform call unexpectedly returned null"),
        }
    }
}

impl From<PlatformError> for Error {
    fn from(err: PlatformError) -> Self {
        let kind = match &err {
            PlatformError::IllegalArgument(_) => ErrorKind::InvalidParameter,
            PlatformError::IllegalState(_) => ErrorKind::NotReady,
            PlatformError::Security(_) => ErrorKind::NotAuthorized,
            PlatformError::Java(_)
            | PlatformError::CallReturnedFalse
            | PlatformError::NullResult => ErrorKind::Internal,
        };
        let msg = err.to_string();
        Error::new(kind, Some(err), msg)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            source: None,
            message: String::new(),
        }
    }
}

/// The error type for bridge operations.
///
/// Bridge operations report these only through the log; callers across the boundary
/// see a `false` return instead.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<PlatformError>,
    message: String,
}

impl Error {
    pub(crate) fn new<S: ToString>(
        kind: ErrorKind,
        source: Option<PlatformError>,
        message: S,
    ) -> Self {
        Error {
            kind,
            source,
            message: message.to_string(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.message.is_empty(), &self.source) {
            (true, None) => write!(f, "{}", &self.kind),
            (false, None) => write!(f, "{}: {}", &self.kind, &self.message),
            (_, Some(err)) => write!(f, "{}: {}", &self.kind, err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = x;
            x
        })
    }
}

/// A list of general categories of bridge error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// the Bluetooth adapter is not available
    AdapterUnavailable,
    /// the Bluetooth adapter is already scanning
    AlreadyScanning,
    /// the Bluetooth device isn't connected
    NotConnected,
    /// the Bluetooth operation is unsupported
    NotSupported,
    /// permission denied
    NotAuthorized,
    /// not ready
    NotReady,
    /// invalid parameter
    InvalidParameter,
    /// an internal error has occured
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::AdapterUnavailable => f.write_str("the Bluetooth adapter is not available"),
            ErrorKind::AlreadyScanning => f.write_str("the Bluetooth adapter is already scanning"),
            ErrorKind::NotConnected => f.write_str("the Bluetooth device isn't connected"),
            ErrorKind::NotSupported => f.write_str("the Bluetooth operation is unsupported"),
            ErrorKind::NotAuthorized => f.write_str("permission denied"),
            ErrorKind::NotReady => f.write_str("not ready"),
            ErrorKind::InvalidParameter => f.write_str("invalid parameter"),
            ErrorKind::Internal => f.write_str("an internal error has occured"),
        }
    }
}

/// Raw GATT status code delivered by a platform callback.
///
/// Status codes are forwarded verbatim to the native side; values below `0x100`
/// are ATT error codes, the rest are platform specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattStatus(pub i32);

impl GattStatus {
    /// The operation completed successfully.
    pub const SUCCESS: GattStatus = GattStatus(0);
    /// A remote device connection is congested.
    pub const CONNECTION_CONGESTED: GattStatus = GattStatus(0x8f);
    /// A GATT operation failed, errors other than the above.
    pub const FAILURE: GattStatus = GattStatus(0x101);

    /// Checks if the status reports success.
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Converts the status to an [`AttError`] if it lies in the ATT error range.
    pub fn att_error(self) -> Option<AttError> {
        u8::try_from(self.0).ok().map(AttError::from_u8)
    }
}

impl std::fmt::Display for GattStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.att_error() {
            Some(att) if *self != Self::CONNECTION_CONGESTED => write!(f, "{att}"),
            _ if *self == Self::CONNECTION_CONGESTED => f.write_str("Connection congested"),
            _ if *self == Self::FAILURE => f.write_str("GATT failure"),
            _ => write!(f, "Unknown GATT status {}", self.0),
        }
    }
}

// NOTE: Code below is migrated from <https://docs.rs/bluest/0.6.9/src/bluest/error.rs.html>.

/// Bluetooth Attribute Protocol error. See the Bluetooth Core Specification, Vol 3, Part F, §3.4.1.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttError(u8);

impl AttError {
    /// The operation completed successfully.
    pub const SUCCESS: AttError = AttError(0x00);
    /// The attribute handle given was not valid on this server.
    pub const INVALID_HANDLE: AttError = AttError(0x01);
    /// The attribute cannot be read.
    pub const READ_NOT_PERMITTED: AttError = AttError(0x02);
    /// The attribute cannot be written.
    pub const WRITE_NOT_PERMITTED: AttError = AttError(0x03);
    /// The attribute PDU was invalid.
    pub const INVALID_PDU: AttError = AttError(0x04);
    /// The attribute requires authentication before it can be read or written.
    pub const INSUFFICIENT_AUTHENTICATION: AttError = AttError(0x05);
    /// Attribute server does not support the request received from the client.
    pub const REQUEST_NOT_SUPPORTED: AttError = AttError(0x06);
    /// Offset specified was past the end of the attribute.
    pub const INVALID_OFFSET: AttError = AttError(0x07);
    /// The attribute requires authorization before it can be read or written.
    pub const INSUFFICIENT_AUTHORIZATION: AttError = AttError(0x08);
    /// The attribute value length is invalid for the operation.
    pub const INVALID_ATTRIBUTE_VALUE_LENGTH: AttError = AttError(0x0d);
    /// The attribute requires encryption before it can be read or written.
    pub const INSUFFICIENT_ENCRYPTION: AttError = AttError(0x0f);

    /// Converts a [`u8`] value to an [`AttError`].
    pub const fn from_u8(val: u8) -> Self {
        AttError(val)
    }

    /// Converts an [`AttError`] to a [`u8`] value.
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Checks if the error code is in the application error range.
    pub fn is_application(&self) -> bool {
        (0x80..0xa0).contains(&self.0)
    }
}

impl std::fmt::Display for AttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            AttError::SUCCESS => f.write_str("The operation completed successfully."),
            AttError::INVALID_HANDLE => f.write_str("The attribute handle given was not valid on this server."),
            AttError::READ_NOT_PERMITTED => f.write_str("The attribute cannot be read."),
            AttError::WRITE_NOT_PERMITTED => f.write_str("The attribute cannot be written."),
            AttError::INVALID_PDU => f.write_str("The attribute PDU was invalid."),
            AttError::INSUFFICIENT_AUTHENTICATION => f.write_str("The attribute requires authentication before it can be read or written."),
            AttError::REQUEST_NOT_SUPPORTED => f.write_str("Attribute server does not support the request received from the client."),
            AttError::INVALID_OFFSET => f.write_str("Offset specified was past the end of the attribute."),
            AttError::INSUFFICIENT_AUTHORIZATION => f.write_str("The attribute requires authorization before it can be read or written."),
            AttError::INVALID_ATTRIBUTE_VALUE_LENGTH => f.write_str("The attribute value length is invalid for the operation."),
            AttError::INSUFFICIENT_ENCRYPTION => f.write_str("The attribute requires encryption before it can be read or written."),
            _ => f.write_str(&format!("Unknown error 0x{:02x}", self.0)),
        }
    }
}

impl From<u8> for AttError {
    fn from(number: u8) -> Self {
        AttError(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_errors_map_to_kinds() {
        let err = Error::from(PlatformError::IllegalState("adapter is off".into()));
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert!(err.to_string().contains("adapter is off"));
        assert!(std::error::Error::source(&err).is_some());

        let err = Error::from(PlatformError::IllegalArgument("bad filter".into()));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let err = Error::from(PlatformError::Security("BLUETOOTH_SCAN".into()));
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        let err = Error::from(ErrorKind::AlreadyScanning);
        assert_eq!(err.to_string(), "the Bluetooth adapter is already scanning");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn gatt_status_att_range() {
        assert!(GattStatus::SUCCESS.is_success());
        assert_eq!(
            GattStatus(0x03).att_error(),
            Some(AttError::WRITE_NOT_PERMITTED)
        );
        assert_eq!(GattStatus::FAILURE.att_error(), None);
        assert_eq!(GattStatus::FAILURE.to_string(), "GATT failure");
        assert_eq!(GattStatus::CONNECTION_CONGESTED.to_string(), "Connection congested");
        assert!(AttError::from(0x85).is_application());
    }
}
