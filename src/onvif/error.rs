use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the transport, SOAP and session layers.
#[derive(Debug, Error)]
pub enum OnvifError {
    /// Socket, DNS or connection level failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response that did not carry a SOAP Fault.
    #[error("HTTP {status} {message}")]
    HttpStatus { status: u16, message: String },

    /// SOAP Fault returned by the device.
    #[error("SOAP fault: {0}")]
    RemoteFault(String),

    /// The response lacked the `{operation}Response` element.
    #[error("the device seems to not support the {0}() method")]
    UnsupportedOperation(String),

    #[error("failed to parse SOAP: {0}")]
    Parse(String),

    /// Caller-supplied parameters rejected before any network call.
    #[error("invalid parameter: {0}")]
    Validation(String),

    #[error("failed to initialize the device: {0}")]
    Initialization(String),

    #[error("failed to bind discovery socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("a discovery probe is already running")]
    ProbeInProgress,

    #[error("unexpected content: {0}")]
    UnexpectedContent(String),
}

impl OnvifError {
    /// True for errors raised below the SOAP layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            OnvifError::Transport(_) | OnvifError::Timeout(_) | OnvifError::HttpStatus { .. }
        )
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, OnvifError::UnsupportedOperation(_))
    }
}

pub type Result<T> = std::result::Result<T, OnvifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(OnvifError::Timeout(Duration::from_secs(3)).is_transport());
        assert!(OnvifError::HttpStatus { status: 500, message: "Internal Server Error".into() }
            .is_transport());
        assert!(!OnvifError::RemoteFault("ter:NotAuthorized".into()).is_transport());
        assert!(OnvifError::UnsupportedOperation("GetSystemDateAndTime".into()).is_unsupported());
    }

    #[test]
    fn test_display() {
        let err = OnvifError::UnsupportedOperation("GetCapabilities".into());
        assert_eq!(
            err.to_string(),
            "the device seems to not support the GetCapabilities() method"
        );
    }
}
