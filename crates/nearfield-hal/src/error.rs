//! Error types for controller and tag operations.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving the NFC controller or a tag.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Controller initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Controller de-initialization failed.
    #[error("De-initialization failed: {message}")]
    DeinitializationFailed { message: String },

    /// Controller communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// The tag left the RF field mid-operation.
    #[error("Tag lost")]
    TagLost,

    /// A tag I/O transaction failed without the tag leaving the field.
    #[error("Tag I/O error: {message}")]
    TagIo { message: String },

    /// Operation is not supported by this controller.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Invalid data received from the controller.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new initialization failure.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new de-initialization failure.
    pub fn deinitialization_failed(message: impl Into<String>) -> Self {
        Self::DeinitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new tag I/O error.
    pub fn tag_io(message: impl Into<String>) -> Self {
        Self::TagIo {
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let error = HardwareError::initialization_failed("firmware download stalled");
        assert_eq!(
            error.to_string(),
            "Initialization failed: firmware download stalled"
        );

        let error = HardwareError::TagLost;
        assert_eq!(error.to_string(), "Tag lost");

        let error = HardwareError::unsupported("route_aid");
        assert_eq!(error.to_string(), "Unsupported operation: route_aid");
    }
}
