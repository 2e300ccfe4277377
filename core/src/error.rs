use thiserror::Error;

/// Every way a `detect_liveness` call can end without producing a `LivenessVerdict`,
/// plus the transient/fatal conditions components raise on the way there (§7).
///
/// A failure that §7 maps to a *verdict* (quality, albedo, occlusion, liveness,
/// no-face) is never represented here — the pipeline turns those into
/// `LivenessVerdict::spoof(..)` directly. `CoreError` is reserved for conditions
/// that abort the call before any verdict can be formed.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Model load failed for '{name}': {detail}")]
    ModelLoadFailed { name: String, detail: String },

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_image_display() {
        let err = CoreError::InvalidImage("too small".to_string());
        assert_eq!(err.to_string(), "Invalid image: too small");
    }

    #[test]
    fn model_load_failed_display() {
        let err = CoreError::ModelLoadFailed {
            name: "pnet".to_string(),
            detail: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "Model load failed for 'pnet': bad key");
    }

    #[test]
    fn cancelled_display() {
        assert_eq!(CoreError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn config_display() {
        let err = CoreError::Config("COSINE_THRESHOLD: invalid float literal".to_string());
        assert_eq!(
            err.to_string(),
            "Config error: COSINE_THRESHOLD: invalid float literal"
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let core_err: CoreError = io_err.into();
        assert!(core_err.to_string().contains("IO error"));
    }
}
