use std::env;

use liveness_core::DetectorConfig;

/// Ambient configuration for the demo HTTP binary (§10 A4): bind port, where
/// encrypted models and the embeddings store live on disk, and the log
/// level — mirroring `worker::Config::from_env`'s shape. The pipeline's own
/// `DetectorConfig` is layered in separately via its own `from_env`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub model_dir: String,
    pub embeddings_path: String,
    pub model_key_path: String,
    #[allow(dead_code)]
    pub log_level: String,
    pub detector: DetectorConfig,
    /// Base URL of the optional remote verification service (§6
    /// `RemoteVerifyAPI`). `None` when unset — the collaborator is simply
    /// not wired in, matching the spec's "optional" designation.
    pub remote_verify_endpoint: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            model_dir: env::var("MODEL_DIR").unwrap_or_else(|_| "/models".to_string()),
            embeddings_path: env::var("EMBEDDINGS_PATH")
                .unwrap_or_else(|_| "/etc/embeddings/data.json".to_string()),
            model_key_path: env::var("MODEL_KEY_PATH")
                .unwrap_or_else(|_| "/etc/keys/model.key".to_string()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            detector: DetectorConfig::from_env()?,
            remote_verify_endpoint: env::var("REMOTE_VERIFY_ENDPOINT").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_defaults() {
        for key in [
            "PORT",
            "MODEL_DIR",
            "EMBEDDINGS_PATH",
            "MODEL_KEY_PATH",
            "RUST_LOG",
            "REMOTE_VERIFY_ENDPOINT",
        ] {
            env::remove_var(key);
        }
        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.model_dir, "/models");
        assert_eq!(config.embeddings_path, "/etc/embeddings/data.json");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.remote_verify_endpoint, None);
    }

    #[test]
    #[serial]
    fn from_env_custom() {
        env::set_var("PORT", "9090");
        env::set_var("MODEL_DIR", "/tmp/models");
        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.model_dir, "/tmp/models");
        env::remove_var("PORT");
        env::remove_var("MODEL_DIR");
    }

    #[test]
    #[serial]
    fn from_env_errors_on_invalid_port() {
        env::set_var("PORT", "not_a_port");
        assert!(ServiceConfig::from_env().is_err());
        env::remove_var("PORT");
    }
}
