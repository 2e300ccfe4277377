use std::env;

use crate::error::{CoreError, CoreResult};

/// Pipeline-wide, immutable-per-run configuration (§3 `DetectorConfig`).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub skip_occlusion_check: bool,
    pub skip_albedo_check: bool,
    pub skip_face_cropping: bool,

    pub liveness_threshold: f64,
    pub liveness_model_weights: (f64, f64),
    pub liveness_iterations: u32,

    pub occlusion_threshold: f64,
    pub occlusion_iterations: u32,

    pub cosine_threshold: f64,
    pub sharpness_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            skip_occlusion_check: false,
            skip_albedo_check: false,
            skip_face_cropping: false,
            liveness_threshold: 0.75,
            liveness_model_weights: (0.5, 0.5),
            liveness_iterations: 3,
            occlusion_threshold: 0.7,
            occlusion_iterations: 3,
            cosine_threshold: 0.7,
            sharpness_threshold: 45.0,
        }
    }
}

impl DetectorConfig {
    /// Same defaults, but with the realtime-path sharpness threshold (§9 open
    /// question: 45.0 vs 100.0 apply to different call sites; this constructor
    /// is for callers that know they're on the realtime capture path).
    pub fn realtime() -> Self {
        Self {
            sharpness_threshold: 100.0,
            ..Self::default()
        }
    }

    /// Overlay environment variables on top of `default()`. Unset ⇒ default,
    /// set-but-invalid ⇒ error — the same rule `worker::Config::from_env` and
    /// `api-server::Config::from_env` apply to every variable they read.
    pub fn from_env() -> CoreResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            liveness_threshold: parse_env("LIVENESS_THRESHOLD", defaults.liveness_threshold)?,
            occlusion_threshold: parse_env("OCCLUSION_THRESHOLD", defaults.occlusion_threshold)?,
            cosine_threshold: parse_env("COSINE_THRESHOLD", defaults.cosine_threshold)?,
            sharpness_threshold: parse_env(
                "SHARPNESS_THRESHOLD",
                defaults.sharpness_threshold,
            )?,
            skip_albedo_check: parse_env("SKIP_ALBEDO_CHECK", defaults.skip_albedo_check)?,
            skip_occlusion_check: parse_env(
                "SKIP_OCCLUSION_CHECK",
                defaults.skip_occlusion_check,
            )?,
            skip_face_cropping: parse_env("SKIP_FACE_CROPPING", defaults.skip_face_cropping)?,
            ..defaults
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> CoreResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| CoreError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_match_spec_constants() {
        let c = DetectorConfig::default();
        assert_eq!(c.liveness_threshold, 0.75);
        assert_eq!(c.liveness_model_weights, (0.5, 0.5));
        assert_eq!(c.liveness_iterations, 3);
        assert_eq!(c.occlusion_threshold, 0.7);
        assert_eq!(c.occlusion_iterations, 3);
        assert_eq!(c.cosine_threshold, 0.7);
        assert_eq!(c.sharpness_threshold, 45.0);
        assert!(!c.skip_albedo_check);
    }

    #[test]
    fn realtime_overrides_only_sharpness() {
        let c = DetectorConfig::realtime();
        assert_eq!(c.sharpness_threshold, 100.0);
        assert_eq!(c.liveness_threshold, 0.75);
    }

    #[test]
    #[serial]
    fn from_env_defaults_when_unset() {
        for key in [
            "LIVENESS_THRESHOLD",
            "OCCLUSION_THRESHOLD",
            "COSINE_THRESHOLD",
            "SHARPNESS_THRESHOLD",
            "SKIP_ALBEDO_CHECK",
            "SKIP_OCCLUSION_CHECK",
            "SKIP_FACE_CROPPING",
        ] {
            env::remove_var(key);
        }
        let c = DetectorConfig::from_env().unwrap();
        assert_eq!(c, DetectorConfig::default());
    }

    #[test]
    #[serial]
    fn from_env_overlays_set_values() {
        env::set_var("LIVENESS_THRESHOLD", "0.8");
        env::set_var("SKIP_ALBEDO_CHECK", "true");
        let c = DetectorConfig::from_env().unwrap();
        assert_eq!(c.liveness_threshold, 0.8);
        assert!(c.skip_albedo_check);
        env::remove_var("LIVENESS_THRESHOLD");
        env::remove_var("SKIP_ALBEDO_CHECK");
    }

    #[test]
    #[serial]
    fn from_env_errors_on_invalid_value() {
        env::set_var("COSINE_THRESHOLD", "not_a_number");
        let err = DetectorConfig::from_env().unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        env::remove_var("COSINE_THRESHOLD");
    }
}
