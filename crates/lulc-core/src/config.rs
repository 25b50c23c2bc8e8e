//! Run configuration, loadable from JSON.
//!
//! ```json
//! { "block_rows": 512, "align": "intersection", "from_nodata": -9999 }
//! ```
//!
//! Every field is optional; command-line flags are applied on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::align::AlignMode;
use crate::engine::EngineOptions;
use crate::error::{Result, TransitionError};
use crate::legend::DEFAULT_NODATA_CODE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransitionConfig {
    /// Rows per streamed band. Unset follows the "from" raster's strip or
    /// tile height.
    pub block_rows: Option<usize>,
    pub align: AlignMode,
    /// Overrides the nodata value stored in the "from" raster.
    pub from_nodata: Option<f64>,
    /// Overrides the nodata value stored in the "to" raster.
    pub to_nodata: Option<f64>,
    /// Code written where both inputs are nodata.
    pub nodata_code: i32,
    pub progress_interval_secs: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            block_rows: None,
            align: AlignMode::Strict,
            from_nodata: None,
            to_nodata: None,
            nodata_code: DEFAULT_NODATA_CODE,
            progress_interval_secs: 5.0,
        }
    }
}

impl TransitionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TransitionError::io(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            TransitionError::InvalidArgument(format!("config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_rows == Some(0) {
            return Err(TransitionError::InvalidArgument(
                "block_rows must be at least 1".into(),
            ));
        }
        if self.nodata_code >= 0 {
            return Err(TransitionError::InvalidArgument(format!(
                "nodata_code must be negative, got {}",
                self.nodata_code
            )));
        }
        if !self.progress_interval_secs.is_finite() || self.progress_interval_secs < 0.0 {
            return Err(TransitionError::InvalidArgument(format!(
                "progress_interval_secs must be a non-negative number, got {}",
                self.progress_interval_secs
            )));
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            block_rows: self.block_rows,
            nodata_code: self.nodata_code,
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs_f64(self.progress_interval_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config: TransitionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TransitionConfig::default());
        assert_eq!(config.nodata_code, -1);
        assert_eq!(config.progress_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_all_fields() {
        let config: TransitionConfig = serde_json::from_str(
            r#"{
                "block_rows": 64,
                "align": "intersection",
                "from_nodata": -9999,
                "to_nodata": 255,
                "nodata_code": -2,
                "progress_interval_secs": 0.5
            }"#,
        )
        .unwrap();
        assert_eq!(config.block_rows, Some(64));
        assert_eq!(config.align, AlignMode::Intersection);
        assert_eq!(config.from_nodata, Some(-9999.0));
        assert_eq!(config.to_nodata, Some(255.0));
        assert_eq!(config.engine_options().nodata_code, -2);
        assert_eq!(config.progress_interval(), Duration::from_millis(500));
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: std::result::Result<TransitionConfig, _> =
            serde_json::from_str(r#"{ "blockrows": 64 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn validation_failures() {
        let bad = [
            TransitionConfig {
                block_rows: Some(0),
                ..Default::default()
            },
            TransitionConfig {
                nodata_code: 0,
                ..Default::default()
            },
            TransitionConfig {
                progress_interval_secs: -1.0,
                ..Default::default()
            },
            TransitionConfig {
                progress_interval_secs: f64::NAN,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(TransitionError::InvalidArgument(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn loads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "nodata_code": 3 }}"#).unwrap();
        assert!(TransitionConfig::from_json_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "block_rows": 16 }}"#).unwrap();
        let config = TransitionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.block_rows, Some(16));
    }

    #[test]
    fn missing_file_names_path() {
        let err = TransitionConfig::from_json_file("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.json"));
    }
}
