//! # Config Loader
//!
//! Session and cue file loading.
//!
//! Responsibilities:
//! - Parse TOML/JSON session files (`SessionConfig`) and cue files (`CueFile`)
//! - Validate sequencer tuning, motion setup and cue batches
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let session = ConfigLoader::load_from_path(Path::new("session.toml")).unwrap();
//! println!("lookahead: {}s, {} cues", session.sequencer.lookahead_s, session.cues.len());
//! ```

mod parser;
mod validator;

pub use contracts::SessionConfig;
pub use parser::ConfigFormat;
pub use crate::validator::{validate_cues, validate_sequencer};

use contracts::{ContractError, CueEntry, CueOp};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A standalone cue batch.
///
/// Same `[[cues]]` layout as the session file, without the other sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueFile {
    #[serde(default)]
    pub cues: Vec<CueEntry>,
}

impl CueFile {
    /// Cue batch in file order
    pub fn to_ops(&self) -> Result<Vec<CueOp>, ContractError> {
        self.cues.iter().map(CueEntry::to_op).collect()
    }
}

/// Configuration loader
///
/// Provides static methods to load sessions and cue files from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a session from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SessionConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a session from string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SessionConfig, ContractError> {
        let session: SessionConfig = parser::parse(content, format)?;
        validator::validate(&session)?;
        Ok(session)
    }

    /// Load a cue file from path
    pub fn load_cues_from_path(path: &Path) -> Result<CueFile, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_cues_from_str(&content, format)
    }

    /// Load a cue file from string
    pub fn load_cues_from_str(content: &str, format: ConfigFormat) -> Result<CueFile, ContractError> {
        let file: CueFile = parser::parse(content, format)?;
        validator::validate_cues(&file.cues, "cues")?;
        Ok(file)
    }

    /// Serialize a session to TOML string
    pub fn to_toml(session: &SessionConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(session)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a session to JSON string
    pub fn to_json(session: &SessionConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(session)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Interval;
    use std::io::Write;

    const SESSION_TOML: &str = r#"
[sequencer]
lookahead_s = 3.0

[sequencer.timer]
early_s = 0.001

[motion]
position = 0.0
velocity = 1.0
range_low = 0.0
range_high = 60.0

[[cues]]
key = "intro"
low = 0.0
high = 5.0

[[cues]]
key = "verse"
low = 5.0
high = 10.0
high_include = true

[[cues]]
key = "marker"
low = 7.5
high = 7.5

[cues.data]
label = "halfway"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let session = result.unwrap();
        assert_eq!(session.sequencer.lookahead_s, 3.0);
        assert_eq!(session.sequencer.timer.early_s, 0.001);
        assert_eq!(session.motion.range_high, Some(60.0));
        assert_eq!(session.cues.len(), 3);

        let ops = session.cue_ops().unwrap();
        assert_eq!(ops[1].interval, Some(Interval::closed(5.0, 10.0).unwrap()));
        assert_eq!(ops[2].data, Some(serde_json::json!({ "label": "halfway" })));
    }

    #[test]
    fn test_round_trip_toml() {
        let session = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&session).unwrap();
        let session2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(session, session2);
    }

    #[test]
    fn test_round_trip_json() {
        let session = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&session).unwrap();
        let session2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(session, session2);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[cues]]
key = "a"
low = 0.0
high = 1.0

[[cues]]
key = "a"
low = 2.0
high = 3.0
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_cues_from_str() {
        let content = r#"{ "cues": [ { "key": "open_end", "low": 10.0 }, { "key": "all" } ] }"#;
        let file = ConfigLoader::load_cues_from_str(content, ConfigFormat::Json).unwrap();
        let ops = file.to_ops().unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].interval, Some(Interval::unbounded()));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SESSION_TOML.as_bytes()).unwrap();

        let session = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(session.cues[0].key, "intro");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_cues_from_path(Path::new("/nonexistent/cues.json"))
            .unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
