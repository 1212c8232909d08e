//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式，会话文件与 cue 文件共用同一套解析入口。

use contracts::ContractError;
use serde::de::DeserializeOwned;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式内容
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式内容
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析
pub fn parse<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Interval, SessionConfig};

    #[test]
    fn test_parse_toml_session() {
        let content = r#"
[sequencer]
lookahead_s = 2.5

[motion]
position = 0.0
velocity = 1.0

[[cues]]
key = "intro"
low = 0.0
high = 4.0
"#;
        let session: SessionConfig = parse_toml(content).unwrap();
        assert_eq!(session.sequencer.lookahead_s, 2.5);
        assert_eq!(session.cues.len(), 1);
        assert_eq!(session.cues[0].key, "intro");
    }

    #[test]
    fn test_parse_json_session() {
        let content = r#"{
            "motion": { "position": 3.0, "velocity": 0.0 },
            "cues": [
                { "key": "a", "low": 0.0, "high": 5.0, "data": { "label": "first" } },
                { "key": "point", "low": 2.0, "high": 2.0 }
            ]
        }"#;
        let session: SessionConfig = parse_json(content).unwrap();
        assert_eq!(session.motion.position, 3.0);
        assert_eq!(session.sequencer.lookahead_s, 5.0);

        let ops = session.cue_ops().unwrap();
        assert_eq!(ops[1].interval, Some(Interval::singular(2.0).unwrap()));
        assert_eq!(ops[0].data, Some(serde_json::json!({ "label": "first" })));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result: Result<SessionConfig, _> = parse_toml("invalid toml [[[");
        assert!(matches!(
            result.unwrap_err(),
            ContractError::ConfigParse { .. }
        ));
    }

    #[test]
    fn test_parse_json_type_error() {
        let result: Result<SessionConfig, _> = parse_json(r#"{ "cues": 3 }"#);
        assert!(matches!(
            result.unwrap_err(),
            ContractError::ConfigParse { .. }
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("JSON"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
