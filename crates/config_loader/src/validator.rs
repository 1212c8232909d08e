//! 配置校验模块
//!
//! 校验规则：
//! - sequencer 调优参数满足 validator 规则 (lookahead_s > 0 等)
//! - motion 初始向量为有限值，位置范围合法且包含初始位置
//! - cue key 非空且唯一
//! - cue 区间合法 (low <= high，边界非 NaN)

use std::collections::HashSet;

use contracts::{ContractError, CueEntry, MotionSetup, SequencerConfig, SessionConfig};
use validator::Validate;

/// 校验会话配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(session: &SessionConfig) -> Result<(), ContractError> {
    validate_sequencer(&session.sequencer)?;
    validate_motion(&session.motion)?;
    validate_cues(&session.cues, "cues")?;
    Ok(())
}

/// 校验 sequencer 调优参数
pub fn validate_sequencer(config: &SequencerConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("sequencer", e.to_string()))
}

/// 校验本地 motion 设置
fn validate_motion(motion: &MotionSetup) -> Result<(), ContractError> {
    let components = [
        ("motion.position", motion.position),
        ("motion.velocity", motion.velocity),
        ("motion.acceleration", motion.acceleration),
    ];
    for (field, value) in components {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("must be finite, got {value}"),
            ));
        }
    }

    let range = motion.range().map_err(|e| {
        ContractError::config_validation("motion.range_low / motion.range_high", e.to_string())
    })?;

    if !range.covers_point(motion.position) {
        return Err(ContractError::config_validation(
            "motion.position",
            format!("position {} is outside range {}", motion.position, range),
        ));
    }
    Ok(())
}

/// 校验 cue 列表
///
/// `field` 为错误信息中使用的字段前缀。
pub fn validate_cues(cues: &[CueEntry], field: &str) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, cue) in cues.iter().enumerate() {
        if cue.key.is_empty() {
            return Err(ContractError::config_validation(
                format!("{field}[{idx}].key"),
                "cue key cannot be empty",
            ));
        }
        if !seen.insert(cue.key.clone()) {
            return Err(ContractError::config_validation(
                format!("{field}[key={}]", cue.key),
                "duplicate cue key",
            ));
        }
        cue.to_op().map_err(|e| {
            ContractError::config_validation(format!("{field}[key={}]", cue.key), e.to_string())
        })?;
    }
    Ok(())
}
