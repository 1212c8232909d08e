//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, CueFile, SessionConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cues_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SessionSummary>,
}

#[derive(Serialize)]
struct SessionSummary {
    lookahead_s: f64,
    cue_count: usize,
    extra_cue_count: usize,
    singular_cues: usize,
    unbounded_cues: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating session");

    let result = validate_session(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Session validation failed")
    }
}

fn validate_session(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let cues_path = args.cues.as_ref().map(|p| p.display().to_string());
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        cues_path: cues_path.clone(),
        error: Some(error),
        warnings: None,
        summary: None,
    };

    if !args.config.exists() {
        return invalid(format!("File not found: {}", args.config.display()));
    }

    let session = match ConfigLoader::load_from_path(&args.config) {
        Ok(session) => session,
        Err(e) => return invalid(e.to_string()),
    };

    let extra = match &args.cues {
        Some(path) => match ConfigLoader::load_cues_from_path(path) {
            Ok(file) => file,
            Err(e) => return invalid(format!("{}: {}", path.display(), e)),
        },
        None => CueFile::default(),
    };

    let warnings = collect_warnings(&session, &extra);
    let (singular_cues, unbounded_cues) = session
        .cues
        .iter()
        .chain(extra.cues.iter())
        .filter_map(|cue| cue.to_op().ok().and_then(|op| op.interval))
        .fold((0, 0), |(singular, unbounded), interval| {
            (
                singular + usize::from(interval.is_singular()),
                unbounded + usize::from(!interval.is_finite()),
            )
        });

    ValidationResult {
        valid: true,
        config_path,
        cues_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(SessionSummary {
            lookahead_s: session.sequencer.lookahead_s,
            cue_count: session.cues.len(),
            extra_cue_count: extra.cues.len(),
            singular_cues,
            unbounded_cues,
        }),
    }
}

/// Collect non-fatal issues
fn collect_warnings(session: &SessionConfig, extra: &CueFile) -> Vec<String> {
    let mut warnings = Vec::new();

    if session.cues.is_empty() && extra.cues.is_empty() {
        warnings.push("No cues configured - playback will emit nothing".to_string());
    }

    let motion = &session.motion;
    if motion.velocity == 0.0 && motion.acceleration == 0.0 {
        warnings.push("Motion is at rest - only cues covering the start position will fire".to_string());
    }

    let session_keys: HashSet<_> = session.cues.iter().map(|cue| &cue.key).collect();
    for cue in &extra.cues {
        if session_keys.contains(&cue.key) {
            warnings.push(format!(
                "Cue '{}' in the cue file replaces the session cue",
                cue.key
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Session is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Lookahead: {}s", summary.lookahead_s);
            println!("  Cues: {}", summary.cue_count);
            if let Some(ref cues_path) = result.cues_path {
                println!("  Cue file ({}): {}", cues_path, summary.extra_cue_count);
            }
            println!("  Singular: {}", summary.singular_cues);
            println!("  Unbounded: {}", summary.unbounded_cues);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Session is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
