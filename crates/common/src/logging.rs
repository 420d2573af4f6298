//! Logging and tracing initialization.
//!
//! Study output carries its context in spans: everything logged while a
//! study or a calibration runs is tagged with the participant and the
//! landmark source, so one log file can hold several sessions.

use tracing::Span;

use crate::config::LoggingConfig;

/// Directives added after the configured level. The serial port crate
/// logs every enumeration and reopen at debug level.
const QUIET_TARGETS: &[&str] = &["serialport=warn"];

/// Filter directives for `config`.
///
/// Targets the configured level already names are left alone.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.trim().to_string();
    for quiet in QUIET_TARGETS {
        let target = quiet.split('=').next().unwrap_or(quiet);
        if directives.split(',').any(|d| d.trim().starts_with(target)) {
            continue;
        }
        if !directives.is_empty() {
            directives.push(',');
        }
        directives.push_str(quiet);
    }
    directives
}

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` overrides the configured directives when set. Text output
/// goes to stderr so progress lines on stdout stay readable.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Span for one study run.
pub fn study_span(participant_id: &str, source: &str) -> Span {
    tracing::info_span!("study", participant = %participant_id, source = %source)
}

/// Span for one world calibration pass.
pub fn calibration_span(source: &str) -> Span {
    tracing::info_span!("calibration", source = %source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            json: false,
        }
    }

    #[test]
    fn test_filter_quiets_serialport() {
        assert_eq!(filter_directives(&level("info")), "info,serialport=warn");
        assert_eq!(
            filter_directives(&level(" handguide=debug,warn ")),
            "handguide=debug,warn,serialport=warn"
        );
        assert_eq!(filter_directives(&level("")), "serialport=warn");
    }

    #[test]
    fn test_filter_keeps_explicit_serialport_level() {
        assert_eq!(
            filter_directives(&level("debug,serialport=trace")),
            "debug,serialport=trace"
        );
    }

    #[test]
    fn test_spans_are_named() {
        // Without a subscriber the spans are disabled but keep their metadata.
        let span = study_span("P-1a2b3", "replay.jsonl");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "study");
            assert!(meta.fields().field("participant").is_some());
        }
        let span = calibration_span("replay.jsonl");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "calibration");
        }
    }
}
