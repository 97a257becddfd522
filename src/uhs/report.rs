//! Diagnostic reporting for recoverable and fatal parse anomalies.
//!
//! The parser never prints on its own. Every anomaly goes through a
//! [`DiagnosticSink`]: recoverable ones (bad binary ranges, unknown hunks,
//! unknown escapes) while the parse continues, and the single fatal failure
//! just before the parse aborts. Supplying [`NullSink`] gives silent parsing
//! for batch or test use.

use std::error::Error;

use log::{error, info};

/// How serious a reported anomaly is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Info,
}

/// A destination for parse diagnostics.
///
/// `line` is the best-available physical line number in the source file,
/// or 0 when none applies.
pub trait DiagnosticSink {
    fn report(
        &self,
        severity: Severity,
        source: &str,
        message: &str,
        line: usize,
        cause: Option<&dyn Error>,
    );
}

/// Forwards diagnostics to the `log` facade.
///
/// This is the default sink: with no logger installed it is effectively
/// silent, and with `env_logger` (as the CLI sets up) it prints.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(
        &self,
        severity: Severity,
        source: &str,
        message: &str,
        line: usize,
        cause: Option<&dyn Error>,
    ) {
        let mut text = message.to_string();
        if line > 0 {
            text.push_str(&format!(" (line {})", line));
        }
        if let Some(e) = cause {
            text.push_str(&format!(": {}", e));
        }
        match severity {
            Severity::Error => error!("[{}] {}", source, text),
            Severity::Info => info!("[{}] {}", source, text),
        }
    }
}

/// Discards all diagnostics.
#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _: Severity, _: &str, _: &str, _: usize, _: Option<&dyn Error>) {}
}
