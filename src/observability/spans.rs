//! Structured span definitions for tracing.

use std::time::Instant;
use tracing::{Level, Span, field, span};

use crate::Credential;
use crate::Result;

/// Span covering one credential resolution.
pub struct ResolveSpan {
    span: Span,
    start: Instant,
}

impl ResolveSpan {
    pub fn new(account: &str, interactive: bool) -> Self {
        let span = span!(
            Level::DEBUG,
            "credential.resolve",
            account = account,
            interactive = interactive,
            source = field::Empty,
            outcome = field::Empty,
            latency_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn finish(self, result: &Result<Credential>) {
        match result {
            Ok(cred) => {
                if let Some(source) = cred.source() {
                    self.span.record("source", source.as_str());
                }
                self.span.record("outcome", "ok");
            }
            Err(e) => {
                self.span.record("outcome", error_outcome(e));
            }
        }
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("latency_ms", latency_ms);
    }
}

fn error_outcome(error: &crate::Error) -> &'static str {
    match error.category() {
        crate::ErrorCategory::Configuration => "configuration_error",
        crate::ErrorCategory::Authorization => "authorization_error",
        crate::ErrorCategory::Transient => "transient_error",
        crate::ErrorCategory::Internal => "internal_error",
    }
}
