//! Event handling and user feedback

use crate::logging::log_event_with_tracing;
use console::{Style, Term};
use pkgup_events::{ActivationEvent, AppEvent, EventMessage, GeneralEvent, UpdateEvent};

/// Forwards every event to tracing and prints the interesting ones
pub struct EventHandler {
    term: Term,
    quiet: bool,
    debug: bool,
    ok: Style,
    warn: Style,
    err: Style,
}

impl EventHandler {
    /// `quiet` suppresses terminal output (JSON mode)
    pub fn new(colors: bool, quiet: bool, debug: bool) -> Self {
        let style = |s: Style| s.force_styling(colors);
        Self {
            term: Term::stderr(),
            quiet,
            debug,
            ok: style(Style::new().green()),
            warn: style(Style::new().yellow()),
            err: style(Style::new().red()),
        }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }
        if let Some(line) = self.status_line(&message.event) {
            let _ = self.term.write_line(&line);
        }
    }

    fn status_line(&self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::Update(UpdateEvent::UpdateAvailable {
                package,
                version,
                source_id,
                ..
            }) => Some(format!(
                "{} {package} {version} available from {source_id}",
                self.ok.apply_to("update")
            )),
            AppEvent::Update(UpdateEvent::SourceFailed { source_id, failure }) => Some(format!(
                "{} source {source_id}: {}",
                self.warn.apply_to("warning"),
                failure.message
            )),
            AppEvent::Update(UpdateEvent::SourceRateLimited { source_id, .. }) => Some(format!(
                "{} source {source_id} skipped, check limit reached",
                self.warn.apply_to("warning")
            )),
            AppEvent::Activation(ActivationEvent::PackageActivated {
                package, merkle, ..
            }) => Some(format!(
                "{} {package} ({merkle})",
                self.ok.apply_to("activated")
            )),
            AppEvent::Activation(ActivationEvent::BlobFetchFailed { blob, failure }) => {
                Some(format!(
                    "{} blob {blob}: {}",
                    self.err.apply_to("error"),
                    failure.message
                ))
            }
            AppEvent::Activation(ActivationEvent::CommitFailed {
                package, failure, ..
            }) => Some(format!(
                "{} committing {package}: {}",
                self.err.apply_to("error"),
                failure.message
            )),
            AppEvent::General(GeneralEvent::Warning { message }) => {
                Some(format!("{} {message}", self.warn.apply_to("warning")))
            }
            AppEvent::General(GeneralEvent::DebugLog { message }) if self.debug => {
                Some(format!("debug {message}"))
            }
            _ => None,
        }
    }
}
