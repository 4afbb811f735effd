//! The NIP input component.
//!
//! Formats while typing, validates after a quiet period (the last keystroke
//! wins), and validates immediately on blur with inline errors.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::event::{FieldValidation, Message, PluginEvent};
use crate::nip;

const INCOMPLETE: &str = "NIP must have 10 digits";
const INVALID: &str = "Invalid NIP";

/// Validate field text. Errors are only reported when `show_errors` is set.
pub fn check(display: &str, revision: u64, show_errors: bool) -> FieldValidation {
    let digits = nip::clean(display);
    let (valid, error) = if digits.is_empty() {
        (false, None)
    } else if digits.len() < nip::NIP_LENGTH {
        (false, show_errors.then_some(INCOMPLETE))
    } else if nip::validate(&digits) {
        (true, None)
    } else {
        (false, show_errors.then_some(INVALID))
    };

    FieldValidation {
        revision,
        digits,
        valid,
        error: error.map(str::to_owned),
    }
}

pub struct NipField {
    display: String,
    revision: u64,
    debounce: Duration,
    pending: Option<CancellationToken>,
    events: mpsc::UnboundedSender<Message>,
}

impl NipField {
    pub(crate) fn new(debounce: Duration, events: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            display: String::new(),
            revision: 0,
            debounce,
            pending: None,
            events,
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn digits(&self) -> String {
        nip::clean(&self.display)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// User typed: reformat now, validate once typing pauses.
    pub fn input(&mut self, raw: &str) {
        self.replace(nip::format_partial(raw));

        let token = CancellationToken::new();
        self.pending = Some(token.clone());

        let events = self.events.clone();
        let display = self.display.clone();
        let revision = self.revision;
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let result = check(&display, revision, false);
                    let _ = events.send(Message::Plugin(PluginEvent::ValidationChanged(result)));
                }
            }
        });
    }

    /// Lost focus: validate immediately and surface errors.
    pub fn blur(&mut self) {
        self.cancel_pending();
        self.emit(PluginEvent::ValidationChanged(check(
            &self.display,
            self.revision,
            true,
        )));
    }

    /// Load a value programmatically (e.g. from the organization record).
    pub fn set_value(&mut self, raw: &str) {
        self.replace(nip::format(&nip::clean(raw)));
        self.emit(PluginEvent::ValidationChanged(check(
            &self.display,
            self.revision,
            false,
        )));
    }

    pub fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    fn replace(&mut self, display: String) {
        self.cancel_pending();
        self.display = display;
        self.revision += 1;
        self.emit(PluginEvent::ValueChanged {
            revision: self.revision,
            display: self.display.clone(),
        });
    }

    fn emit(&self, event: PluginEvent) {
        let _ = self.events.send(Message::Plugin(event));
    }
}

impl Drop for NipField {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn expect_value(msg: Message) -> String {
        match msg {
            Message::Plugin(PluginEvent::ValueChanged { display, .. }) => display,
            other => panic!("expected ValueChanged, got {other:?}"),
        }
    }

    fn expect_validation(msg: Message) -> FieldValidation {
        match msg {
            Message::Plugin(PluginEvent::ValidationChanged(v)) => v,
            other => panic!("expected ValidationChanged, got {other:?}"),
        }
    }

    #[test]
    fn check_rules() {
        assert_eq!(check("", 1, true).error, None);
        assert_eq!(check("526", 1, false).error, None);
        assert_eq!(check("526", 1, true).error.as_deref(), Some(INCOMPLETE));
        assert_eq!(check("526-000-12-45", 1, true).error.as_deref(), Some(INVALID));

        let ok = check("526-000-12-46", 3, true);
        assert!(ok.valid);
        assert_eq!(ok.digits, "5260001246");
        assert_eq!(ok.revision, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn last_keystroke_wins() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut field = NipField::new(Duration::from_millis(500), tx);

        field.input("526");
        field.input("5260001");
        field.input("5260001246");
        assert_eq!(field.display(), "526-000-12-46");

        assert_eq!(expect_value(rx.recv().await.unwrap()), "526");
        assert_eq!(expect_value(rx.recv().await.unwrap()), "526-000-1");
        assert_eq!(expect_value(rx.recv().await.unwrap()), "526-000-12-46");

        let validation = expect_validation(rx.recv().await.unwrap());
        assert!(validation.valid);
        assert_eq!(validation.revision, field.revision());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn blur_validates_immediately_with_errors() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut field = NipField::new(Duration::from_secs(60), tx);

        field.input("12345");
        field.blur();

        expect_value(rx.recv().await.unwrap());
        let validation = expect_validation(rx.recv().await.unwrap());
        assert!(!validation.valid);
        assert_eq!(validation.error.as_deref(), Some(INCOMPLETE));
    }

    #[tokio::test]
    async fn set_value_formats_and_validates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut field = NipField::new(Duration::from_millis(500), tx);

        field.set_value("5260001246");
        assert_eq!(expect_value(rx.recv().await.unwrap()), "526-000-12-46");
        assert!(expect_validation(rx.recv().await.unwrap()).valid);
    }
}
