//! Events posted into a machine.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use crate::code::Code;

/// A discrete occurrence posted into a state machine.
///
/// The `code` drives transition lookup. The `mnemonic` and `message` only
/// appear in logs and history. The optional `arg` is handed to the action
/// that handles the event and is never kept in history.
pub struct Event {
    code: u32,
    mnemonic: Cow<'static, str>,
    message: Option<String>,
    arg: Option<Box<dyn Any + Send>>,
}

impl Event {
    /// Creates an event with an explicit mnemonic.
    pub fn new(code: impl Code, mnemonic: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: code.code(),
            mnemonic: mnemonic.into(),
            message: None,
            arg: None,
        }
    }

    /// Creates an event whose mnemonic is the code's label, or the number
    /// when the code has none.
    pub fn of(code: impl Code) -> Self {
        let mnemonic = match code.label() {
            Some(label) => Cow::Borrowed(label),
            None => Cow::Owned(code.code().to_string()),
        };
        Self::new(code, mnemonic)
    }

    /// Attaches a payload for the handling action.
    #[must_use]
    pub fn with_arg<T: Any + Send>(mut self, arg: T) -> Self {
        self.arg = Some(Box::new(arg));
        self
    }

    /// Attaches a free-form diagnostic message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn has_arg(&self) -> bool {
        self.arg.is_some()
    }

    /// Borrows the payload if it is a `T`.
    pub fn arg_ref<T: Any>(&self) -> Option<&T> {
        self.arg.as_ref()?.downcast_ref()
    }

    /// Moves the payload out if it is a `T`. A payload of another type is
    /// left in place.
    pub fn take_arg<T: Any>(&mut self) -> Option<T> {
        let arg = self.arg.take()?;
        match arg.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.arg = Some(other);
                None
            }
        }
    }

    pub(crate) fn mnemonic_cow(&self) -> Cow<'static, str> {
        self.mnemonic.clone()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("code", &self.code)
            .field("mnemonic", &self.mnemonic)
            .field("message", &self.message)
            .field("has_arg", &self.arg.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::SmEvent;

    #[test]
    fn of_uses_label_or_number() {
        assert_eq!(Event::of(SmEvent::Success).mnemonic(), "Success");
        assert_eq!(Event::of(42u32).mnemonic(), "42");
    }

    #[test]
    fn take_arg_keeps_mismatched_payload() {
        let mut event = Event::of(SmEvent::Launch).with_arg(7u64);
        assert_eq!(event.take_arg::<String>(), None);
        assert_eq!(event.arg_ref::<u64>(), Some(&7));
        assert_eq!(event.take_arg::<u64>(), Some(7));
        assert!(!event.has_arg());
    }
}
