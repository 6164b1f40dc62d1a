//! Numeric state and event codes.

/// The reserved "no event" sentinel. It is never dispatched.
pub const NO_EVENT: u32 = 0;

/// A value that names a state or event code.
///
/// Implemented for plain `u32` and, through `#[derive(Codes)]`, for fieldless
/// enums whose variants are numbered from a per-machine base.
pub trait Code: Copy {
    /// The numeric code.
    fn code(self) -> u32;

    /// A human-readable name for logs, if one is known.
    fn label(self) -> Option<&'static str> {
        None
    }
}

impl Code for u32 {
    fn code(self) -> u32 {
        self
    }
}

/// Lifecycle events shared by every machine built on the engine.
///
/// Only `Timeout` carries engine behavior (it is what state timeouts post);
/// the rest are naming conventions. Per-machine events start at
/// [`SmEvent::NEXT_CODE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmEvent {
    Launch,
    Success,
    HardFail,
    TempFail,
    Timeout,
    Cancel,
}

impl SmEvent {
    /// The code of the first lifecycle event. Code 0 stays reserved.
    pub const FIRST_CODE: u32 = 1;

    /// The first code free for per-machine events.
    pub const NEXT_CODE: u32 = Self::FIRST_CODE + Self::ALL.len() as u32;

    /// Every lifecycle event, in code order.
    pub const ALL: &'static [Self] = &[
        Self::Launch,
        Self::Success,
        Self::HardFail,
        Self::TempFail,
        Self::Timeout,
        Self::Cancel,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(Self::FIRST_CODE)? as usize;
        Self::ALL.get(index).copied()
    }
}

impl Code for SmEvent {
    fn code(self) -> u32 {
        Self::FIRST_CODE + self as u32
    }

    fn label(self) -> Option<&'static str> {
        Some(match self {
            Self::Launch => "Launch",
            Self::Success => "Success",
            Self::HardFail => "HardFail",
            Self::TempFail => "TempFail",
            Self::Timeout => "Timeout",
            Self::Cancel => "Cancel",
        })
    }
}

impl From<SmEvent> for u32 {
    fn from(event: SmEvent) -> Self {
        event.code()
    }
}
