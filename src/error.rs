//! Unified error type for btperiph.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! `defmt::Format` is derived under the `defmt` feature so the same enums
//! compile for host tests.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Advertising could not be started.
    Adv(AdvError),

    /// A notification could not be handed to the host stack; the payload
    /// is dropped and the next tick tries again.
    NotifyFailed,
}

/// Advertising start failures, reported to the link state machine.
///
/// Neither variant is fatal: the machine re-issues the start on the next
/// triggering event instead of looping inside a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvError {
    /// The radio rejected the start request (e.g. a session is already
    /// running or resources are exhausted).
    RadioBusy,
    /// The payload does not fit the 31-byte legacy advertising PDU.
    InvalidPayload,
}

// Convenience conversions

impl From<AdvError> for Error {
    fn from(e: AdvError) -> Self {
        Error::Adv(e)
    }
}
