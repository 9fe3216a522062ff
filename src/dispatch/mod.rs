//! Serial delivery of asynchronous device completions.
//!
//! Every callback a backend or capture target produces is posted to a
//! [`SerialQueue`] as an [`Envelope`] tagged with the [`Generation`] it was
//! issued under. The controller drains the queue on the caller's thread, one
//! event at a time, so no event is ever processed while a transition runs.

mod event;
mod queue;

pub use event::{Envelope, Event, Generation};
pub use queue::{QueueHandle, Responder, SerialQueue};
