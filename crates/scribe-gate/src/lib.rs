//! Daily-entry gating: draft cache, skip countdown, controller, and trigger routing.

mod controller;
mod countdown;
mod draft;
mod router;
#[cfg(test)]
mod testing;

pub use controller::{
    ContentSource, GateController, GateOutcome, GateState, Presentation, SuppressReason,
};
pub use countdown::CountdownGate;
pub use draft::DraftCache;
pub use router::{EventRouter, DEFAULT_DEBOUNCE};
