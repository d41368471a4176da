//! Pilot/controller radio communication engine: one half-duplex channel,
//! readback of controller instructions, and progressive taxi clearances.

pub mod atc;
pub mod clock;
pub mod radio;
pub mod readback;
pub mod settings;
pub mod taxi;

pub use atc::{EventOutcome, RadioEngine, RadioEvent};
pub use clock::{Clock, SimClock, SystemClock};
pub use radio::{HeadlessPlayer, Priority, RadioMessage, Sender, TransmissionQueue};
pub use settings::RadioSettings;
