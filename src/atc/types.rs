//! Inputs the radio engine reacts to.
use crate::radio::PhraseRef;
use crate::taxi::PositionUpdate;

/// Something that happened outside the radio that the engine should hear about.
#[derive(Clone, Debug, PartialEq)]
pub enum RadioEvent {
    /// Ground tracker position report.
    PositionUpdated(PositionUpdate),
    /// A controller instruction the pilot should be able to read back.
    InstructionRecorded { phrase: PhraseRef, text: String },
    /// What the pilot actually said in reply to the latest instruction.
    PilotReadback(String),
    /// Pilot reports holding short at the runway.
    HoldingShort { aircraft_id: String },
}

/// What the engine did with one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// Something was queued or recorded.
    Handled,
    /// Valid event, nothing to do right now.
    Ignored,
}
