//! The shared radio channel: message entity, playback boundary and the
//! transmission queue that serializes everything onto one frequency.

pub mod message;
pub mod player;
pub mod queue;

pub use message::{CompletionCallback, MessageError, PhraseRef, Priority, RadioMessage, Sender};
pub use player::{
    ChannelPlayer, HeadlessPlayer, PlaybackCommand, PlaybackMonitor, PlayerError, RadioPlayer,
    TransmissionHandle,
};
pub use queue::{ChannelState, MessageSink, Transition, TransmissionQueue, TransmissionRecord};
