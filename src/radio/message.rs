//! Shared message entity for every producer on the radio channel.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("priority {0} out of range (0-10)")]
    PriorityOutOfRange(u8),

    #[error("post delay must be a finite number of seconds >= 0, got {0}")]
    InvalidPostDelay(f64),

    #[error("unknown sender role: {0:?}")]
    UnknownSender(String),

    #[error("phrase sequence is empty")]
    EmptyPhrase,
}

// --- Sender ---

/// Who keys the microphone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sender {
    Pilot,
    Atc,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::Pilot => "PILOT",
            Sender::Atc => "ATC",
        }
    }
}

impl FromStr for Sender {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pilot" => Ok(Sender::Pilot),
            "atc" | "controller" => Ok(Sender::Atc),
            _ => Err(MessageError::UnknownSender(s.to_string())),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- Priority ---

/// Transmission priority, 0 (routine) to 10. Higher is more urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(u8);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(3);
    pub const HIGH: Priority = Priority(6);
    pub const CRITICAL: Priority = Priority(9);
    pub const MAX: Priority = Priority(10);

    /// At or above this level a new message cuts off the current transmission.
    pub const EMERGENCY_THRESHOLD: Priority = Priority(9);

    pub fn new(value: u8) -> Result<Self, MessageError> {
        if value > Self::MAX.0 {
            return Err(MessageError::PriorityOutOfRange(value));
        }
        Ok(Priority(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_emergency(&self) -> bool {
        *self >= Self::EMERGENCY_THRESHOLD
    }
}

impl TryFrom<u8> for Priority {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

// --- Phrase reference ---

/// One canned phrase id, or an ordered sequence spoken as one transmission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhraseRef {
    Single(String),
    Sequence(Vec<String>),
}

impl PhraseRef {
    pub fn single(id: impl Into<String>) -> Self {
        PhraseRef::Single(id.into())
    }

    pub fn sequence<I, S>(ids: I) -> Result<Self, MessageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(MessageError::EmptyPhrase);
        }
        Ok(PhraseRef::Sequence(ids))
    }

    /// Phrase ids in playback order.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            PhraseRef::Single(id) => vec![id.as_str()],
            PhraseRef::Sequence(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for PhraseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhraseRef::Single(id) => f.write_str(id),
            PhraseRef::Sequence(ids) => write!(f, "[{}]", ids.join(", ")),
        }
    }
}

// --- RadioMessage ---

pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// One atomic transmission on the shared channel.
pub struct RadioMessage {
    pub phrase: PhraseRef,
    pub sender: Sender,
    pub priority: Priority,
    /// Seconds the channel stays reserved after the audio ends (pilot messages).
    pub post_delay: f64,
    /// Spoken text for TTS-backed players, if the phrase is not fully canned.
    pub text: Option<String>,
    /// Hold-short node attached to taxi instructions.
    pub hold_short: Option<String>,
    /// Voice selection, passed explicitly instead of a global default.
    pub voice: Option<String>,
    /// Stamped from the queue clock on enqueue when left unset.
    pub created_at: Option<f64>,
    on_complete: Option<CompletionCallback>,
}

impl RadioMessage {
    pub fn new(
        sender: Sender,
        phrase: PhraseRef,
        priority: u8,
        post_delay: f64,
    ) -> Result<Self, MessageError> {
        let priority = Priority::new(priority)?;
        if !post_delay.is_finite() || post_delay < 0.0 {
            return Err(MessageError::InvalidPostDelay(post_delay));
        }
        Ok(RadioMessage {
            phrase,
            sender,
            priority,
            post_delay,
            text: None,
            hold_short: None,
            voice: None,
            created_at: None,
            on_complete: None,
        })
    }

    /// ATC message with no post delay (controller latency is drawn by the queue).
    pub fn atc(phrase: PhraseRef, priority: Priority) -> Self {
        RadioMessage {
            phrase,
            sender: Sender::Atc,
            priority,
            post_delay: 0.0,
            text: None,
            hold_short: None,
            voice: None,
            created_at: None,
            on_complete: None,
        }
    }

    /// Pilot message; fails on a negative or non-finite post delay.
    pub fn pilot(phrase: PhraseRef, priority: Priority, post_delay: f64) -> Result<Self, MessageError> {
        RadioMessage::new(Sender::Pilot, phrase, priority.value(), post_delay)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_hold_short(mut self, node: impl Into<String>) -> Self {
        self.hold_short = Some(node.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_created_at(mut self, at: f64) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Invoked once when the audio ends, not when the post delay ends.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn has_callback(&self) -> bool {
        self.on_complete.is_some()
    }

    pub(crate) fn take_callback(&mut self) -> Option<CompletionCallback> {
        self.on_complete.take()
    }

    /// Text for logs: spoken text if present, otherwise the phrase ids.
    pub fn display_text(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.phrase.to_string(),
        }
    }
}

impl fmt::Debug for RadioMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioMessage")
            .field("phrase", &self.phrase)
            .field("sender", &self.sender)
            .field("priority", &self.priority)
            .field("post_delay", &self.post_delay)
            .field("text", &self.text)
            .field("hold_short", &self.hold_short)
            .field("voice", &self.voice)
            .field("created_at", &self.created_at)
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_priority_above_ten() {
        let err = RadioMessage::new(Sender::Atc, PhraseRef::single("X"), 11, 0.0).unwrap_err();
        assert_eq!(err, MessageError::PriorityOutOfRange(11));
        assert!(RadioMessage::new(Sender::Atc, PhraseRef::single("X"), 10, 0.0).is_ok());
    }

    #[test]
    fn rejects_negative_or_nan_post_delay() {
        assert!(matches!(
            RadioMessage::new(Sender::Pilot, PhraseRef::single("X"), 0, -0.5),
            Err(MessageError::InvalidPostDelay(_))
        ));
        assert!(RadioMessage::new(Sender::Pilot, PhraseRef::single("X"), 0, f64::NAN).is_err());
        assert!(RadioMessage::new(Sender::Pilot, PhraseRef::single("X"), 0, 0.0).is_ok());
    }

    #[test]
    fn sender_parse_fails_fast_on_unknown_role() {
        assert_eq!("Pilot".parse::<Sender>(), Ok(Sender::Pilot));
        assert_eq!(" ATC ".parse::<Sender>(), Ok(Sender::Atc));
        assert_eq!(
            "ground".parse::<Sender>(),
            Err(MessageError::UnknownSender("ground".to_string()))
        );
    }

    #[test]
    fn phrase_sequence_keeps_order_and_rejects_empty() {
        let seq = PhraseRef::sequence(["CALLSIGN", "CLEARED", "RWY_31"]).unwrap();
        assert_eq!(seq.ids(), vec!["CALLSIGN", "CLEARED", "RWY_31"]);
        assert_eq!(seq.to_string(), "[CALLSIGN, CLEARED, RWY_31]");
        assert_eq!(
            PhraseRef::sequence(Vec::<String>::new()),
            Err(MessageError::EmptyPhrase)
        );
    }

    #[test]
    fn emergency_threshold() {
        assert!(!Priority::HIGH.is_emergency());
        assert!(Priority::CRITICAL.is_emergency());
        assert!(Priority::MAX.is_emergency());
        assert!(Priority::LOW < Priority::NORMAL);
    }

    #[test]
    fn callback_is_taken_once() {
        let mut msg = RadioMessage::atc(PhraseRef::single("X"), Priority::LOW).on_complete(|| {});
        assert!(msg.has_callback());
        assert!(msg.take_callback().is_some());
        assert!(msg.take_callback().is_none());
    }
}
