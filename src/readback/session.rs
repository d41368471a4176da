use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use crate::atc::phraseology::{self, PhraseVars, Phraseology};
use crate::clock::Clock;
use crate::radio::{MessageError, MessageSink, PhraseRef, Priority, RadioMessage};
use crate::settings::ReadbackSettings;

use super::validator::{extract_elements, generate_readback, validate, Elements, ReadbackCheck};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("nothing to acknowledge")]
    NothingToAcknowledge,

    #[error("nothing to repeat")]
    NothingToRepeat,

    #[error(transparent)]
    Message(#[from] MessageError),
}

/// One controller instruction as heard by the pilot.
#[derive(Clone, Debug, PartialEq)]
pub struct AtcInstruction {
    pub phrase: PhraseRef,
    pub text: Option<String>,
    pub elements: Elements,
    pub recorded_at: f64,
}

/// Remembers the last few instructions and voices the pilot's side of them.
pub struct ReadbackSession {
    callsign: String,
    voice: Option<String>,
    settings: ReadbackSettings,
    history: VecDeque<AtcInstruction>,
    /// What the pilot actually said for the latest instruction, if tracked.
    pilot_readback: Option<String>,
    phraseology: Arc<dyn Phraseology>,
    clock: Arc<dyn Clock>,
}

impl ReadbackSession {
    pub fn new(
        callsign: impl Into<String>,
        settings: ReadbackSettings,
        phraseology: Arc<dyn Phraseology>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ReadbackSession {
            callsign: callsign.into(),
            voice: None,
            history: VecDeque::with_capacity(settings.history_len),
            settings,
            pilot_readback: None,
            phraseology,
            clock,
        }
    }

    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }

    /// Remember an instruction. The oldest one falls off once the history is full.
    pub fn record(&mut self, phrase: PhraseRef, raw_text: &str) {
        let elements = if raw_text.trim().is_empty() {
            Elements::new()
        } else {
            extract_elements(raw_text)
        };
        let text = (!raw_text.trim().is_empty()).then(|| raw_text.to_string());

        log::debug!("recorded {} with {} critical elements", phrase, elements.len());
        if self.history.len() >= self.settings.history_len {
            self.history.pop_front();
        }
        self.history.push_back(AtcInstruction {
            phrase,
            text,
            elements,
            recorded_at: self.clock.now(),
        });
        // A tracked readback belongs to the instruction before this one.
        if let Some(stale) = self.pilot_readback.take() {
            log::debug!("dropping unacknowledged pilot readback {:?}", stale);
        }
    }

    /// Track what the pilot actually said in reply to the latest instruction.
    pub fn record_pilot_readback(&mut self, text: impl Into<String>) {
        self.pilot_readback = Some(text.into());
    }

    /// Read back the latest instruction and have the controller confirm or
    /// correct it. Publishes exactly two messages.
    pub fn acknowledge(&mut self, sink: &mut dyn MessageSink) -> Result<ReadbackCheck, SessionError> {
        let Some(latest) = self.history.back() else {
            self.notify(sink, phraseology::NOTHING_TO_ACKNOWLEDGE)?;
            log::warn!("acknowledge requested with empty history");
            return Err(SessionError::NothingToAcknowledge);
        };

        let spoken = self
            .pilot_readback
            .take()
            .unwrap_or_else(|| generate_readback(&latest.elements, &self.callsign));
        let check = validate(&latest.elements, &extract_elements(&spoken));

        let readback = self
            .pilot_message(phraseology::PILOT_READBACK, self.settings.pilot_post_delay)?
            .with_text(spoken);

        let vars = PhraseVars::new(self.callsign.as_str());
        let confirmation = if check.correct {
            let text = self.phraseology.render(phraseology::ATC_READBACK_CORRECT, &vars);
            RadioMessage::atc(PhraseRef::single(phraseology::ATC_READBACK_CORRECT), Priority::LOW)
                .with_text(text)
        } else {
            log::info!("readback incorrect: {}", check.descriptions().join("; "));
            let vars = vars.detail(check.descriptions().join("; "));
            let text = self.phraseology.render(phraseology::ATC_READBACK_INCORRECT, &vars);
            RadioMessage::atc(PhraseRef::single(phraseology::ATC_READBACK_INCORRECT), Priority::LOW)
                .with_text(text)
        };

        sink.enqueue(readback);
        sink.enqueue(confirmation);
        Ok(check)
    }

    /// Ask for the latest instruction again; the controller replays it.
    pub fn request_repeat(&mut self, sink: &mut dyn MessageSink) -> Result<(), SessionError> {
        let Some(latest) = self.history.back() else {
            self.notify(sink, phraseology::NOTHING_TO_REPEAT)?;
            log::warn!("repeat requested with empty history");
            return Err(SessionError::NothingToRepeat);
        };

        let text = self
            .phraseology
            .render(phraseology::PILOT_SAY_AGAIN, &PhraseVars::new(self.callsign.as_str()));
        let say_again = self
            .pilot_message(phraseology::PILOT_SAY_AGAIN, self.settings.pilot_post_delay)?
            .with_text(text);

        let mut replay = RadioMessage::atc(latest.phrase.clone(), Priority::LOW);
        replay.text = latest.text.clone();

        sink.enqueue(say_again);
        sink.enqueue(replay);
        Ok(())
    }

    fn notify(&self, sink: &mut dyn MessageSink, key: &str) -> Result<(), SessionError> {
        let text = self
            .phraseology
            .render(key, &PhraseVars::new(self.callsign.as_str()));
        sink.enqueue(self.pilot_message(key, 0.0)?.with_text(text));
        Ok(())
    }

    fn pilot_message(&self, key: &str, post_delay: f64) -> Result<RadioMessage, SessionError> {
        let mut msg = RadioMessage::pilot(PhraseRef::single(key), Priority::LOW, post_delay)?;
        msg.voice = self.voice.clone();
        Ok(msg)
    }

    /// Pilot readback waiting for the next `acknowledge`.
    pub fn pending_readback(&self) -> Option<&str> {
        self.pilot_readback.as_deref()
    }

    pub fn latest(&self) -> Option<&AtcInstruction> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &AtcInstruction> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atc::phraseology::TemplatePhraseology;
    use crate::clock::SimClock;
    use crate::radio::Sender;

    fn session() -> (ReadbackSession, SimClock) {
        let clock = SimClock::new();
        let s = ReadbackSession::new(
            "N1AB",
            ReadbackSettings::default(),
            Arc::new(TemplatePhraseology::new()),
            Arc::new(clock.clone()),
        );
        (s, clock)
    }

    #[test]
    fn history_evicts_oldest() {
        let (mut s, clock) = session();
        for i in 0..5 {
            clock.advance(1.0);
            s.record(PhraseRef::single(format!("I{i}")), "");
        }
        let ids: Vec<String> = s.history().map(|i| i.phrase.to_string()).collect();
        assert_eq!(ids, vec!["I2", "I3", "I4"]);
        assert_eq!(s.latest().unwrap().recorded_at, 5.0);
    }

    #[test]
    fn record_without_text_has_no_elements() {
        let (mut s, _) = session();
        s.record(PhraseRef::single("ATC_TAXI_VIA"), "   ");
        let latest = s.latest().unwrap();
        assert!(latest.elements.is_empty());
        assert!(latest.text.is_none());
    }

    #[test]
    fn acknowledge_with_empty_history_fails_and_says_so() {
        let (mut s, _) = session();
        let mut sink: Vec<RadioMessage> = Vec::new();
        assert_eq!(s.acknowledge(&mut sink), Err(SessionError::NothingToAcknowledge));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].text.as_deref(), Some("Nothing to acknowledge"));

        sink.clear();
        assert_eq!(s.request_repeat(&mut sink), Err(SessionError::NothingToRepeat));
        assert_eq!(sink[0].text.as_deref(), Some("Nothing to repeat"));
    }

    #[test]
    fn acknowledge_reads_back_latest_instruction() {
        let (mut s, _) = session();
        s.record(PhraseRef::single("OLD"), "squawk 1200");
        s.record(
            PhraseRef::single("ATC_DEPARTURE"),
            "N1AB, climb and maintain 3000 feet, turn right heading 270, contact 125.35",
        );
        let mut sink: Vec<RadioMessage> = Vec::new();
        let check = s.acknowledge(&mut sink).unwrap();

        assert!(check.correct);
        assert_eq!(sink.len(), 2);

        let readback = &sink[0];
        assert_eq!(readback.sender, Sender::Pilot);
        assert_eq!(readback.priority, Priority::LOW);
        assert_eq!(readback.post_delay, 2.0);
        assert_eq!(
            readback.text.as_deref(),
            Some("maintain 3000 feet, heading 270, 125.35, N1AB")
        );

        let confirm = &sink[1];
        assert_eq!(confirm.sender, Sender::Atc);
        assert_eq!(confirm.post_delay, 0.0);
        assert_eq!(confirm.phrase, PhraseRef::single(phraseology::ATC_READBACK_CORRECT));
        assert_eq!(confirm.text.as_deref(), Some("N1AB, readback correct"));
    }

    #[test]
    fn acknowledge_without_elements_is_roger() {
        let (mut s, _) = session();
        s.record(PhraseRef::single("ATC_TRAFFIC"), "traffic twelve o'clock, five miles");
        let mut sink: Vec<RadioMessage> = Vec::new();
        s.acknowledge(&mut sink).unwrap();
        assert_eq!(sink[0].text.as_deref(), Some("Roger, N1AB"));
    }

    #[test]
    fn wrong_pilot_readback_gets_corrected() {
        let (mut s, _) = session();
        s.record(PhraseRef::single("ATC_CLIMB"), "climb and maintain 3000 feet, squawk 4521");
        s.record_pilot_readback("maintain 4000 feet, squawk 4521, N1AB");
        let mut sink: Vec<RadioMessage> = Vec::new();
        let check = s.acknowledge(&mut sink).unwrap();

        assert!(!check.correct);
        assert_eq!(sink[0].text.as_deref(), Some("maintain 4000 feet, squawk 4521, N1AB"));
        assert_eq!(sink[1].phrase, PhraseRef::single(phraseology::ATC_READBACK_INCORRECT));
        assert_eq!(
            sink[1].text.as_deref(),
            Some("N1AB, negative, altitude: expected 3000, read back 4000")
        );
    }

    #[test]
    fn new_instruction_discards_stale_pilot_readback() {
        let (mut s, _) = session();
        s.record(PhraseRef::single("A"), "heading 090");
        s.record_pilot_readback("heading 180, N1AB");
        assert_eq!(s.pending_readback(), Some("heading 180, N1AB"));
        s.record(PhraseRef::single("B"), "heading 090");
        assert_eq!(s.pending_readback(), None);
        let mut sink: Vec<RadioMessage> = Vec::new();
        assert!(s.acknowledge(&mut sink).unwrap().correct);
    }

    #[test]
    fn request_repeat_replays_original_phrase() {
        let (mut s, _) = session();
        let original = PhraseRef::sequence(["N1AB", "ATC_CLIMB", "ALT_3000"]).unwrap();
        s.record(original.clone(), "climb and maintain 3000");
        let mut sink: Vec<RadioMessage> = Vec::new();
        s.request_repeat(&mut sink).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].sender, Sender::Pilot);
        assert_eq!(sink[0].text.as_deref(), Some("Say again, N1AB"));
        assert_eq!(sink[1].sender, Sender::Atc);
        assert_eq!(sink[1].phrase, original);
        assert_eq!(sink[1].text.as_deref(), Some("climb and maintain 3000"));
    }

    #[test]
    fn pilot_messages_carry_session_voice() {
        let (s, _) = session();
        let mut s = s.with_voice(Some("pilot_1".to_string()));
        s.record(PhraseRef::single("A"), "heading 090");
        let mut sink: Vec<RadioMessage> = Vec::new();
        s.acknowledge(&mut sink).unwrap();
        assert_eq!(sink[0].voice.as_deref(), Some("pilot_1"));
        assert!(sink[1].voice.is_none());
    }
}
