/// Pilot/controller radio engine.
///
/// Ties the shared transmission queue to the two producers that feed it: the
/// readback session (pilot side) and the progressive taxi manager (ground
/// controller side). Call `tick` once per frame.

pub mod phraseology;
pub mod types;

use std::sync::Arc;

use crate::clock::Clock;
use crate::radio::{RadioMessage, RadioPlayer, Sender, Transition, TransmissionQueue};
use crate::readback::{ReadbackCheck, ReadbackSession, SessionError};
use crate::settings::{ConfigError, RadioSettings};
use crate::taxi::{ActiveClearance, ClearanceError, ProgressiveTaxiManager, RouteLeg, TaxiRouteProvider};

use phraseology::{Phraseology, TemplatePhraseology};
pub use types::{EventOutcome, RadioEvent};

/// Controller transmissions that are answers to a readback, never
/// instructions of their own.
const NOT_INSTRUCTIONS: &[&str] = &[
    phraseology::ATC_READBACK_CORRECT,
    phraseology::ATC_READBACK_INCORRECT,
];

pub struct RadioEngine<P: RadioPlayer> {
    queue: TransmissionQueue<P>,
    session: ReadbackSession,
    taxi: ProgressiveTaxiManager,
    clock: Arc<dyn Clock>,
    /// Record controller transmissions into the readback history as they
    /// go out on the air.
    auto_record: bool,
}

impl<P: RadioPlayer> RadioEngine<P> {
    pub fn new(
        settings: &RadioSettings,
        player: P,
        clock: Arc<dyn Clock>,
        routes: Box<dyn TaxiRouteProvider>,
    ) -> Result<Self, ConfigError> {
        Self::with_phraseology(
            settings,
            player,
            clock,
            routes,
            Arc::new(TemplatePhraseology::new()),
        )
    }

    pub fn with_phraseology(
        settings: &RadioSettings,
        player: P,
        clock: Arc<dyn Clock>,
        routes: Box<dyn TaxiRouteProvider>,
        phraseology: Arc<dyn Phraseology>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let queue = TransmissionQueue::new(player, clock.clone(), settings.queue.clone())?;
        let session = ReadbackSession::new(
            settings.callsign.as_str(),
            settings.readback.clone(),
            phraseology.clone(),
            clock.clone(),
        )
        .with_voice(settings.voice.clone());
        let taxi = ProgressiveTaxiManager::new(settings, routes, phraseology, clock.clone());

        Ok(RadioEngine {
            queue,
            session,
            taxi,
            clock,
            auto_record: true,
        })
    }

    pub fn set_auto_record(&mut self, enabled: bool) {
        self.auto_record = enabled;
    }

    /// Advance the channel by one step.
    pub fn tick(&mut self, dt: f64) -> Option<Transition> {
        let transition = self.queue.process(dt);
        if transition == Some(Transition::Started) && self.auto_record {
            self.record_on_air();
        }
        transition
    }

    fn record_on_air(&mut self) {
        let Some(msg) = self.queue.current() else {
            return;
        };
        if msg.sender != Sender::Atc {
            return;
        }
        let Some(text) = msg.text.as_deref() else {
            return;
        };
        if msg.phrase.ids().iter().any(|id| NOT_INSTRUCTIONS.contains(id)) {
            return;
        }
        // A "say again" replay is the instruction already on file.
        if let Some(latest) = self.session.latest() {
            if latest.phrase == msg.phrase && latest.text.as_deref() == Some(text) {
                return;
            }
        }
        self.session.record(msg.phrase.clone(), text);
    }

    pub fn handle_event(&mut self, event: RadioEvent) -> EventOutcome {
        match event {
            RadioEvent::PositionUpdated(update) => {
                if self.taxi.on_position_update(&update, &mut self.queue) {
                    EventOutcome::Handled
                } else {
                    EventOutcome::Ignored
                }
            }
            RadioEvent::InstructionRecorded { phrase, text } => {
                self.session.record(phrase, &text);
                EventOutcome::Handled
            }
            RadioEvent::PilotReadback(text) => {
                self.session.record_pilot_readback(text);
                EventOutcome::Handled
            }
            RadioEvent::HoldingShort { aircraft_id } => {
                match self.taxi.report_holding_short(&aircraft_id, &mut self.queue) {
                    Ok(true) => EventOutcome::Handled,
                    Ok(false) => EventOutcome::Ignored,
                    Err(e) => {
                        log::warn!("holding short report ignored: {}", e);
                        EventOutcome::Ignored
                    }
                }
            }
        }
    }

    // --- Pilot requests ---

    pub fn acknowledge(&mut self) -> Result<ReadbackCheck, SessionError> {
        self.session.acknowledge(&mut self.queue)
    }

    pub fn request_repeat(&mut self) -> Result<(), SessionError> {
        self.session.request_repeat(&mut self.queue)
    }

    /// Ask ground for taxi from `parking_id` to `runway` for our own aircraft.
    pub fn request_taxi(
        &mut self,
        parking_id: &str,
        runway: &str,
        route: Option<&[RouteLeg]>,
    ) -> Result<&ActiveClearance, ClearanceError> {
        let callsign = self.session.callsign().to_string();
        self.taxi
            .issue_initial_clearance(&callsign, parking_id, runway, route, &mut self.queue)
    }

    pub fn cancel_taxi(&mut self) -> bool {
        let callsign = self.session.callsign().to_string();
        self.taxi.cancel(&callsign).is_some()
    }

    /// Put an arbitrary transmission on the channel.
    pub fn enqueue(&mut self, message: RadioMessage) {
        self.queue.enqueue(message);
    }

    // --- Accessors ---

    pub fn queue(&self) -> &TransmissionQueue<P> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut TransmissionQueue<P> {
        &mut self.queue
    }

    pub fn session(&self) -> &ReadbackSession {
        &self.session
    }

    pub fn taxi(&self) -> &ProgressiveTaxiManager {
        &self.taxi
    }

    pub fn callsign(&self) -> &str {
        self.session.callsign()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::radio::{ChannelState, HeadlessPlayer, PhraseRef, Priority};
    use crate::taxi::{PositionUpdate, StaticRoutes};

    fn engine() -> (RadioEngine<HeadlessPlayer>, SimClock) {
        let clock = SimClock::new();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let mut settings = RadioSettings::default();
        settings.queue.seed = Some(7);
        let routes = StaticRoutes::new().with_route(
            "gate_a3",
            "31",
            vec![RouteLeg::taxiway("A"), RouteLeg::taxiway("B")],
        );
        let engine = RadioEngine::new(
            &settings,
            HeadlessPlayer::new(shared.clone()),
            shared,
            Box::new(routes),
        )
        .unwrap();
        (engine, clock)
    }

    /// Tick until the channel has nothing left to do.
    fn drain(engine: &mut RadioEngine<HeadlessPlayer>) {
        for _ in 0..2000 {
            engine.tick(0.25);
            if engine.queue().is_empty() && engine.queue().state() == ChannelState::Idle {
                return;
            }
        }
        panic!("channel never drained");
    }

    #[test]
    fn taxi_flow_end_to_end() {
        let (mut engine, _clock) = engine();
        let segments = engine.request_taxi("gate_a3", "31", None).unwrap().segments.len();
        assert_eq!(segments, 3);
        drain(&mut engine);

        // The clearance went out and was recorded for readback.
        let latest = engine.session().latest().unwrap();
        assert_eq!(latest.elements.get(&crate::readback::ElementKind::Runway).map(String::as_str), Some("31"));

        let outcome = engine.handle_event(RadioEvent::PositionUpdated(PositionUpdate::new("N1AB", "A", 20.0)));
        assert_eq!(outcome, EventOutcome::Handled);
        engine.handle_event(RadioEvent::PositionUpdated(PositionUpdate::new("N1AB", "B", 300.0)));
        engine.handle_event(RadioEvent::PositionUpdated(PositionUpdate::new("N1AB", "B", 20.0)));
        let outcome = engine.handle_event(RadioEvent::HoldingShort { aircraft_id: "N1AB".into() });
        assert_eq!(outcome, EventOutcome::Handled);
        drain(&mut engine);

        let texts: Vec<_> = engine
            .queue()
            .log()
            .iter()
            .filter_map(|r| r.text.clone())
            .collect();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[3], "N1AB, hold short runway 31, contact tower 120.5");
        assert!(engine.taxi().clearance("N1AB").unwrap().is_complete);
    }

    #[test]
    fn acknowledge_reads_back_auto_recorded_instruction() {
        let (mut engine, _clock) = engine();
        engine.enqueue(
            RadioMessage::atc(PhraseRef::single("ATC_CLIMB"), Priority::NORMAL)
                .with_text("N1AB, climb and maintain 5000, contact departure 125.35"),
        );
        drain(&mut engine);
        assert_eq!(engine.session().len(), 1);

        let check = engine.acknowledge().unwrap();
        assert!(check.correct);
        drain(&mut engine);

        let log = engine.queue().log();
        let readback = &log[log.len() - 2];
        assert_eq!(readback.sender, Sender::Pilot);
        assert_eq!(readback.text.as_deref(), Some("maintain 5000 feet, 125.35, N1AB"));
        assert_eq!(log[log.len() - 1].text.as_deref(), Some("N1AB, readback correct"));
        // The confirmation is not an instruction.
        assert_eq!(engine.session().len(), 1);
    }

    #[test]
    fn wrong_pilot_readback_gets_corrected() {
        let (mut engine, _clock) = engine();
        engine.handle_event(RadioEvent::InstructionRecorded {
            phrase: PhraseRef::single("ATC_HEADING"),
            text: "N1AB, turn left heading 270".into(),
        });
        engine.handle_event(RadioEvent::PilotReadback("left heading 250, N1AB".into()));
        let check = engine.acknowledge().unwrap();
        assert!(!check.correct);
        drain(&mut engine);
        let last = engine.queue().latest().unwrap();
        assert_eq!(
            last.text.as_deref(),
            Some("N1AB, negative, heading: expected 270, read back 250")
        );
    }

    #[test]
    fn repeat_replay_is_not_recorded_twice() {
        let (mut engine, _clock) = engine();
        engine.enqueue(
            RadioMessage::atc(PhraseRef::single("ATC_SQUAWK"), Priority::NORMAL)
                .with_text("N1AB, squawk 4521"),
        );
        drain(&mut engine);
        engine.request_repeat().unwrap();
        drain(&mut engine);
        assert_eq!(engine.session().len(), 1);
        assert_eq!(engine.queue().log().len(), 3);
    }

    #[test]
    fn auto_record_can_be_disabled() {
        let (mut engine, _clock) = engine();
        engine.set_auto_record(false);
        engine.enqueue(
            RadioMessage::atc(PhraseRef::single("ATC_SQUAWK"), Priority::NORMAL)
                .with_text("N1AB, squawk 4521"),
        );
        drain(&mut engine);
        assert!(engine.session().is_empty());
        assert_eq!(engine.acknowledge(), Err(SessionError::NothingToAcknowledge));
    }

    #[test]
    fn taxi_instruction_on_air_replaces_pending_readback() {
        let (mut engine, _clock) = engine();
        engine.request_taxi("gate_a3", "31", None).unwrap();
        drain(&mut engine);
        engine.handle_event(RadioEvent::PilotReadback("runway 31, N1AB".into()));
        assert_eq!(engine.session().pending_readback(), Some("runway 31, N1AB"));

        engine.handle_event(RadioEvent::PositionUpdated(PositionUpdate::new("N1AB", "A", 20.0)));
        drain(&mut engine);
        assert_eq!(engine.session().pending_readback(), None);
        assert_eq!(
            engine.session().latest().unwrap().text.as_deref(),
            Some("N1AB, continue via B")
        );
    }

    #[test]
    fn invalid_settings_rejected_before_anything_runs() {
        let shared: Arc<dyn Clock> = Arc::new(SimClock::new());
        let mut settings = RadioSettings::default();
        settings.queue.min_atc_delay = 5.0;
        settings.queue.max_atc_delay = 1.0;
        let result = RadioEngine::new(
            &settings,
            HeadlessPlayer::new(shared.clone()),
            shared,
            Box::new(StaticRoutes::new()),
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn holding_short_for_unknown_aircraft_is_ignored() {
        let (mut engine, _clock) = engine();
        let outcome = engine.handle_event(RadioEvent::HoldingShort { aircraft_id: "N9ZZ".into() });
        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(engine.queue().is_empty());
        assert!(!engine.cancel_taxi());
    }
}
