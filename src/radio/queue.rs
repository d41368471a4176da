//! Priority-ordered transmission queue on one half-duplex channel.
//!
//! The queue is the only thing allowed to key the shared frequency: it holds
//! at most one current message and walks it through
//! `Idle -> Transmitting -> Waiting -> Idle`, one step per `process` call.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::clock::Clock;
use crate::settings::{ConfigError, QueueSettings};

use super::message::{PhraseRef, Priority, RadioMessage, Sender};
use super::player::{RadioPlayer, TransmissionHandle};

/// Anything radio producers can publish into.
pub trait MessageSink {
    fn enqueue(&mut self, message: RadioMessage);
}

impl MessageSink for Vec<RadioMessage> {
    fn enqueue(&mut self, message: RadioMessage) {
        self.push(message);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Transmitting,
    Waiting,
}

/// What a single `process` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Started,
    Finished,
    Freed,
}

/// Entry in the delivered-transmission log.
#[derive(Clone, Debug, PartialEq)]
pub struct TransmissionRecord {
    pub sender: Sender,
    pub phrase: PhraseRef,
    pub text: Option<String>,
    pub priority: Priority,
    pub started_at: f64,
    pub ended_at: f64,
    pub interrupted: bool,
}

struct Current {
    message: RadioMessage,
    handle: Option<TransmissionHandle>,
    started_at: f64,
}

pub struct TransmissionQueue<P: RadioPlayer> {
    player: P,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
    rng: StdRng,
    backlog: VecDeque<RadioMessage>,
    state: ChannelState,
    current: Option<Current>,
    wait_until: f64,
    log: VecDeque<TransmissionRecord>,
}

impl<P: RadioPlayer> TransmissionQueue<P> {
    /// Fails on a delay range that cannot be sampled.
    pub fn new(
        player: P,
        clock: Arc<dyn Clock>,
        settings: QueueSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(TransmissionQueue {
            player,
            clock,
            settings,
            rng,
            backlog: VecDeque::new(),
            state: ChannelState::Idle,
            current: None,
            wait_until: 0.0,
            log: VecDeque::new(),
        })
    }

    /// Insert behind every message of equal or higher priority. An emergency
    /// cuts off a lower-priority transmission so it goes out on the next tick.
    pub fn enqueue(&mut self, mut message: RadioMessage) {
        if message.created_at.is_none() {
            message.created_at = Some(self.clock.now());
        }

        let pos = self
            .backlog
            .iter()
            .position(|queued| queued.priority < message.priority)
            .unwrap_or(self.backlog.len());

        let emergency = message.priority;
        log::debug!(
            "queued {} {} (priority {}, slot {})",
            message.sender,
            message.phrase,
            message.priority.value(),
            pos
        );
        self.backlog.insert(pos, message);

        if emergency.is_emergency() && self.state == ChannelState::Transmitting {
            let outranked = self
                .current
                .as_ref()
                .map_or(false, |cur| cur.message.priority < emergency);
            if outranked {
                self.interrupt();
            }
        }
    }

    /// Advance the channel state machine by one step. Never blocks.
    pub fn process(&mut self, dt: f64) -> Option<Transition> {
        self.clock.tick(dt);
        let now = self.clock.now();

        match self.state {
            ChannelState::Waiting => {
                if now >= self.wait_until {
                    self.state = ChannelState::Idle;
                    log::debug!("channel free at {:.2}", now);
                    return Some(Transition::Freed);
                }
                None
            }
            ChannelState::Transmitting => {
                if self.transmission_finished(now) {
                    self.complete(now);
                    return Some(Transition::Finished);
                }
                None
            }
            ChannelState::Idle => {
                let message = self.backlog.pop_front()?;
                Some(self.start(message, now))
            }
        }
    }

    fn start(&mut self, message: RadioMessage, now: f64) -> Transition {
        match self.player.start_transmission(&message) {
            Ok(handle) => {
                log::debug!("{} keyed: {}", message.sender, message.phrase);
                self.current = Some(Current {
                    message,
                    handle: Some(handle),
                    started_at: now,
                });
                self.state = ChannelState::Transmitting;
                Transition::Started
            }
            Err(e) => {
                // Zero-length transmission; the channel must keep moving.
                log::warn!("playback of {} failed: {}", message.phrase, e);
                self.current = Some(Current {
                    message,
                    handle: None,
                    started_at: now,
                });
                self.state = ChannelState::Transmitting;
                self.complete(now);
                Transition::Finished
            }
        }
    }

    fn transmission_finished(&self, now: f64) -> bool {
        let Some(cur) = self.current.as_ref() else {
            return true;
        };
        let Some(handle) = cur.handle else {
            return true;
        };
        match self.player.is_active(handle) {
            Some(active) => !active,
            None => now - cur.started_at >= self.settings.transmission_floor,
        }
    }

    fn complete(&mut self, now: f64) {
        let Some(mut cur) = self.current.take() else {
            self.state = ChannelState::Idle;
            return;
        };

        let wait = match cur.message.sender {
            Sender::Atc => self
                .rng
                .gen_range(self.settings.min_atc_delay..=self.settings.max_atc_delay),
            Sender::Pilot => cur.message.post_delay,
        };

        if let Some(callback) = cur.message.take_callback() {
            callback();
        }

        self.push_log(&cur, now, false);
        self.wait_until = now + wait;
        self.state = ChannelState::Waiting;
        log::debug!(
            "{} done after {:.2}s, channel held {:.2}s",
            cur.message.sender,
            now - cur.started_at,
            wait
        );
    }

    fn interrupt(&mut self) {
        let Some(cur) = self.current.take() else {
            return;
        };
        if let Some(handle) = cur.handle {
            self.player.stop(handle);
        }
        let now = self.clock.now();
        log::warn!("emergency traffic, cutting off {}", cur.message.phrase);
        self.push_log(&cur, now, true);
        self.state = ChannelState::Idle;
    }

    fn push_log(&mut self, cur: &Current, ended_at: f64, interrupted: bool) {
        self.log.push_back(TransmissionRecord {
            sender: cur.message.sender,
            phrase: cur.message.phrase.clone(),
            text: cur.message.text.clone(),
            priority: cur.message.priority,
            started_at: cur.started_at,
            ended_at,
            interrupted,
        });
        while self.log.len() > self.settings.log_size {
            self.log.pop_front();
        }
    }

    /// Drop everything not yet on the air. The current transmission is kept.
    pub fn clear(&mut self) {
        self.backlog.clear();
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            ChannelState::Transmitting | ChannelState::Waiting
        )
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn current(&self) -> Option<&RadioMessage> {
        self.current.as_ref().map(|cur| &cur.message)
    }

    /// Backlog length, excluding the current transmission.
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &RadioMessage> {
        self.backlog.iter()
    }

    /// Time the channel frees up, while waiting.
    pub fn wait_deadline(&self) -> Option<f64> {
        (self.state == ChannelState::Waiting).then_some(self.wait_until)
    }

    pub fn log(&self) -> &VecDeque<TransmissionRecord> {
        &self.log
    }

    /// Transmissions that ended within the last `seconds`.
    pub fn recent(&self, seconds: f64) -> Vec<&TransmissionRecord> {
        let now = self.clock.now();
        self.log
            .iter()
            .filter(|r| now - r.ended_at < seconds)
            .collect()
    }

    pub fn latest(&self) -> Option<&TransmissionRecord> {
        self.log.back()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }
}

impl<P: RadioPlayer> MessageSink for TransmissionQueue<P> {
    fn enqueue(&mut self, message: RadioMessage) {
        TransmissionQueue::enqueue(self, message);
    }
}
