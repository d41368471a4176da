use std::collections::HashSet;
use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::clock::Clock;

use super::message::{PhraseRef, RadioMessage, Sender};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("playback failed to start: {0}")]
    StartFailed(String),

    #[error("audio thread has hung up")]
    ChannelClosed,
}

/// Opaque id of one started transmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransmissionHandle(pub u64);

/// Whatever actually renders a transmission to sound.
pub trait RadioPlayer {
    fn start_transmission(
        &mut self,
        message: &RadioMessage,
    ) -> Result<TransmissionHandle, PlayerError>;

    /// `Some(false)` once playback has ended. `None` means the player cannot
    /// tell, and the queue falls back to its minimum-duration heuristic.
    fn is_active(&self, _handle: TransmissionHandle) -> Option<bool> {
        None
    }

    /// Cut off an in-flight transmission.
    fn stop(&mut self, _handle: TransmissionHandle) {}
}

// ── Headless player ──────────────────────────────────────────────────

/// Seconds of speech per spoken word (~150 wpm radio cadence).
const SECONDS_PER_WORD: f64 = 0.4;
/// Shortest transmission: keying the mic plus a clipped phrase.
const MIN_TRANSMISSION_SECS: f64 = 1.0;

/// Logs transmissions and estimates their length from the word count.
/// Used by the CLI and anywhere no audio device exists.
pub struct HeadlessPlayer {
    clock: Arc<dyn Clock>,
    next_id: u64,
    /// The one transmission on the air and when it ends. The queue never
    /// starts a second one before the first is done.
    on_air: Option<(TransmissionHandle, f64)>,
}

impl HeadlessPlayer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        HeadlessPlayer {
            clock,
            next_id: 0,
            on_air: None,
        }
    }

    /// Handle of the transmission still being spoken, if any.
    pub fn on_air(&self) -> Option<TransmissionHandle> {
        let now = self.clock.now();
        self.on_air
            .filter(|(_, end)| now < *end)
            .map(|(handle, _)| handle)
    }

    pub fn estimate_duration(message: &RadioMessage) -> f64 {
        let words = match &message.text {
            Some(text) => text.split_whitespace().count(),
            // Canned phrases: assume a short clip per id.
            None => message.phrase.ids().len() * 3,
        };
        (words as f64 * SECONDS_PER_WORD).max(MIN_TRANSMISSION_SECS)
    }
}

impl RadioPlayer for HeadlessPlayer {
    fn start_transmission(
        &mut self,
        message: &RadioMessage,
    ) -> Result<TransmissionHandle, PlayerError> {
        let handle = TransmissionHandle(self.next_id);
        self.next_id += 1;

        let duration = Self::estimate_duration(message);
        self.on_air = Some((handle, self.clock.now() + duration));

        log::info!(
            "[{}] {} ({:.1}s)",
            message.sender,
            message.display_text(),
            duration
        );
        Ok(handle)
    }

    fn is_active(&self, handle: TransmissionHandle) -> Option<bool> {
        let now = self.clock.now();
        Some(matches!(self.on_air, Some((h, end)) if h == handle && now < end))
    }

    fn stop(&mut self, handle: TransmissionHandle) {
        if matches!(self.on_air, Some((h, _)) if h == handle) {
            self.on_air = None;
            log::info!("transmission {} cut off", handle.0);
        }
    }
}

// ── Channel player ───────────────────────────────────────────────────

/// Commands sent to an external audio thread.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackCommand {
    Play {
        handle: TransmissionHandle,
        sender: Sender,
        phrase: PhraseRef,
        text: Option<String>,
        voice: Option<String>,
    },
    Stop(TransmissionHandle),
}

type ActiveSet = Arc<Mutex<HashSet<TransmissionHandle>>>;

fn lock(active: &ActiveSet) -> MutexGuard<'_, HashSet<TransmissionHandle>> {
    // A panicked audio thread must not wedge the channel.
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clonable handle the audio thread uses to report finished playback.
#[derive(Clone)]
pub struct PlaybackMonitor {
    active: ActiveSet,
}

impl PlaybackMonitor {
    pub fn finish(&self, handle: TransmissionHandle) {
        lock(&self.active).remove(&handle);
    }
}

/// Forwards transmissions over an mpsc channel, the way a TTS synthesis
/// thread is fed. Completion is authoritative once the audio side reports it.
pub struct ChannelPlayer {
    sender: mpsc::Sender<PlaybackCommand>,
    active: ActiveSet,
    next_id: u64,
}

impl ChannelPlayer {
    pub fn new() -> (Self, mpsc::Receiver<PlaybackCommand>, PlaybackMonitor) {
        let (sender, receiver) = mpsc::channel();
        let active: ActiveSet = Arc::new(Mutex::new(HashSet::new()));
        let monitor = PlaybackMonitor {
            active: active.clone(),
        };
        let player = ChannelPlayer {
            sender,
            active,
            next_id: 0,
        };
        (player, receiver, monitor)
    }
}

impl RadioPlayer for ChannelPlayer {
    fn start_transmission(
        &mut self,
        message: &RadioMessage,
    ) -> Result<TransmissionHandle, PlayerError> {
        let handle = TransmissionHandle(self.next_id);
        self.next_id += 1;

        lock(&self.active).insert(handle);
        let command = PlaybackCommand::Play {
            handle,
            sender: message.sender,
            phrase: message.phrase.clone(),
            text: message.text.clone(),
            voice: message.voice.clone(),
        };
        if self.sender.send(command).is_err() {
            lock(&self.active).remove(&handle);
            return Err(PlayerError::ChannelClosed);
        }
        Ok(handle)
    }

    fn is_active(&self, handle: TransmissionHandle) -> Option<bool> {
        Some(lock(&self.active).contains(&handle))
    }

    fn stop(&mut self, handle: TransmissionHandle) {
        lock(&self.active).remove(&handle);
        let _ = self.sender.send(PlaybackCommand::Stop(handle));
    }
}
