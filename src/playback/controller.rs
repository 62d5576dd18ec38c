//! Dual-sink playback control.
//!
//! Plays one audio asset on two physical sinks at once. A new playback
//! silently supersedes a prior active one (the only case where an
//! announcement is interrupted mid-asset). Completion is estimated from the
//! probed asset duration plus a safety buffer, with an early return as soon
//! as both players have exited.

use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::playback::sink::{AudioSinkBackend, SinkPlayback};
use crate::tts::backend::AudioAsset;
use crate::tts::job::SinkConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll tick for completion waits.
const WAIT_TICK: Duration = Duration::from_millis(50);

/// Controls simultaneous playback on two output sinks.
pub struct DualSinkPlaybackController {
    backend: Arc<dyn AudioSinkBackend>,
    config: PlaybackConfig,
    current: Mutex<Vec<Box<dyn SinkPlayback>>>,
}

impl DualSinkPlaybackController {
    /// Creates a controller over the given sink backend.
    pub fn new(backend: Arc<dyn AudioSinkBackend>, config: PlaybackConfig) -> Self {
        Self {
            backend,
            config,
            current: Mutex::new(Vec::new()),
        }
    }

    /// Starts playing `asset` on both sinks, superseding any active playback.
    ///
    /// The two players are launched back-to-back with no intervening work.
    /// If the second launch fails the first is stopped and the error
    /// propagates.
    pub fn play(&self, asset: &AudioAsset, sink1: &SinkConfig, sink2: &SinkConfig) -> Result<()> {
        let mut current = lock_current(&self.current);
        self.stop_locked(&mut current);

        let first = self.backend.play(asset, sink1)?;
        let second = match self.backend.play(asset, sink2) {
            Ok(playback) => playback,
            Err(e) => {
                let mut first = first;
                first.stop(self.config.grace_timeout());
                return Err(e);
            }
        };

        *current = vec![first, second];
        Ok(())
    }

    /// Stops the active playback on both sinks, gracefully.
    pub fn stop(&self) {
        let mut current = lock_current(&self.current);
        self.stop_locked(&mut current);
    }

    /// True while either sink still has a live player.
    pub fn is_playing(&self) -> bool {
        let mut current = lock_current(&self.current);
        current.iter_mut().any(|playback| !playback.is_finished())
    }

    /// Blocks until the current playback window has elapsed.
    ///
    /// The window is the probed asset duration plus a safety buffer; if
    /// probing fails, a fixed fallback wait applies. Returns early once both
    /// players have exited.
    pub fn wait_for_completion(&self, asset: &AudioAsset) {
        let never = AtomicBool::new(false);
        self.wait_for_completion_cancellable(asset, &never);
    }

    /// [`wait_for_completion`](Self::wait_for_completion) that also returns
    /// when `cancel` becomes true.
    pub fn wait_for_completion_cancellable(&self, asset: &AudioAsset, cancel: &AtomicBool) {
        let window = match self.backend.probe_duration(asset) {
            Ok(duration) => duration + self.config.completion_safety_buffer(),
            Err(_) => self.config.completion_fallback_wait(),
        };
        let deadline = Instant::now() + window;

        while Instant::now() < deadline {
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            if !self.is_playing() {
                return;
            }
            std::thread::sleep(WAIT_TICK);
        }
    }

    fn stop_locked(&self, current: &mut Vec<Box<dyn SinkPlayback>>) {
        let grace = self.config.grace_timeout();
        for playback in current.iter_mut() {
            playback.stop(grace);
        }
        current.clear();
    }
}

fn lock_current(
    current: &Mutex<Vec<Box<dyn SinkPlayback>>>,
) -> std::sync::MutexGuard<'_, Vec<Box<dyn SinkPlayback>>> {
    match current.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
