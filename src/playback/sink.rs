//! Per-sink native playback.
//!
//! Each sink plays an asset through its own `aplay` child process. Stopping
//! is graceful: SIGTERM first, SIGKILL after a grace period. Asset duration
//! is probed from the WAV header for the completion estimate.

use crate::error::{Result, VoxcastError};
use crate::tts::backend::AudioAsset;
use crate::tts::job::SinkConfig;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A playback in progress on one sink.
pub trait SinkPlayback: Send {
    /// True once the underlying player has exited.
    fn is_finished(&mut self) -> bool;

    /// Terminates the player: signal, then force-kill after `grace`.
    ///
    /// Idempotent; a finished player is left alone.
    fn stop(&mut self, grace: Duration);
}

/// Native audio output backend addressed by sink.
pub trait AudioSinkBackend: Send + Sync {
    /// Starts playing `asset` on `sink`, returning a playback handle.
    fn play(&self, asset: &AudioAsset, sink: &SinkConfig) -> Result<Box<dyn SinkPlayback>>;

    /// Probes the asset's playback duration.
    fn probe_duration(&self, asset: &AudioAsset) -> Result<Duration>;
}

/// ALSA backend shelling out to `aplay`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaSinkBackend;

impl AlsaSinkBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl AudioSinkBackend for AlsaSinkBackend {
    fn play(&self, asset: &AudioAsset, sink: &SinkConfig) -> Result<Box<dyn SinkPlayback>> {
        let child = Command::new("aplay")
            .arg("-q")
            .arg("-D")
            .arg(sink.alsa_device())
            .arg(asset.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VoxcastError::Playback {
                message: format!("failed to launch aplay on {}: {}", sink.alsa_device(), e),
            })?;

        Ok(Box::new(AplayPlayback { child: Some(child) }))
    }

    fn probe_duration(&self, asset: &AudioAsset) -> Result<Duration> {
        let reader = hound::WavReader::open(asset.path()).map_err(|e| VoxcastError::Playback {
            message: format!("could not probe {}: {}", asset.path().display(), e),
        })?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(VoxcastError::Playback {
                message: format!("zero sample rate in {}", asset.path().display()),
            });
        }
        let frames = reader.duration() as u64;
        Ok(Duration::from_secs_f64(
            frames as f64 / spec.sample_rate as f64,
        ))
    }
}

struct AplayPlayback {
    child: Option<Child>,
}

impl AplayPlayback {
    fn child_exited(child: &mut Child) -> bool {
        // A wait error means the child is unreachable; treat as gone
        child.try_wait().map(|status| status.is_some()).unwrap_or(true)
    }
}

impl SinkPlayback for AplayPlayback {
    fn is_finished(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => Self::child_exited(child),
            None => true,
        }
    }

    fn stop(&mut self, grace: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if Self::child_exited(&mut child) {
            return;
        }

        // SIGTERM lets aplay drain its buffer and release the device
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if Self::child_exited(&mut child) {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        if let Err(e) = child.kill() {
            eprintln!("voxcast: failed to kill playback process: {}", e);
        }
        let _ = child.wait();
    }
}

impl Drop for AplayPlayback {
    fn drop(&mut self) {
        // Reap a finished child; never linger on a live one here. Explicit
        // stop is the owner's job
        if let Some(child) = self.child.as_mut() {
            let _ = child.try_wait();
        }
    }
}

/// Record of one `play` invocation on the mock backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRecord {
    /// Asset path as a string.
    pub asset: String,
    /// Sink ALSA address.
    pub sink: String,
    /// Global launch order across all sinks.
    pub launch_index: u32,
}

/// Mock sink backend for testing.
///
/// Records launches in order, scripts per-call failures, and lets tests
/// finish playbacks on demand.
#[derive(Clone)]
pub struct MockSinkBackend {
    launches: Arc<Mutex<Vec<PlayRecord>>>,
    launch_counter: Arc<AtomicU32>,
    call_counter: Arc<AtomicU32>,
    play_failures: Arc<AtomicU32>,
    fail_on_calls: Arc<Mutex<Vec<u32>>>,
    stops: Arc<AtomicU32>,
    probe_duration: Arc<Mutex<Option<Duration>>>,
    active: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl MockSinkBackend {
    /// Creates a mock whose playbacks finish immediately and whose probe
    /// reports a zero duration.
    pub fn new() -> Self {
        Self {
            launches: Arc::new(Mutex::new(Vec::new())),
            launch_counter: Arc::new(AtomicU32::new(0)),
            call_counter: Arc::new(AtomicU32::new(0)),
            play_failures: Arc::new(AtomicU32::new(0)),
            fail_on_calls: Arc::new(Mutex::new(Vec::new())),
            stops: Arc::new(AtomicU32::new(0)),
            probe_duration: Arc::new(Mutex::new(Some(Duration::ZERO))),
            active: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes the first `n` play calls fail.
    pub fn with_play_failures(self, n: u32) -> Self {
        self.play_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Makes the play call with the given zero-based index fail.
    pub fn with_play_failure_on(self, call_index: u32) -> Self {
        if let Ok(mut calls) = self.fail_on_calls.lock() {
            calls.push(call_index);
        }
        self
    }

    /// Sets the probed duration for every asset.
    pub fn with_probe_duration(self, duration: Duration) -> Self {
        if let Ok(mut probe) = self.probe_duration.lock() {
            *probe = Some(duration);
        }
        self
    }

    /// Makes duration probing fail (exercises the fallback wait).
    pub fn with_probe_failure(self) -> Self {
        if let Ok(mut probe) = self.probe_duration.lock() {
            *probe = None;
        }
        self
    }

    /// Launches seen so far, in launch order.
    pub fn launches(&self) -> Vec<PlayRecord> {
        self.launches
            .lock()
            .map(|launches| launches.clone())
            .unwrap_or_default()
    }

    /// Number of explicit stops delivered to playbacks.
    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Marks every outstanding playback finished.
    pub fn finish_all(&self) {
        if let Ok(active) = self.active.lock() {
            for flag in active.iter() {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Default for MockSinkBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSinkBackend for MockSinkBackend {
    fn play(&self, asset: &AudioAsset, sink: &SinkConfig) -> Result<Box<dyn SinkPlayback>> {
        let call = self.call_counter.fetch_add(1, Ordering::SeqCst);
        let indexed_failure = self
            .fail_on_calls
            .lock()
            .map(|calls| calls.contains(&call))
            .unwrap_or(false);
        let failures = self.play_failures.load(Ordering::SeqCst);
        if indexed_failure || failures > 0 {
            if failures > 0 {
                self.play_failures.store(failures - 1, Ordering::SeqCst);
            }
            return Err(VoxcastError::Playback {
                message: format!("mock play failure on {}", sink.alsa_device()),
            });
        }

        let launch_index = self.launch_counter.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(PlayRecord {
                asset: asset.path().display().to_string(),
                sink: sink.alsa_device(),
                launch_index,
            });
        }

        let finished = Arc::new(AtomicBool::new(false));
        if let Ok(mut active) = self.active.lock() {
            active.push(finished.clone());
        }
        Ok(Box::new(MockSinkPlayback {
            finished,
            stops: self.stops.clone(),
        }))
    }

    fn probe_duration(&self, _asset: &AudioAsset) -> Result<Duration> {
        match self.probe_duration.lock() {
            Ok(probe) => probe.ok_or_else(|| VoxcastError::Playback {
                message: "mock probe failure".to_string(),
            }),
            Err(_) => Ok(Duration::ZERO),
        }
    }
}

struct MockSinkPlayback {
    finished: Arc<AtomicBool>,
    stops: Arc<AtomicU32>,
}

impl SinkPlayback for MockSinkPlayback {
    fn is_finished(&mut self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn stop(&mut self, _grace: Duration) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_wav(path: &std::path::Path, seconds: f64, sample_rate: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let samples = (seconds * sample_rate as f64) as usize;
        for _ in 0..samples {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_probe_duration_from_wav_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_seconds.wav");
        write_wav(&path, 2.0, 16_000);

        let backend = AlsaSinkBackend::new();
        let duration = backend.probe_duration(&AudioAsset::new(&path)).unwrap();
        assert!((duration.as_secs_f64() - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_probe_duration_missing_file() {
        let backend = AlsaSinkBackend::new();
        let result = backend.probe_duration(&AudioAsset::new("/nonexistent/x.wav"));
        assert!(matches!(result, Err(VoxcastError::Playback { .. })));
    }

    #[test]
    fn test_probe_duration_not_a_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_audio.wav");
        std::fs::write(&path, b"this is not a wav file").unwrap();

        let backend = AlsaSinkBackend::new();
        assert!(backend.probe_duration(&AudioAsset::new(&path)).is_err());
    }

    #[test]
    fn test_mock_records_launch_order() {
        let backend = MockSinkBackend::new();
        let asset = AudioAsset::new("/tmp/a.wav");

        backend.play(&asset, &SinkConfig::new(1, 0)).unwrap();
        backend.play(&asset, &SinkConfig::new(2, 0)).unwrap();

        let launches = backend.launches();
        assert_eq!(launches.len(), 2);
        assert_eq!(launches[0].sink, "hw:1,0");
        assert_eq!(launches[0].launch_index, 0);
        assert_eq!(launches[1].sink, "hw:2,0");
        assert_eq!(launches[1].launch_index, 1);
    }

    #[test]
    fn test_mock_play_failures() {
        let backend = MockSinkBackend::new().with_play_failures(1);
        let asset = AudioAsset::new("/tmp/a.wav");

        assert!(backend.play(&asset, &SinkConfig::new(1, 0)).is_err());
        assert!(backend.play(&asset, &SinkConfig::new(1, 0)).is_ok());
    }

    #[test]
    fn test_mock_playback_finish_and_stop() {
        let backend = MockSinkBackend::new();
        let asset = AudioAsset::new("/tmp/a.wav");

        let mut playback = backend.play(&asset, &SinkConfig::new(1, 0)).unwrap();
        assert!(!playback.is_finished());

        backend.finish_all();
        assert!(playback.is_finished());

        // Stopping a finished playback does not count as a stop
        playback.stop(Duration::ZERO);
        assert_eq!(backend.stop_count(), 0);

        let mut second = backend.play(&asset, &SinkConfig::new(2, 0)).unwrap();
        second.stop(Duration::ZERO);
        assert_eq!(backend.stop_count(), 1);
        assert!(second.is_finished());
    }

    #[test]
    fn test_mock_probe_modes() {
        let backend = MockSinkBackend::new().with_probe_duration(Duration::from_secs(3));
        let asset = AudioAsset::new("/tmp/a.wav");
        assert_eq!(
            backend.probe_duration(&asset).unwrap(),
            Duration::from_secs(3)
        );

        let failing = MockSinkBackend::new().with_probe_failure();
        assert!(failing.probe_duration(&asset).is_err());
    }
}
