use crate::audio::PlaybackBackend;

/// Slack allowed between the backend position and what the clock expects
/// before a reading is counted as a desync.
pub const DESYNC_TOLERANCE_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportState {
    pub elapsed_seconds: f64,
    pub is_playing: bool,
}

impl TransportState {
    pub fn stopped() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockReading {
    Position(TransportState),
    /// The backend reported its negative sentinel. Whether that is a finished
    /// track or a deliberate stop is for the caller to decide.
    EndOfTrack,
}

#[derive(Debug, Clone, Default)]
pub struct TransportClock {
    duration_seconds: Option<f64>,
    origin_seconds: f64,
    last_elapsed: Option<f64>,
    desync_count: u32,
}

impl TransportClock {
    pub fn new(duration_seconds: Option<f64>) -> Self {
        Self {
            duration_seconds: duration_seconds.filter(|duration| *duration > 0.0),
            ..Self::default()
        }
    }

    pub fn set_duration(&mut self, duration_seconds: Option<f64>) {
        self.duration_seconds = duration_seconds.filter(|duration| *duration > 0.0);
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    /// Call after asking the backend to start at `offset_seconds`.
    pub fn rebase(&mut self, offset_seconds: f64) {
        self.origin_seconds = offset_seconds.max(0.0);
        self.last_elapsed = None;
    }

    pub fn reset(&mut self) {
        self.origin_seconds = 0.0;
        self.last_elapsed = None;
    }

    pub fn desync_count(&self) -> u32 {
        self.desync_count
    }

    pub fn tick(&mut self, backend: &dyn PlaybackBackend) -> ClockReading {
        let position_ms = backend.position_millis();
        if position_ms < 0 {
            self.last_elapsed = None;
            return ClockReading::EndOfTrack;
        }

        let reported = position_ms as f64 / 1_000.0;
        let raw = if backend.position_is_relative() {
            self.origin_seconds + reported
        } else {
            reported
        };
        self.check_drift(raw);

        let mut elapsed = raw.max(0.0);
        if let Some(duration) = self.duration_seconds {
            elapsed = elapsed.min(duration);
        }
        self.last_elapsed = Some(elapsed);

        ClockReading::Position(TransportState {
            elapsed_seconds: elapsed,
            is_playing: true,
        })
    }

    fn check_drift(&mut self, raw: f64) {
        let overrun = self
            .duration_seconds
            .is_some_and(|duration| raw > duration + DESYNC_TOLERANCE_SECONDS);
        let rewound = self
            .last_elapsed
            .is_some_and(|last| raw + DESYNC_TOLERANCE_SECONDS < last);

        if overrun || rewound {
            self.desync_count = self.desync_count.saturating_add(1);
            log::debug!(
                "backend position {raw:.3}s out of step (last {:?}, duration {:?})",
                self.last_elapsed,
                self.duration_seconds
            );
        }
    }
}
