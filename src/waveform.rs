use crate::samples::SampleStore;

pub const VIEWPORT_N: usize = 200;
pub const DEFAULT_HALF_WIDTH_SECONDS: f64 = 0.1;

const NORMALIZE_FLOOR: f32 = 1e-9;

/// Decimated absolute amplitudes around the playhead, scaled to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformWindow {
    samples: [f32; VIEWPORT_N],
}

impl WaveformWindow {
    pub fn zeroed() -> Self {
        Self {
            samples: [0.0; VIEWPORT_N],
        }
    }

    pub fn samples(&self) -> &[f32; VIEWPORT_N] {
        &self.samples
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|value| *value == 0.0)
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().copied().fold(0.0_f32, f32::max)
    }
}

impl Default for WaveformWindow {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Receives a fresh window on every tick.
pub trait WaveformSink {
    fn present(&mut self, window: &WaveformWindow);
}

/// Slices `half_width_seconds` either side of `elapsed_seconds` out of `store`
/// and resamples it to [`VIEWPORT_N`] points.
pub fn window(store: &SampleStore, elapsed_seconds: f64, half_width_seconds: f64) -> WaveformWindow {
    let Some(slice) = visible_slice(store, elapsed_seconds, half_width_seconds) else {
        return WaveformWindow::zeroed();
    };

    let mut samples = resample_abs(slice);
    let peak = samples.iter().copied().fold(0.0_f32, f32::max).max(NORMALIZE_FLOOR);
    for value in &mut samples {
        *value = (*value / peak).clamp(0.0, 1.0);
    }
    WaveformWindow { samples }
}

fn visible_slice(store: &SampleStore, elapsed_seconds: f64, half_width_seconds: f64) -> Option<&[f32]> {
    let amplitudes = store.amplitudes();
    let sample_rate = store.sample_rate();
    if amplitudes.is_empty() || sample_rate <= 0.0 || !elapsed_seconds.is_finite() {
        return None;
    }

    let center = (elapsed_seconds * sample_rate).floor() as i64;
    let half = (half_width_seconds.max(0.0) * sample_rate).floor() as i64;
    let len = amplitudes.len() as i64;
    let start = center.saturating_sub(half).clamp(0, len);
    let end = center.saturating_add(half).clamp(0, len);
    (start < end).then(|| &amplitudes[start as usize..end as usize])
}

fn resample_abs(slice: &[f32]) -> [f32; VIEWPORT_N] {
    let mut out = [0.0_f32; VIEWPORT_N];
    let last = slice.len() - 1;
    let step = last as f64 / (VIEWPORT_N - 1) as f64;

    for (idx, value) in out.iter_mut().enumerate() {
        let position = idx as f64 * step;
        let lower = (position.floor() as usize).min(last);
        let upper = (lower + 1).min(last);
        let frac = (position - lower as f64) as f32;
        let a = slice[lower].abs();
        let b = slice[upper].abs();
        *value = a + (b - a) * frac;
    }
    out
}
