use crate::audio::decode::{DecodedAudio, SampleDecoder};
use crate::error::DecodeError;
use crate::model::Track;

/// Mono amplitudes of the prepared track, normalized to `[-1, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleStore {
    amplitudes: Vec<f32>,
    duration_seconds: f64,
}

impl SampleStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decodes `track` for visualization. Failures degrade to an empty store;
    /// they never stop the backend from trying to play the track.
    pub fn prepare(track: &Track, decoder: &dyn SampleDecoder) -> Self {
        let result = decoder
            .decode(track.path())
            .and_then(Self::from_decoded);
        match result {
            Ok(store) => {
                log::debug!(
                    "prepared {} samples ({:.2}s) for {}",
                    store.len(),
                    store.duration_seconds,
                    track.location
                );
                store
            }
            Err(err) => {
                log::warn!("waveform unavailable for {}: {err}", track.location);
                Self::empty()
            }
        }
    }

    pub fn from_decoded(decoded: DecodedAudio) -> Result<Self, DecodeError> {
        if decoded.channel_count == 0 {
            return Err(DecodeError::InvalidFormat(String::from("zero channels")));
        }
        if decoded.sample_rate == 0 {
            return Err(DecodeError::InvalidFormat(String::from("zero sample rate")));
        }
        if !(1..=32).contains(&decoded.sample_width_bits) {
            return Err(DecodeError::InvalidFormat(format!(
                "sample width of {} bits",
                decoded.sample_width_bits
            )));
        }

        let full_scale = 2_f64.powi(decoded.sample_width_bits as i32 - 1);
        let channels = decoded.channel_count;
        let amplitudes: Vec<f32> = decoded
            .raw_samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: f64 = frame.iter().map(|sample| f64::from(*sample)).sum();
                let mono = sum / channels as f64;
                (mono / full_scale).clamp(-1.0, 1.0) as f32
            })
            .collect();

        if amplitudes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let duration_seconds = amplitudes.len() as f64 / f64::from(decoded.sample_rate);
        Ok(Self {
            amplitudes,
            duration_seconds,
        })
    }

    /// Builds a store from amplitudes that are already mono and normalized.
    pub fn from_amplitudes(amplitudes: Vec<f32>, duration_seconds: f64) -> Self {
        if amplitudes.is_empty() || !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return Self::empty();
        }
        Self {
            amplitudes: amplitudes
                .into_iter()
                .map(|value| value.clamp(-1.0, 1.0))
                .collect(),
            duration_seconds,
        }
    }

    pub fn amplitudes(&self) -> &[f32] {
        &self.amplitudes
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Samples per second of the mono sequence, 0 when nothing is loaded.
    pub fn sample_rate(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        self.amplitudes.len() as f64 / self.duration_seconds
    }

    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }
}
