use crate::error::DecodeError;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Interleaved integer PCM as produced by a decoder. Values use the full
/// range of `sample_width_bits`.
/// Cap on the up-front reservation so a bogus frame count in a header cannot
/// allocate gigabytes. Longer streams keep growing as packets arrive.
const MAX_RESERVED_SAMPLES: u64 = 1 << 26;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channel_count: usize,
    pub sample_width_bits: u32,
    pub sample_rate: u32,
    pub raw_samples: Vec<i32>,
}

pub trait SampleDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
        let file = File::open(path).map_err(|err| DecodeError::Open {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(OsStr::to_str) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::NoAudio(path.to_path_buf()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let mut decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|err| DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        // Symphonia scales every integer format up to i32, so shift back down to
        // the stream's native width when it is known.
        let sample_width_bits = params.bits_per_sample.unwrap_or(32).clamp(8, 32);
        let shift = 32 - sample_width_bits;

        let mut channel_count = params.channels.map(|channels| channels.count()).unwrap_or(0);
        let mut sample_rate = params.sample_rate.unwrap_or(0);
        let mut raw_samples =
            Vec::with_capacity(reserved_samples(params.n_frames, channel_count));
        let mut sample_buf: Option<SampleBuffer<i32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    return Err(DecodeError::Unsupported {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channel_count = spec.channels.count();
                    sample_rate = spec.rate;

                    let needs_buffer = sample_buf
                        .as_ref()
                        .is_none_or(|buf| buf.capacity() < decoded.capacity() * channel_count);
                    if needs_buffer {
                        sample_buf = Some(SampleBuffer::<i32>::new(decoded.capacity() as u64, spec));
                    }

                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        raw_samples.extend(buf.samples().iter().map(|sample| sample >> shift));
                    }
                }
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(err) => {
                    return Err(DecodeError::Unsupported {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if raw_samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        raw_samples.shrink_to_fit();

        Ok(DecodedAudio {
            channel_count,
            sample_width_bits,
            sample_rate,
            raw_samples,
        })
    }
}

/// Interleaved sample count to reserve before decoding, from the container's
/// frame count when it declares one.
fn reserved_samples(frames: Option<u64>, channel_count: usize) -> usize {
    frames
        .map(|frames| {
            frames
                .saturating_mul(channel_count.max(1) as u64)
                .min(MAX_RESERVED_SAMPLES)
        })
        .and_then(|samples| usize::try_from(samples).ok())
        .unwrap_or(0)
}
