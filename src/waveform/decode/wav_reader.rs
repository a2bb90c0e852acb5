use super::DecodedAudio;
use crate::waveform::{CancellationFlag, DecodeError};
use hound::SampleFormat;

/// Samples read between cancellation checks.
const CANCEL_CHECK_SAMPLES: usize = 65_536;

type Reader<'a> = hound::WavReader<std::io::Cursor<&'a [u8]>>;

/// Decode WAV bytes; `Ok(None)` when the bytes are not a WAV file.
pub(super) fn decode_wav(
    bytes: &[u8],
    cancel: &CancellationFlag,
) -> Result<Option<DecodedAudio>, DecodeError> {
    let mut reader = match hound::WavReader::new(std::io::Cursor::new(bytes)) {
        Ok(reader) => reader,
        Err(_) => return Ok(None),
    };
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => read_float_samples(&mut reader, cancel)?,
        SampleFormat::Int => read_int_samples(&mut reader, spec.bits_per_sample, cancel)?,
    };
    Ok(Some(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels.max(1),
    }))
}

fn read_float_samples(
    reader: &mut Reader<'_>,
    cancel: &CancellationFlag,
) -> Result<Vec<f32>, DecodeError> {
    let mut samples = Vec::with_capacity(reader.len() as usize);
    for (idx, sample) in reader.samples::<f32>().enumerate() {
        if idx % CANCEL_CHECK_SAMPLES == 0 && cancel.is_cancelled() {
            return Err(DecodeError::Aborted);
        }
        samples.push(sample.map_err(|source| DecodeError::Sample { source })?);
    }
    Ok(samples)
}

fn read_int_samples(
    reader: &mut Reader<'_>,
    bits_per_sample: u16,
    cancel: &CancellationFlag,
) -> Result<Vec<f32>, DecodeError> {
    let scale = (1i64 << bits_per_sample.saturating_sub(1)).max(1) as f32;
    let mut samples = Vec::with_capacity(reader.len() as usize);
    for (idx, sample) in reader.samples::<i32>().enumerate() {
        if idx % CANCEL_CHECK_SAMPLES == 0 && cancel.is_cancelled() {
            return Err(DecodeError::Aborted);
        }
        let value = sample.map_err(|source| DecodeError::Sample { source })?;
        samples.push(value as f32 / scale);
    }
    Ok(samples)
}
