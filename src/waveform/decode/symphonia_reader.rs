use std::io::Cursor;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

use super::DecodedAudio;
use crate::waveform::{CancellationFlag, DecodeError};

/// Packets decoded between cancellation checks.
const CANCEL_CHECK_PACKETS: usize = 64;

pub(super) fn decode_with_symphonia(
    bytes: Vec<u8>,
    extension: Option<&str>,
    cancel: &CancellationFlag,
) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| DecodeError::Unsupported {
            message: format!("probe failed: {err}"),
        })?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::Unsupported {
            message: "no default track".to_string(),
        })?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|err| DecodeError::Unsupported {
            message: format!("no decoder: {err}"),
        })?;

    let mut samples = Vec::new();
    let mut packets = 0usize;
    loop {
        if packets % CANCEL_CHECK_PACKETS == 0 && cancel.is_cancelled() {
            return Err(DecodeError::Aborted);
        }
        packets += 1;
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(Error::ResetRequired) => break,
            Err(err) => {
                return Err(DecodeError::Invalid {
                    message: format!("packet read failed: {err}"),
                });
            }
        };
        if packet.track_id() != track_id {
            continue;
        }
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(err)) => {
                tracing::debug!("Skipping undecodable packet: {err}");
                continue;
            }
            Err(err) => {
                return Err(DecodeError::Invalid {
                    message: format!("decode failed: {err}"),
                });
            }
        };
        let spec = *audio_buf.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}
