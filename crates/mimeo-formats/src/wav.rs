//! RIFF/WAVE codec.

use std::fs;
use std::io::Write;
use std::path::Path;

use mimeo_dsp::Frame;

use crate::FormatError;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;

/// Decoded audio: stereo frames at a sample rate. Mono sources are duplicated to both sides.
#[derive(Clone, Debug, PartialEq)]
pub struct WavAudio {
    pub frames: Vec<Frame>,
    pub sample_rate: u32,
}

impl WavAudio {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f32 / self.sample_rate as f32
    }
}

// --- Writing ---

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    let channels: u16 = 2;
    let bits: u16 = 16;
    let block_align = channels * (bits / 8);
    let data_size = frames.len() as u32 * block_align as u32;

    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&FORMAT_PCM.to_le_bytes())?;
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        let (l, r) = frame.to_i16();
        w.write_all(&l.to_le_bytes())?;
        w.write_all(&r.to_le_bytes())?;
    }
    Ok(())
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + frames.len() * 4);
    // Writing into a Vec cannot fail.
    let _ = write_wav(&mut buf, frames, sample_rate);
    buf
}

pub fn save_wav(path: impl AsRef<Path>, frames: &[Frame], sample_rate: u32) -> Result<(), FormatError> {
    fs::write(path, frames_to_wav(frames, sample_rate))?;
    Ok(())
}

// --- Reading ---

pub fn load_wav(path: impl AsRef<Path>) -> Result<WavAudio, FormatError> {
    let data = fs::read(path)?;
    decode_wav(&data)
}

struct Format {
    format: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
}

/// Decode a WAV file held in memory.
pub fn decode_wav(data: &[u8]) -> Result<WavAudio, FormatError> {
    if data.len() < 12 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<Format> = None;
    let mut samples: Option<&[u8]> = None;

    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = read_u32(data, pos + 4) as usize;
        let body = pos + 8;

        if id == b"fmt " {
            if size < 16 || body + 16 > data.len() {
                return Err(FormatError::UnexpectedEof);
            }
            let mut format = read_u16(data, body);
            // WAVE_FORMAT_EXTENSIBLE keeps the real tag at the start of the sub-format GUID.
            if format == 0xFFFE && size >= 40 && body + 26 <= data.len() {
                format = read_u16(data, body + 24);
            }
            fmt = Some(Format {
                format,
                channels: read_u16(data, body + 2),
                sample_rate: read_u32(data, body + 4),
                bits: read_u16(data, body + 14),
            });
        } else if id == b"data" {
            let end = body.saturating_add(size).min(data.len());
            samples = Some(&data[body..end]);
        }

        pos = body.saturating_add(size);
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let fmt = fmt.ok_or(FormatError::MissingChunk("fmt "))?;
    let raw = samples.ok_or(FormatError::MissingChunk("data"))?;
    let frames = decode_frames(raw, &fmt)?;
    Ok(WavAudio {
        frames,
        sample_rate: fmt.sample_rate,
    })
}

fn decode_frames(raw: &[u8], fmt: &Format) -> Result<Vec<Frame>, FormatError> {
    let unsupported = || FormatError::Unsupported {
        format: fmt.format,
        bits: fmt.bits,
        channels: fmt.channels,
    };
    let sample: fn(&[u8]) -> f32 = match (fmt.format, fmt.bits) {
        (FORMAT_PCM, 8) => |b| (b[0] as f32 - 128.0) / 128.0,
        (FORMAT_PCM, 16) => |b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0,
        (FORMAT_FLOAT, 32) => |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        _ => return Err(unsupported()),
    };
    if !(1..=2).contains(&fmt.channels) {
        return Err(unsupported());
    }

    let width = fmt.bits as usize / 8;
    let stride = width * fmt.channels as usize;
    let frames = raw
        .chunks_exact(stride)
        .map(|chunk| {
            let left = sample(&chunk[..width]);
            if fmt.channels == 2 {
                Frame::new(left, sample(&chunk[width..]))
            } else {
                Frame::mono(left)
            }
        })
        .collect();
    Ok(frames)
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Build a WAV with a custom fmt chunk around `payload`.
    fn wav_bytes(format: u16, channels: u16, bits: u16, rate: u32, payload: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(b"RIFF");
        v.extend_from_slice(&(36 + payload.len() as u32).to_le_bytes());
        v.extend_from_slice(b"WAVE");
        v.extend_from_slice(b"fmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&format.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        let align = channels * bits / 8;
        v.extend_from_slice(&(rate * align as u32).to_le_bytes());
        v.extend_from_slice(&align.to_le_bytes());
        v.extend_from_slice(&bits.to_le_bytes());
        v.extend_from_slice(b"data");
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn written_file_decodes() {
        let frames = [Frame::new(0.5, -0.5), Frame::new(0.0, 0.25)];
        let bytes = frames_to_wav(&frames, 44_100);
        assert_eq!(bytes.len(), 44 + 8);
        let audio = decode_wav(&bytes).unwrap();
        assert_eq!(audio.sample_rate, 44_100);
        assert_eq!(audio.frames.len(), 2);
        assert_abs_diff_eq!(audio.frames[0].left, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(audio.frames[1].right, 0.25, epsilon = 1e-3);
    }

    #[test]
    fn mono_8bit_is_duplicated() {
        let bytes = wav_bytes(FORMAT_PCM, 1, 8, 8000, &[128, 255, 0]);
        let audio = decode_wav(&bytes).unwrap();
        assert_eq!(audio.frames.len(), 3);
        assert_eq!(audio.frames[0], Frame::silence());
        assert_abs_diff_eq!(audio.frames[1].right, 127.0 / 128.0);
        assert_eq!(audio.frames[2], Frame::mono(-1.0));
    }

    #[test]
    fn float_stereo() {
        let mut payload = Vec::new();
        for x in [0.1f32, -0.2, 0.3, -0.4] {
            payload.extend_from_slice(&x.to_le_bytes());
        }
        let audio = decode_wav(&wav_bytes(FORMAT_FLOAT, 2, 32, 48_000, &payload)).unwrap();
        assert_eq!(audio.frames, vec![Frame::new(0.1, -0.2), Frame::new(0.3, -0.4)]);
    }

    #[test]
    fn skips_unknown_chunks() {
        let mut bytes = frames_to_wav(&[Frame::mono(0.5)], 48_000);
        // Splice an odd-sized LIST chunk (padded) before fmt.
        let extra = [b'L', b'I', b'S', b'T', 3, 0, 0, 0, 1, 2, 3, 0];
        bytes.splice(12..12, extra);
        let audio = decode_wav(&bytes).unwrap();
        assert_eq!(audio.frames.len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_wav(b"RIFF"), Err(FormatError::UnexpectedEof)));
        assert!(matches!(
            decode_wav(b"RIFX\0\0\0\0WAVEfmt "),
            Err(FormatError::InvalidHeader)
        ));
        let bytes = wav_bytes(FORMAT_PCM, 1, 24, 48_000, &[0; 6]);
        assert!(matches!(decode_wav(&bytes), Err(FormatError::Unsupported { bits: 24, .. })));
        let bytes = wav_bytes(FORMAT_PCM, 6, 16, 48_000, &[0; 12]);
        assert!(matches!(decode_wav(&bytes), Err(FormatError::Unsupported { .. })));
    }

    #[test]
    fn missing_data_chunk() {
        let mut bytes = wav_bytes(FORMAT_PCM, 1, 16, 48_000, &[]);
        bytes.truncate(36);
        assert!(matches!(decode_wav(&bytes), Err(FormatError::MissingChunk("data"))));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        save_wav(&path, &[Frame::mono(0.1); 10], 22_050).unwrap();
        let audio = load_wav(&path).unwrap();
        assert_eq!(audio.frames.len(), 10);
        assert_abs_diff_eq!(audio.duration_seconds(), 10.0 / 22_050.0);
    }
}
