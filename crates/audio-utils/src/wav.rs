use std::path::Path;

use crate::{AudioMetadata, Error, Samples};

/// Write mono 16-bit PCM to `path`, creating parent directories.
pub fn write_wav_mono_i16(
    path: impl AsRef<Path>,
    sample_rate: u32,
    samples: &[i16],
) -> crate::Result<()> {
    let path = path.as_ref();
    if sample_rate == 0 {
        return Err(Error::InvalidSampleRate(sample_rate));
    }
    if samples.is_empty() {
        return Err(Error::EmptyBuffer);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    tracing::debug!(path = %path.display(), sample_rate, samples = samples.len(), "wav_written");
    Ok(())
}

/// Read a mono WAV file without converting its sample format.
pub fn read_wav_mono(path: impl AsRef<Path>) -> crate::Result<(AudioMetadata, Samples)> {
    let mut reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(Error::UnsupportedChannelCount {
            count: spec.channels,
        });
    }
    if spec.sample_rate == 0 {
        return Err(Error::InvalidSampleRate(spec.sample_rate));
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => {
            Samples::F32(reader.samples::<f32>().collect::<Result<_, _>>()?)
        }
        (hound::SampleFormat::Int, 8) => Samples::U8(
            reader
                .samples::<i8>()
                .map(|s| s.map(|v| (v as i16 + 128) as u8))
                .collect::<Result<_, _>>()?,
        ),
        (hound::SampleFormat::Int, 16) => {
            Samples::I16(reader.samples::<i16>().collect::<Result<_, _>>()?)
        }
        (hound::SampleFormat::Int, _) => {
            Samples::I32(reader.samples::<i32>().collect::<Result<_, _>>()?)
        }
    };

    Ok((
        AudioMetadata {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
        samples,
    ))
}
