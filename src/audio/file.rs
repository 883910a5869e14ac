use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::info;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format: {:?} {} bits (expected 16-bit PCM)",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Number of interleaved samples covering `millis` of audio
    pub fn samples_per_millis(&self, millis: u64) -> usize {
        (self.sample_rate as u64 * millis / 1000) as usize * self.channels as usize
    }
}

/// Write interleaved 16-bit PCM to a WAV file
pub fn write_wav(path: impl AsRef<Path>, sample_rate: u32, channels: u16, samples: &[i16]) -> Result<()> {
    let path = path.as_ref();
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample).context("Failed to write WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;

    Ok(())
}

/// RMS level of a block in dBFS, floored at -160 dB for silence
pub fn level_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return -160.0;
    }

    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / i16::MAX as f64;
            v * v
        })
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();

    if rms <= 0.0 {
        -160.0
    } else {
        (20.0 * rms.log10()).max(-160.0) as f32
    }
}
