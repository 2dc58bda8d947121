//! Session recording output

use std::path::Path;

use crate::{Error, Result};

/// Write 16-bit mono samples to a WAV file
///
/// # Errors
///
/// Returns error if the file cannot be created or written
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| Error::Audio(e.to_string()))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }

    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(())
}
