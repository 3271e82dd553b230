use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::NormalizeError;

const CHUNK_SIZE: usize = 1024;

pub(crate) fn resample(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, NormalizeError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| NormalizeError::Resample(format!("init: {e}")))?;

    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + CHUNK_SIZE);

    let mut process = |input: Vec<f32>, output: &mut Vec<f32>| -> Result<(), NormalizeError> {
        let result = resampler
            .process(&[input], None)
            .map_err(|e| NormalizeError::Resample(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
        Ok(())
    };

    for chunk in samples.chunks(CHUNK_SIZE) {
        let mut input = chunk.to_vec();
        input.resize(CHUNK_SIZE, 0.0);
        process(input, &mut output)?;
    }
    // flush the filter delay with silence
    while output.len() < expected_len + delay {
        process(vec![0.0; CHUNK_SIZE], &mut output)?;
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_len);
    clamp_samples(&mut output);
    Ok(output)
}

fn clamp_samples(samples: &mut [f32]) {
    for sample in samples {
        *sample = sample.clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_follows_rate_ratio() {
        let input = vec![0.25_f32; 44_100];
        let output = resample(&input, 44_100, 16_000).unwrap();
        assert_eq!(output.len(), 16_000);
    }

    #[test]
    fn same_rate_is_untouched() {
        let input = vec![0.5_f32, -0.5, 0.25];
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn output_stays_in_range() {
        let input: Vec<f32> = (0..48_000)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let output = resample(&input, 48_000, 16_000).unwrap();
        assert!(output.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}
