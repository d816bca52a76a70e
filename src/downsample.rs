//! Time and frequency downsampling by grouped means
//!
//! Both axes are reduced by averaging contiguous, non-overlapping runs of
//! `factor` elements. Means are accumulated in `f64` from values that were
//! already cast to their per-polarization numeric type by the decoder.
use crate::decode::DecodedBlock;
use crate::error::{Error, Result};

/// Resolved downsampling factors for one request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Factors {
    /// Samples averaged per output time step
    pub time: usize,
    /// Channels averaged per output channel
    pub freq: usize,
}

impl Factors {
    /// Resolve requested factors against the block layout.
    ///
    /// A time factor of 0 integrates each row completely (factor = `nsblk`);
    /// a frequency factor of 0 means no frequency averaging. A factor that
    /// does not evenly divide its dimension is a config error. Factors larger
    /// than `nsblk` or `nchan` are rejected the same way rather than clamped
    /// to the dimension, so a request never silently changes resolution.
    pub fn resolve(time: usize, freq: usize, nsblk: usize, nchan: usize) -> Result<Self> {
        let time = if time == 0 { nsblk.max(1) } else { time };
        let freq = freq.max(1);
        if nsblk % time != 0 {
            return Err(Error::config(format!(
                "time downsample {time} does not evenly divide NSBLK ({nsblk})"
            )));
        }
        if nchan % freq != 0 {
            return Err(Error::config(format!(
                "frequency downsample {freq} does not evenly divide NCHAN ({nchan})"
            )));
        }
        Ok(Self { time, freq })
    }

    /// Output samples per row
    pub fn samples_per_row(&self, nsblk: usize) -> usize {
        nsblk / self.time
    }

    /// Output channels
    pub fn channels(&self, nchan: usize) -> usize {
        nchan / self.freq
    }
}

/// Mean over `factor` consecutive samples of one polarization.
///
/// Averages samples `[step * factor, (step + 1) * factor)` of `block` into
/// `out`, which must hold one value per channel.
pub fn average_time(block: &DecodedBlock, pol: usize, step: usize, factor: usize, out: &mut [f64]) {
    out.fill(0.0);
    let first = step * factor;
    for sample in first..first + factor {
        for (acc, &v) in out.iter_mut().zip(block.spectrum(sample, pol)) {
            *acc += v as f64;
        }
    }
    let norm = factor as f64;
    out.iter_mut().for_each(|v| *v /= norm);
}

/// Mean over groups of `factor` adjacent values
pub fn average_channels<T>(values: &[T], factor: usize) -> impl Iterator<Item = f64> + '_
where
    T: Copy + Into<f64>,
{
    let norm = factor as f64;
    values
        .chunks_exact(factor)
        .map(move |group| group.iter().map(|&v| v.into()).sum::<f64>() / norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{ByteOrder, DecodePlan};
    use crate::obs::ObservationParams;
    use approx::assert_relative_eq;

    fn block(nsblk: usize, npol: usize, nchan: usize, raw: &[u8]) -> DecodedBlock {
        let params = ObservationParams {
            obs_mode: "SEARCH".to_string(),
            nsblk,
            npol,
            nchan,
            nbits: 8,
            tbin: 1.0,
            pol_type: "AABB".to_string(),
            nrows: 1,
        };
        DecodePlan::new(&params, ByteOrder::Big).unwrap().decode(raw).unwrap()
    }

    #[test]
    fn test_resolve_factors() {
        let f = Factors::resolve(2, 1, 4, 2).unwrap();
        assert_eq!(f, Factors { time: 2, freq: 1 });
        assert_eq!(f.samples_per_row(4), 2);
        assert_eq!(f.channels(2), 2);
    }

    #[test]
    fn test_resolve_zero_factors() {
        let f = Factors::resolve(0, 0, 64, 32).unwrap();
        assert_eq!(f.time, 64);
        assert_eq!(f.freq, 1);
        assert_eq!(f.samples_per_row(64), 1);
    }

    #[test]
    fn test_resolve_rejects_non_divisors() {
        assert!(matches!(Factors::resolve(3, 1, 4, 2), Err(Error::Config(_))));
        assert!(matches!(Factors::resolve(1, 3, 4, 8), Err(Error::Config(_))));
        // larger than the dimension is not silently clamped
        assert!(matches!(Factors::resolve(8, 1, 4, 2), Err(Error::Config(_))));
        assert!(matches!(Factors::resolve(1, 4, 4, 2), Err(Error::Config(_))));
    }

    #[test]
    fn test_average_time_pairs() {
        // samples per (pol, chan) run 1, 2, 3, 4 over the block
        let raw: Vec<u8> = (1..=4u8).flat_map(|s| [s; 4]).collect();
        let b = block(4, 2, 2, &raw);
        let mut out = [0.0; 2];
        average_time(&b, 0, 0, 2, &mut out);
        assert_eq!(out, [1.5, 1.5]);
        average_time(&b, 1, 1, 2, &mut out);
        assert_eq!(out, [3.5, 3.5]);
    }

    #[test]
    fn test_average_time_factor_one_is_identity() {
        let raw: Vec<u8> = (0..8u8).collect();
        let b = block(2, 2, 2, &raw);
        let mut out = [0.0; 2];
        for s in 0..2 {
            for p in 0..2 {
                average_time(&b, p, s, 1, &mut out);
                let expected: Vec<f64> = b.spectrum(s, p).iter().map(|&v| v as f64).collect();
                assert_eq!(out.to_vec(), expected);
            }
        }
    }

    #[test]
    fn test_average_channels() {
        let spectrum = [1.0f64, 3.0, 10.0, 20.0, 5.0, 5.0];
        let out: Vec<f64> = average_channels(&spectrum, 2).collect();
        assert_eq!(out, vec![2.0, 15.0, 5.0]);

        let freqs = [1400.0f64, 1400.5, 1401.0, 1401.5];
        let out: Vec<f64> = average_channels(&freqs, 4).collect();
        assert_relative_eq!(out[0], 1400.75);

        let single: Vec<f64> = average_channels(&[2.5f32, 4.0], 1).collect();
        assert_eq!(single, vec![2.5, 4.0]);
    }
}
