//! Time and frequency axes of the extracted spectrogram.
use crate::downsample::average_channels;
use crate::error::Result;
use crate::store::TableStore;

/// Start time of a row: its centre offset minus half its duration
pub fn row_start_time(offs_sub: f64, tsubint: f64) -> f64 {
    offs_sub - tsubint / 2.0
}

/// Read `OFFS_SUB` and `TSUBINT` of a row and return its start time
pub fn read_row_start<S: TableStore + ?Sized>(store: &S, row: usize) -> Result<f64> {
    let offs_sub = store.cell("OFFS_SUB", row)?.scalar_f64()?;
    let tsubint = store.cell("TSUBINT", row)?.scalar_f64()?;
    Ok(row_start_time(offs_sub, tsubint))
}

/// Centre times of a row's output samples.
///
/// `out[i] = row_start + (i + 0.5) * step`, where `step` is the sample time
/// multiplied by the time downsampling factor.
pub fn fill_times(row_start: f64, step: f64, out: &mut [f64]) {
    for (i, t) in out.iter_mut().enumerate() {
        *t = row_start + (i as f64 + 0.5) * step;
    }
}

/// Channel frequencies after averaging groups of `factor` channels
pub fn frequency_axis(freqs: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 {
        freqs.to_vec()
    } else {
        average_channels(freqs, factor).collect()
    }
}
