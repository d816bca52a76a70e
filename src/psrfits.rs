//! Search-mode PSRFITS reading
//!
//! [`PsrFits`] owns a table store and turns its rows into a dense
//! `[time, pol, channel]` spectrogram. Each row is decoded, averaged in
//! time, calibrated and averaged in frequency, in that order, and written
//! to its own disjoint slice of the output, so rows are processed in
//! parallel.
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::{Array3, ArrayD, Axis};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::axes::{fill_times, frequency_axis, read_row_start};
use crate::calibrate::Calibration;
use crate::decode::{ByteOrder, DecodePlan};
use crate::downsample::{Factors, average_channels, average_time};
use crate::error::{Error, Result};
use crate::expanduser;
use crate::fits::FitsFile;
use crate::obs::{ObservationParams, SEARCH_MODE};
use crate::store::{Header, TableStore};

/// Cooperative cancellation flag, checked before each row
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Parameters of a [`PsrFits::get_data`] call
#[derive(Debug, Clone)]
pub struct DataRequest {
    /// First row to read (0-based)
    pub start_row: usize,
    /// Last row to read, inclusive. `None` reads only `start_row`; negative
    /// values count back from the end, so `-1` is the last row.
    pub end_row: Option<i64>,
    /// Samples averaged per output step; 0 integrates whole rows
    pub time_downsample: usize,
    /// Channels averaged per output channel; 0 is the same as 1
    pub freq_downsample: usize,
    /// Apply `DAT_SCL`, `DAT_OFFS` and `DAT_WTS`
    pub apply_scales: bool,
    /// Also build the time and frequency axes
    pub get_axes: bool,
    /// Drop length-1 axes from the output
    pub squeeze: bool,
    pub cancel: Option<CancelToken>,
}

impl Default for DataRequest {
    fn default() -> Self {
        Self {
            start_row: 0,
            end_row: None,
            time_downsample: 1,
            freq_downsample: 1,
            apply_scales: true,
            get_axes: false,
            squeeze: false,
            cancel: None,
        }
    }
}

impl DataRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every row of the file
    pub fn all_rows() -> Self {
        Self::default().end_row(-1)
    }

    pub fn start_row(mut self, row: usize) -> Self {
        self.start_row = row;
        self
    }

    pub fn end_row(mut self, row: i64) -> Self {
        self.end_row = Some(row);
        self
    }

    pub fn time_downsample(mut self, factor: usize) -> Self {
        self.time_downsample = factor;
        self
    }

    pub fn freq_downsample(mut self, factor: usize) -> Self {
        self.freq_downsample = factor;
        self
    }

    pub fn apply_scales(mut self, apply: bool) -> Self {
        self.apply_scales = apply;
        self
    }

    pub fn get_axes(mut self, get: bool) -> Self {
        self.get_axes = get;
        self
    }

    pub fn squeeze(mut self, squeeze: bool) -> Self {
        self.squeeze = squeeze;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolve the requested rows against a table of `nrows` rows.
    ///
    /// The range may be empty, e.g. every row of an empty table.
    pub fn row_range(&self, nrows: usize) -> Result<Range<usize>> {
        let start = self.start_row as i64;
        let end = match self.end_row {
            None => start,
            Some(end) if end < 0 => nrows as i64 + end,
            Some(end) => end,
        };
        // `end == start - 1` is an empty range, not an error
        if start > nrows as i64 || end < start - 1 || end >= nrows as i64 {
            return Err(Error::config(format!(
                "rows {}..={end} are not within the table ({nrows} rows)",
                self.start_row
            )));
        }
        Ok(self.start_row..(end + 1) as usize)
    }
}

/// Result of [`PsrFits::get_data`]
#[derive(Debug, Clone)]
pub struct SearchData {
    /// Spectral power shaped `[time, pol, channel]`, or fewer axes if squeezed
    pub data: ArrayD<f32>,
    /// Centre time of every output sample, in seconds
    pub times: Option<Vec<f64>>,
    /// Centre frequency of every output channel
    pub freqs: Option<Vec<f64>>,
}

impl SearchData {
    pub fn into_parts(self) -> (ArrayD<f32>, Option<Vec<f64>>, Option<Vec<f64>>) {
        (self.data, self.times, self.freqs)
    }
}

struct RowContext {
    plan: DecodePlan,
    factors: Factors,
    npol: usize,
    nchan: usize,
    nchan_out: usize,
    apply_scales: bool,
    get_axes: bool,
    cancel: Option<CancelToken>,
}

struct RowAxes {
    start: f64,
    freqs: Vec<f64>,
}

/// A search-mode PSRFITS source
#[derive(Debug)]
pub struct PsrFits<S = FitsFile> {
    store: S,
    byte_order: ByteOrder,
}

impl PsrFits<FitsFile> {
    /// Open a PSRFITS file (`~` is expanded)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expanduser(path.as_ref().to_path_buf());
        Ok(Self::from_store(FitsFile::open(path)?))
    }
}

impl<S: TableStore> PsrFits<S> {
    pub fn from_store(store: S) -> Self {
        Self {
            store,
            byte_order: ByteOrder::default(),
        }
    }

    /// Byte order of 16- and 32-bit samples in `DATA` (big-endian by default)
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn primary_header(&self) -> &Header {
        self.store.primary_header()
    }

    pub fn subint_header(&self) -> &Header {
        self.store.table_header()
    }

    pub fn observation(&self) -> Result<ObservationParams> {
        ObservationParams::from_store(&self.store)
    }

    /// Channel frequencies of one row
    pub fn get_freqs(&self, row: usize) -> Result<Vec<f64>> {
        let nrows = self.store.nrows();
        if row >= nrows {
            return Err(Error::config(format!(
                "row {row} is out of range (table has {nrows} rows)"
            )));
        }
        Ok(self.store.cell("DAT_FREQ", row)?.to_f64s())
    }

    /// Read, calibrate and downsample a range of rows.
    ///
    /// All request validation happens before the first row is read; any
    /// failure aborts the whole call.
    pub fn get_data(&self, req: &DataRequest) -> Result<SearchData> {
        let obs_mode = self
            .store
            .primary_header()
            .get("OBS_MODE")
            .and_then(|v| v.as_str())
            .map(str::trim);
        if obs_mode != Some(SEARCH_MODE) {
            return Err(Error::mode(format!(
                "get_data() only works on SEARCH-mode PSRFITS (OBS_MODE = {})",
                obs_mode.unwrap_or("<missing>")
            )));
        }

        let params = self.observation()?;
        if params.nsblk == 0 || params.npol == 0 || params.nchan == 0 {
            return Err(Error::format(format!(
                "empty block layout (NSBLK={}, NPOL={}, NCHAN={})",
                params.nsblk, params.npol, params.nchan
            )));
        }
        let factors = Factors::resolve(
            req.time_downsample,
            req.freq_downsample,
            params.nsblk,
            params.nchan,
        )?;
        let plan = DecodePlan::new(&params, self.byte_order)?;
        let rows = req.row_range(params.nrows)?;

        let nsamp_out = factors.samples_per_row(params.nsblk);
        let nchan_out = factors.channels(params.nchan);
        let row_len = checked_len(&[nsamp_out, params.npol, nchan_out])?;
        let total = checked_len(&[rows.len(), row_len])?;
        let shape = (rows.len() * nsamp_out, params.npol, nchan_out);
        debug!(
            rows = ?rows,
            time_factor = factors.time,
            freq_factor = factors.freq,
            nbits = params.nbits,
            shape = ?shape,
            "reading search-mode data"
        );

        let ctx = RowContext {
            plan,
            factors,
            npol: params.npol,
            nchan: params.nchan,
            nchan_out,
            apply_scales: req.apply_scales,
            get_axes: req.get_axes,
            cancel: req.cancel.clone(),
        };
        let mut data = vec![0f32; total];
        let row_axes = data
            .par_chunks_mut(row_len)
            .enumerate()
            .map(|(i, out)| self.process_row(&ctx, rows.start + i, out))
            .collect::<Result<Vec<_>>>()?;

        let (times, freqs) = if req.get_axes {
            let row_axes: Vec<RowAxes> = row_axes.into_iter().flatten().collect();
            let (times, freqs) = build_axes(&row_axes, nsamp_out, params.tbin, factors);
            (Some(times), Some(freqs))
        } else {
            (None, None)
        };

        let mut array = Array3::from_shape_vec(shape, data)
            .map_err(|e| Error::format(e.to_string()))?
            .into_dyn();
        if req.squeeze {
            array = squeeze(array);
        }
        Ok(SearchData {
            data: array,
            times,
            freqs,
        })
    }

    fn process_row(&self, ctx: &RowContext, row: usize, out: &mut [f32]) -> Result<Option<RowAxes>> {
        if ctx.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        trace!(row, "processing row");

        let raw = self.store.cell("DATA", row)?;
        let block = ctx.plan.decode(&raw.to_be_bytes())?;
        let calibration = if ctx.apply_scales {
            Some(Calibration::read(&self.store, row, ctx.npol, ctx.nchan)?)
        } else {
            None
        };

        let mut spectrum = vec![0f64; ctx.nchan];
        for (step, out_step) in out.chunks_exact_mut(ctx.npol * ctx.nchan_out).enumerate() {
            for (pol, out_pol) in out_step.chunks_exact_mut(ctx.nchan_out).enumerate() {
                average_time(&block, pol, step, ctx.factors.time, &mut spectrum);
                if let Some(cal) = &calibration {
                    cal.apply(pol, &mut spectrum);
                }
                for (o, v) in out_pol
                    .iter_mut()
                    .zip(average_channels(&spectrum, ctx.factors.freq))
                {
                    *o = v as f32;
                }
            }
        }

        if !ctx.get_axes {
            return Ok(None);
        }
        let freqs = self.store.cell("DAT_FREQ", row)?.to_f64s();
        if freqs.len() != ctx.nchan {
            return Err(Error::format(format!(
                "DAT_FREQ of row {row} holds {} values, expected NCHAN ({})",
                freqs.len(),
                ctx.nchan
            )));
        }
        Ok(Some(RowAxes {
            start: read_row_start(&self.store, row)?,
            freqs,
        }))
    }
}

/// Time axis over all rows; frequency axis from the last row, empty when no
/// rows were read
fn build_axes(
    rows: &[RowAxes],
    nsamp_out: usize,
    tbin: f64,
    factors: Factors,
) -> (Vec<f64>, Vec<f64>) {
    let step = tbin * factors.time as f64;
    let mut times = vec![0f64; rows.len() * nsamp_out];
    for (chunk, row) in times.chunks_exact_mut(nsamp_out).zip(rows) {
        fill_times(row.start, step, chunk);
    }

    let Some(last) = rows.last() else {
        return (times, Vec::new());
    };
    if rows.iter().any(|r| r.freqs != last.freqs) {
        warn!("DAT_FREQ varies between rows; using the last row's frequencies");
    }
    (times, frequency_axis(&last.freqs, factors.freq))
}

/// Product of array dimensions read from headers, or a format error
fn checked_len(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::format(format!("data layout {dims:?} is too large")))
}

/// Remove every axis of length 1
fn squeeze(mut array: ArrayD<f32>) -> ArrayD<f32> {
    for axis in (0..array.ndim()).rev() {
        if array.len_of(Axis(axis)) == 1 {
            array = array.index_axis_move(Axis(axis), 0);
        }
    }
    array
}
