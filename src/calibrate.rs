//! Per-row scale/offset/weight calibration
use crate::error::{Error, Result};
use crate::store::TableStore;

/// Calibration vectors of one row, laid out `[pol, channel]`.
///
/// Weights are commonly stored once per channel and shared by every
/// polarization; a full `[pol, channel]` weight table is accepted too.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    scales: Vec<f64>,
    offsets: Vec<f64>,
    weights: Vec<f64>,
    weights_per_pol: bool,
    npol: usize,
    nchan: usize,
}

impl Calibration {
    pub fn new(
        scales: Vec<f64>,
        offsets: Vec<f64>,
        weights: Vec<f64>,
        npol: usize,
        nchan: usize,
    ) -> Result<Self> {
        let full = npol * nchan;
        if scales.len() != full || offsets.len() != full {
            return Err(Error::format(format!(
                "DAT_SCL/DAT_OFFS hold {}/{} values, expected NPOL*NCHAN = {full}",
                scales.len(),
                offsets.len()
            )));
        }
        let weights_per_pol = if weights.len() == full {
            true
        } else if weights.len() == nchan {
            false
        } else {
            return Err(Error::format(format!(
                "DAT_WTS holds {} values, expected NCHAN ({nchan}) or NPOL*NCHAN ({full})",
                weights.len()
            )));
        };
        Ok(Self {
            scales,
            offsets,
            weights,
            weights_per_pol,
            npol,
            nchan,
        })
    }

    /// Read `DAT_SCL`, `DAT_OFFS` and `DAT_WTS` of one row
    pub fn read<S: TableStore + ?Sized>(
        store: &S,
        row: usize,
        npol: usize,
        nchan: usize,
    ) -> Result<Self> {
        let scales = store.cell("DAT_SCL", row)?.to_f64s();
        let offsets = store.cell("DAT_OFFS", row)?.to_f64s();
        let weights = store.cell("DAT_WTS", row)?.to_f64s();
        Self::new(scales, offsets, weights, npol, nchan)
    }

    pub fn npol(&self) -> usize {
        self.npol
    }

    pub fn scales(&self, pol: usize) -> &[f64] {
        &self.scales[pol * self.nchan..(pol + 1) * self.nchan]
    }

    pub fn offsets(&self, pol: usize) -> &[f64] {
        &self.offsets[pol * self.nchan..(pol + 1) * self.nchan]
    }

    pub fn weights(&self, pol: usize) -> &[f64] {
        if self.weights_per_pol {
            &self.weights[pol * self.nchan..(pol + 1) * self.nchan]
        } else {
            &self.weights
        }
    }

    /// `value = (value * scale + offset) * weight`, channel by channel
    pub fn apply(&self, pol: usize, spectrum: &mut [f64]) {
        let coeffs = self
            .scales(pol)
            .iter()
            .zip(self.offsets(pol))
            .zip(self.weights(pol));
        for (v, ((&scale, &offset), &weight)) in spectrum.iter_mut().zip(coeffs) {
            *v = (*v * scale + offset) * weight;
        }
    }
}
