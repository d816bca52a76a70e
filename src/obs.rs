//! Observation parameters read from the table headers.
use crate::error::Result;
use crate::store::TableStore;

/// `OBS_MODE` value of search-mode data
pub const SEARCH_MODE: &str = "SEARCH";

/// Immutable description of a search-mode observation
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationParams {
    /// `OBS_MODE` from the primary header
    pub obs_mode: String,
    /// `NSBLK`: samples per row
    pub nsblk: usize,
    /// `NPOL`
    pub npol: usize,
    /// `NCHAN`
    pub nchan: usize,
    /// `NBITS`, as declared (validated when data is requested)
    pub nbits: u32,
    /// `TBIN`: sample time in seconds
    pub tbin: f64,
    /// `POL_TYPE`, e.g. `AABBCRCI` or `AA+BB`
    pub pol_type: String,
    /// `NAXIS2`: rows in the table
    pub nrows: usize,
}

impl ObservationParams {
    pub fn from_store<S: TableStore + ?Sized>(store: &S) -> Result<Self> {
        let table = store.table_header();
        let nbits = table.count("NBITS")?;
        Ok(Self {
            obs_mode: store.primary_header().string("OBS_MODE")?.trim().to_string(),
            nsblk: table.count("NSBLK")?,
            npol: table.count("NPOL")?,
            nchan: table.count("NCHAN")?,
            nbits: u32::try_from(nbits).unwrap_or(u32::MAX),
            tbin: table.float("TBIN")?,
            pol_type: table.string("POL_TYPE")?.trim().to_string(),
            nrows: table.count("NAXIS2")?,
        })
    }

    pub fn is_search_mode(&self) -> bool {
        self.obs_mode == SEARCH_MODE
    }

    /// Number of leading polarizations stored as unsigned values.
    ///
    /// With the `AABB` convention the first two products are auto-powers;
    /// otherwise only the first one is.
    pub fn unsigned_pols(&self) -> usize {
        if self.pol_type.contains("AABB") { 2 } else { 1 }
    }

    /// Duration of the observation covered by the table, in seconds
    pub fn duration(&self) -> f64 {
        self.nrows as f64 * self.nsblk as f64 * self.tbin
    }
}
