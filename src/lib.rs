#![doc = include_str!("../readme.md")]

use std::path::PathBuf;

pub mod axes;
pub mod calibrate;
pub mod decode;
pub mod downsample;
pub mod error;
pub mod fits;
pub mod obs;
pub mod psrfits;
pub mod store;

pub use decode::{BitWidth, ByteOrder, SampleKind};
pub use error::{Error, Result};
pub use fits::FitsFile;
pub use obs::ObservationParams;
pub use psrfits::{CancelToken, DataRequest, PsrFits, SearchData};
pub use store::{Cell, ColumnKind, Header, HeaderValue, MemoryStore, TableStore};

pub(crate) fn expanduser(path: PathBuf) -> PathBuf {
    // Check if the path starts with "~"
    if let Some(stripped) = path.to_str().and_then(|p| p.strip_prefix("~"))
        && let Some(home_dir) = dirs::home_dir()
    {
        return home_dir.join(stripped.trim_start_matches('/'));
    }
    path
}
