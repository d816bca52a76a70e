//! FITS access through cfitsio
//!
//! Only what search-mode PSRFITS needs: the primary header and one binary
//! table extension located by `EXTNAME`. Headers are read once on open;
//! cells are read on demand through a single, mutex-guarded file handle.
use std::ffi::CStr;
use std::fmt;
use std::io;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fitsio::errors::check_status;
use fitsio::hdu::FitsHdu;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{Cell, Header, HeaderValue, TableStore};

/// Extension holding the search-mode sub-integrations
pub const SUBINT_EXTNAME: &str = "SUBINT";

// cfitsio buffer sizes, including the trailing NUL
const FLEN_KEYWORD: usize = 75;
const FLEN_VALUE: usize = 71;
const FLEN_COMMENT: usize = 73;

// cfitsio column type codes, as reported by `ffgtcl`
const TBYTE: i32 = 11;
const TSHORT: i32 = 21;
const TINT: i32 = 31;
const TLONG: i32 = 41;
const TFLOAT: i32 = 42;
const TLONGLONG: i32 = 81;
const TDOUBLE: i32 = 82;

#[derive(Debug, Clone)]
struct Column {
    name: String,
    /// 1-based column number
    number: i32,
    typecode: i32,
    repeat: usize,
}

/// `fitsio::FitsFile` wrapper that can live inside a `Mutex` shared across threads
struct SendFitsFile(fitsio::FitsFile);

// Safety: the handle is only ever reached through `FitsFile::fptr`'s Mutex,
// so cfitsio never sees concurrent calls on it (same argument as
// `fitsio::threadsafe_fitsfile::ThreadsafeFitsFile`).
unsafe impl Send for SendFitsFile {}

/// An open FITS file exposing one binary table
pub struct FitsFile {
    path: PathBuf,
    fptr: Mutex<SendFitsFile>,
    primary: Header,
    table: Header,
    columns: Vec<Column>,
    nrows: usize,
    extensions: Vec<String>,
}

impl fmt::Debug for FitsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitsFile")
            .field("path", &self.path)
            .field("extensions", &self.extensions)
            .field("nrows", &self.nrows)
            .field("columns", &self.columns.len())
            .finish_non_exhaustive()
    }
}

impl FitsFile {
    /// Open `path` and select the `SUBINT` table
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_table(path, SUBINT_EXTNAME)
    }

    /// Open `path` and select the binary table named `extname`
    pub fn open_table<P: AsRef<Path>>(path: P, extname: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // plain I/O errors (missing file, permissions) keep their own kind
        if std::fs::metadata(&path)?.len() == 0 {
            return Err(Error::invalid_data(format!("{} is empty", path.display())));
        }
        let mut fptr = fitsio::FitsFile::open(&path)?;

        let hdu = fptr.hdu(0)?;
        let primary = read_header(&mut fptr, &hdu)?;

        let mut nhdus = 0;
        let mut status = 0;
        unsafe {
            fitsio_sys::ffthdu(fptr.as_raw(), &mut nhdus, &mut status);
        }
        check_status(status)?;

        let mut extensions = Vec::new();
        for i in 1..nhdus.max(1) as usize {
            let hdu = fptr.hdu(i)?;
            let name = hdu
                .read_key::<String>(&mut fptr, "EXTNAME")
                .unwrap_or_default();
            extensions.push(name.trim().to_string());
        }

        let index = extensions
            .iter()
            .position(|name| name.eq_ignore_ascii_case(extname))
            .ok_or_else(|| {
                Error::invalid_data(format!(
                    "{} has no {extname} extension (found {:?})",
                    path.display(),
                    extensions
                ))
            })?;
        // the handle stays on this HDU for every later cell read
        let hdu = fptr.hdu(index + 1)?;
        let table = read_header(&mut fptr, &hdu)?;
        match table.string("XTENSION")? {
            "BINTABLE" => {}
            other => {
                return Err(Error::invalid_data(format!(
                    "expected a BINTABLE extension, found '{other}'"
                )));
            }
        }
        let nrows = table.count("NAXIS2")?;
        let columns = read_columns(&mut fptr, &table)?;

        debug!(
            path = %path.display(),
            extensions = ?extensions,
            rows = nrows,
            columns = columns.len(),
            "opened FITS file"
        );

        Ok(Self {
            path,
            fptr: Mutex::new(SendFitsFile(fptr)),
            primary,
            table,
            columns,
            nrows,
            extensions,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `EXTNAME` of every extension, in file order
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Names of the selected table's columns
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl TableStore for FitsFile {
    fn primary_header(&self) -> &Header {
        &self.primary
    }

    fn table_header(&self) -> &Header {
        &self.table
    }

    fn nrows(&self) -> usize {
        self.nrows
    }

    fn cell(&self, column: &str, row: usize) -> Result<Cell> {
        let column = self
            .column(column)
            .ok_or_else(|| Error::invalid_data(format!("no column named {column}")))?;
        if row >= self.nrows {
            return Err(Error::config(format!(
                "row {row} is out of range (table has {} rows)",
                self.nrows
            )));
        }
        let mut fptr = self
            .fptr
            .lock()
            .map_err(|_| Error::Io(io::Error::other("FITS handle lock poisoned")))?;
        read_cell(&mut fptr.0, column, row)
    }
}

fn c_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf.iter().map(|&c| c as u8).collect();
    CStr::from_bytes_until_nul(&bytes)
        .map(|s| s.to_string_lossy().trim().to_string())
        .unwrap_or_default()
}

/// Every valued keyword of the current HDU, in card order
fn read_header(fptr: &mut fitsio::FitsFile, hdu: &FitsHdu) -> Result<Header> {
    let mut status = 0;
    let mut nkeys = 0;
    let mut more = 0;
    unsafe {
        fitsio_sys::ffghsp(fptr.as_raw(), &mut nkeys, &mut more, &mut status);
    }
    check_status(status)?;

    let mut header = Header::new();
    for n in 1..=nkeys {
        let mut name = [0 as c_char; FLEN_KEYWORD];
        let mut value = [0 as c_char; FLEN_VALUE];
        let mut comment = [0 as c_char; FLEN_COMMENT];
        unsafe {
            fitsio_sys::ffgkyn(
                fptr.as_raw(),
                n,
                name.as_mut_ptr(),
                value.as_mut_ptr(),
                comment.as_mut_ptr(),
                &mut status,
            );
        }
        check_status(status)?;

        let key = c_string(&name);
        let raw = c_string(&value);
        // COMMENT, HISTORY and blank cards carry no value
        if key.is_empty() || raw.is_empty() {
            continue;
        }

        let mut dtype: c_char = 0;
        unsafe {
            fitsio_sys::ffdtyp(value.as_ptr(), &mut dtype, &mut status);
        }
        check_status(status)?;
        let parsed = match dtype as u8 {
            b'C' => HeaderValue::Str(hdu.read_key::<String>(fptr, &key)?),
            b'L' => HeaderValue::Logical(raw == "T"),
            b'I' => HeaderValue::Int(hdu.read_key::<i64>(fptr, &key)?),
            b'F' => HeaderValue::Float(hdu.read_key::<f64>(fptr, &key)?),
            // complex values are never needed
            _ => continue,
        };
        header.insert(key, parsed);
    }
    Ok(header)
}

fn read_columns(fptr: &mut fitsio::FitsFile, table: &Header) -> Result<Vec<Column>> {
    let tfields = table.count("TFIELDS")?;
    let mut columns = Vec::with_capacity(tfields);
    for i in 1..=tfields {
        let name = table
            .get(&format!("TTYPE{i}"))
            .and_then(HeaderValue::as_str)
            .map_or_else(|| format!("COL{i}"), str::to_string);
        let number = i32::try_from(i)
            .map_err(|_| Error::invalid_data(format!("TFIELDS {tfields} is too large")))?;

        let mut typecode = 0;
        let mut repeat = 0;
        let mut width = 0;
        let mut status = 0;
        unsafe {
            fitsio_sys::ffgtcl(
                fptr.as_raw(),
                number,
                &mut typecode,
                &mut repeat,
                &mut width,
                &mut status,
            );
        }
        check_status(status)?;
        let repeat = usize::try_from(repeat)
            .map_err(|_| Error::invalid_data(format!("column {name} has repeat {repeat}")))?;
        columns.push(Column {
            name,
            number,
            typecode,
            repeat,
        });
    }
    Ok(columns)
}

/// Read `$column.repeat` elements of one row with the cfitsio reader `$func`
macro_rules! read_vector {
    ($fptr:expr, $func:ident, $null:expr, $column:expr, $row:expr) => {{
        let mut values = vec![$null; $column.repeat];
        let mut status = 0;
        unsafe {
            fitsio_sys::$func(
                $fptr.as_raw(),
                $column.number,
                $row as i64 + 1,
                1,
                values.len() as i64,
                $null,
                values.as_mut_ptr(),
                &mut 0,
                &mut status,
            );
        }
        check_status(status).map(|_| values)
    }};
}

fn read_cell(fptr: &mut fitsio::FitsFile, column: &Column, row: usize) -> Result<Cell> {
    let cell = match column.typecode {
        TBYTE => Cell::Bytes(read_vector!(fptr, ffgcvb, 0u8, column, row)?),
        TSHORT => Cell::Shorts(read_vector!(fptr, ffgcvi, 0i16, column, row)?),
        // 'J' columns report TLONG but hold 32-bit values
        TINT | TLONG => Cell::Ints(read_vector!(fptr, ffgcvk, 0i32, column, row)?),
        TLONGLONG => Cell::Longs(read_vector!(fptr, ffgcvjj, 0i64, column, row)?),
        TFLOAT => Cell::Floats(read_vector!(fptr, ffgcve, 0f32, column, row)?),
        TDOUBLE => Cell::Doubles(read_vector!(fptr, ffgcvd, 0f64, column, row)?),
        other => {
            return Err(Error::invalid_data(format!(
                "column {} has unsupported type code {other}",
                column.name
            )));
        }
    };
    Ok(cell)
}
