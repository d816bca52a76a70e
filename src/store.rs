//! Table store abstraction
//!
//! The decoding core only needs typed header values and typed cells fetched
//! by (column, row). [`TableStore`] is that seam: [`crate::fits::FitsFile`]
//! implements it on top of cfitsio, and [`MemoryStore`] keeps everything in
//! owned buffers, which is handy for synthetic data.
use std::borrow::Cow;

use crate::error::{Error, Result};

/// A typed header value
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Logical(bool),
}

impl HeaderValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Floats and integers both read as `f64`
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Str(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Str(s)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        HeaderValue::Logical(v)
    }
}

/// Ordered keyword/value list of one header unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing an existing keyword of the same name
    pub fn insert<K: Into<String>, V: Into<HeaderValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn require(&self, key: &str) -> Result<&HeaderValue> {
        self.get(key)
            .ok_or_else(|| Error::invalid_data(format!("missing header keyword {key}")))
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        self.require(key)?
            .as_int()
            .ok_or_else(|| Error::invalid_data(format!("header keyword {key} is not an integer")))
    }

    /// Non-negative integer keyword as `usize`
    pub fn count(&self, key: &str) -> Result<usize> {
        let value = self.int(key)?;
        usize::try_from(value)
            .map_err(|_| Error::invalid_data(format!("header keyword {key} is negative ({value})")))
    }

    pub fn float(&self, key: &str) -> Result<f64> {
        self.require(key)?
            .as_float()
            .ok_or_else(|| Error::invalid_data(format!("header keyword {key} is not numeric")))
    }

    pub fn string(&self, key: &str) -> Result<&str> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| Error::invalid_data(format!("header keyword {key} is not a string")))
    }
}

/// Element type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Unsigned 8-bit
    Byte,
    /// Signed 16-bit
    Short,
    /// Signed 32-bit
    Int,
    /// Signed 64-bit
    Long,
    /// IEEE 32-bit float
    Float,
    /// IEEE 64-bit float
    Double,
}

/// One numeric table cell, holding every element of its vector
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Bytes(Vec<u8>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
}

impl Cell {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Cell::Bytes(_) => ColumnKind::Byte,
            Cell::Shorts(_) => ColumnKind::Short,
            Cell::Ints(_) => ColumnKind::Int,
            Cell::Longs(_) => ColumnKind::Long,
            Cell::Floats(_) => ColumnKind::Float,
            Cell::Doubles(_) => ColumnKind::Double,
        }
    }

    /// Number of elements in the cell
    pub fn len(&self) -> usize {
        match self {
            Cell::Bytes(v) => v.len(),
            Cell::Shorts(v) => v.len(),
            Cell::Ints(v) => v.len(),
            Cell::Longs(v) => v.len(),
            Cell::Floats(v) => v.len(),
            Cell::Doubles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64s(&self) -> Vec<f64> {
        match self {
            Cell::Bytes(v) => v.iter().map(|&x| x as f64).collect(),
            Cell::Shorts(v) => v.iter().map(|&x| x as f64).collect(),
            Cell::Ints(v) => v.iter().map(|&x| x as f64).collect(),
            Cell::Longs(v) => v.iter().map(|&x| x as f64).collect(),
            Cell::Floats(v) => v.iter().map(|&x| x as f64).collect(),
            Cell::Doubles(v) => v.clone(),
        }
    }

    /// First element of the cell
    pub fn scalar_f64(&self) -> Result<f64> {
        self.to_f64s()
            .first()
            .copied()
            .ok_or_else(|| Error::invalid_data("empty scalar cell"))
    }

    /// Cell contents laid out as they are stored on disk (big-endian).
    ///
    /// Byte cells are returned as is; wider types are re-encoded so that
    /// sample decoding sees the file's byte order whatever the column type.
    pub fn to_be_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Cell::Bytes(v) => Cow::Borrowed(v.as_slice()),
            Cell::Shorts(v) => Cow::Owned(v.iter().flat_map(|x| x.to_be_bytes()).collect()),
            Cell::Ints(v) => Cow::Owned(v.iter().flat_map(|x| x.to_be_bytes()).collect()),
            Cell::Longs(v) => Cow::Owned(v.iter().flat_map(|x| x.to_be_bytes()).collect()),
            Cell::Floats(v) => Cow::Owned(v.iter().flat_map(|x| x.to_be_bytes()).collect()),
            Cell::Doubles(v) => Cow::Owned(v.iter().flat_map(|x| x.to_be_bytes()).collect()),
        }
    }
}

/// Source of headers and row cells for one data table.
///
/// Implementations must be shareable across threads: rows are fetched from
/// worker threads while the output buffer is filled in parallel.
pub trait TableStore: Sync {
    /// Header of the primary unit (holds `OBS_MODE`)
    fn primary_header(&self) -> &Header;

    /// Header of the data table (holds `NSBLK`, `NCHAN`, ...)
    fn table_header(&self) -> &Header;

    /// Number of rows in the data table
    fn nrows(&self) -> usize;

    /// Fetch one cell by column name and 0-based row index
    fn cell(&self, column: &str, row: usize) -> Result<Cell>;
}

/// Table store backed by owned, in-memory cells
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    primary: Header,
    table: Header,
    columns: Vec<(String, Vec<Cell>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary<V: Into<HeaderValue>>(mut self, key: &str, value: V) -> Self {
        self.primary.insert(key, value);
        self
    }

    pub fn with_table<V: Into<HeaderValue>>(mut self, key: &str, value: V) -> Self {
        self.table.insert(key, value);
        self
    }

    /// Add or replace a column.
    ///
    /// `NAXIS2` of the table header follows the longest column.
    pub fn with_column(mut self, name: &str, rows: Vec<Cell>) -> Self {
        self.columns.retain(|(n, _)| n != name);
        self.columns.push((name.to_string(), rows));
        let nrows = self.nrows() as i64;
        self.table.insert("NAXIS2", nrows);
        self
    }

    pub fn with_bytes(self, name: &str, rows: Vec<Vec<u8>>) -> Self {
        self.with_column(name, rows.into_iter().map(Cell::Bytes).collect())
    }

    pub fn with_i16s(self, name: &str, rows: Vec<Vec<i16>>) -> Self {
        self.with_column(name, rows.into_iter().map(Cell::Shorts).collect())
    }

    pub fn with_f32s(self, name: &str, rows: Vec<Vec<f32>>) -> Self {
        self.with_column(name, rows.into_iter().map(Cell::Floats).collect())
    }

    pub fn with_f64s(self, name: &str, rows: Vec<Vec<f64>>) -> Self {
        self.with_column(name, rows.into_iter().map(Cell::Doubles).collect())
    }
}

impl TableStore for MemoryStore {
    fn primary_header(&self) -> &Header {
        &self.primary
    }

    fn table_header(&self) -> &Header {
        &self.table
    }

    fn nrows(&self) -> usize {
        self.columns.iter().map(|(_, rows)| rows.len()).max().unwrap_or(0)
    }

    fn cell(&self, column: &str, row: usize) -> Result<Cell> {
        let (_, rows) = self
            .columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .ok_or_else(|| Error::invalid_data(format!("no column named {column}")))?;
        rows.get(row)
            .cloned()
            .ok_or_else(|| Error::truncated(format!("column {column} has no row {row}")))
    }
}
