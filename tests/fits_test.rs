//! Integration tests for the cfitsio-backed table store

mod helpers;

use helpers::{SearchFile, primary_only, ramp_block_u8, temp_path};
use psrsearch::{ColumnKind, Error, FitsFile, TableStore};
use std::fs;

#[test]
fn test_open_finds_subint_after_other_extensions() {
    let path = temp_path("extensions.sf");
    let mut file = SearchFile::new(4, 2, 2, 8, "AABB");
    file.push_row(ramp_block_u8(4, 2, 2));
    file.write(&path);

    let fits = FitsFile::open(&path).expect("Failed to open FITS file");
    assert_eq!(fits.extensions(), &["HISTORY".to_string(), "SUBINT".to_string()]);
    assert_eq!(fits.nrows(), 1);
    let columns: Vec<&str> = fits.column_names().collect();
    assert_eq!(
        columns,
        vec!["TSUBINT", "OFFS_SUB", "DAT_FREQ", "DAT_WTS", "DAT_OFFS", "DAT_SCL", "DATA"]
    );

    fs::remove_file(&path).ok();
}

#[test]
fn test_cells_are_typed() {
    let path = temp_path("cells.sf");
    let mut file = SearchFile::new(4, 2, 2, 8, "AABB");
    for i in 0..3 {
        let row = file.push_row(ramp_block_u8(4, 2, 2));
        row.freqs = vec![1000.0 + i as f64, 2000.0];
    }
    file.write(&path);

    let fits = FitsFile::open(&path).unwrap();
    let freq = fits.cell("DAT_FREQ", 2).unwrap();
    assert_eq!(freq.kind(), ColumnKind::Double);
    assert_eq!(freq.to_f64s(), vec![1002.0, 2000.0]);

    let weights = fits.cell("DAT_WTS", 0).unwrap();
    assert_eq!(weights.kind(), ColumnKind::Float);
    assert_eq!(weights.len(), 2);

    let data = fits.cell("DATA", 0).unwrap();
    assert_eq!(data.kind(), ColumnKind::Byte);
    assert_eq!(data.len(), 16);
    assert_eq!(data.to_be_bytes().as_ref(), ramp_block_u8(4, 2, 2).as_slice());

    assert_eq!(fits.cell("OFFS_SUB", 1).unwrap().scalar_f64().unwrap(), 1.5);
    assert!(matches!(fits.cell("DATA", 3), Err(Error::Config(_))));
    assert!(matches!(fits.cell("NO_SUCH", 0), Err(Error::Io(_))));

    fs::remove_file(&path).ok();
}

#[test]
fn test_missing_subint_is_invalid_data() {
    let path = temp_path("no_subint.sf");
    let mut file = SearchFile::new(4, 2, 2, 8, "AABB");
    file.push_row(ramp_block_u8(4, 2, 2));
    file.write(&path);

    let err = FitsFile::open_table(&path, "POLYCO").unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
        other => panic!("unexpected error: {other}"),
    }

    fs::remove_file(&path).ok();
}

#[test]
fn test_empty_and_garbage_files() {
    let path = temp_path("empty.sf");
    fs::write(&path, b"").unwrap();
    assert!(matches!(FitsFile::open(&path), Err(Error::Io(_))));

    fs::write(&path, vec![b'x'; 100]).unwrap();
    assert!(matches!(FitsFile::open(&path), Err(Error::Io(_))));

    fs::remove_file(&path).ok();
}

#[test]
fn test_headers_read_through_cfitsio() {
    let path = temp_path("header_values.sf");
    let mut file = SearchFile::new(4, 2, 2, 8, "AABB");
    file.push_row(ramp_block_u8(4, 2, 2));
    file.write(&path);

    let fits = FitsFile::open(&path).unwrap();
    let primary = fits.primary_header();
    assert_eq!(primary.string("OBS_MODE").unwrap(), "SEARCH");
    assert_eq!(primary.get("SIMPLE").and_then(|v| v.as_bool()), Some(true));
    let table = fits.table_header();
    assert_eq!(table.int("NCHAN").unwrap(), 2);
    // written with a D exponent
    assert!((table.float("TBIN").unwrap() - 0.25).abs() < 1e-15);
    assert_eq!(table.string("POL_TYPE").unwrap(), "AABB");

    fs::remove_file(&path).ok();
}

#[test]
fn test_oversized_axes_are_an_error_not_a_panic() {
    let path = temp_path("oversized.sf");
    let huge = (1_i64 << 62).to_string();
    let bytes = primary_only(&[
        ("SIMPLE", "T"),
        ("BITPIX", "8"),
        ("NAXIS", "2"),
        ("NAXIS1", huge.as_str()),
        ("NAXIS2", huge.as_str()),
        ("EXTEND", "T"),
    ]);
    fs::write(&path, bytes).unwrap();
    assert!(matches!(FitsFile::open(&path), Err(Error::Io(_))));

    let big = (1_i64 << 40).to_string();
    let mut bytes = primary_only(&[
        ("SIMPLE", "T"),
        ("BITPIX", "8"),
        ("NAXIS", "1"),
        ("NAXIS1", big.as_str()),
        ("EXTEND", "T"),
    ]);
    // a valid table follows, but the primary data unit claims to cover it
    let mut file = SearchFile::new(4, 2, 2, 8, "AABB");
    file.push_row(ramp_block_u8(4, 2, 2));
    bytes.extend(&file.to_bytes()[2880..]);
    fs::write(&path, bytes).unwrap();
    assert!(matches!(FitsFile::open(&path), Err(Error::Io(_))));

    fs::remove_file(&path).ok();
}
