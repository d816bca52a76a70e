//! Test helper utilities for writing synthetic search-mode PSRFITS files
#![allow(dead_code)]

use std::path::{Path, PathBuf};

const BLOCK_LEN: usize = 2880;
const CARD_LEN: usize = 80;

/// One sub-integration row
#[derive(Debug, Clone)]
pub struct Row {
    /// Raw `DATA` bytes, already encoded at the file's bit width
    pub data: Vec<u8>,
    pub scales: Vec<f32>,
    pub offsets: Vec<f32>,
    pub weights: Vec<f32>,
    pub freqs: Vec<f64>,
    pub offs_sub: f64,
    pub tsubint: f64,
}

/// Layout and content of a synthetic file
#[derive(Debug, Clone)]
pub struct SearchFile {
    pub obs_mode: String,
    pub nsblk: usize,
    pub npol: usize,
    pub nchan: usize,
    pub nbits: usize,
    pub tbin: f64,
    pub pol_type: String,
    pub rows: Vec<Row>,
}

impl SearchFile {
    /// Identity calibration, frequencies 1400 + chan MHz, 1 s rows back to back
    pub fn new(nsblk: usize, npol: usize, nchan: usize, nbits: usize, pol_type: &str) -> Self {
        Self {
            obs_mode: "SEARCH".to_string(),
            nsblk,
            npol,
            nchan,
            nbits,
            tbin: 1.0 / nsblk as f64,
            pol_type: pol_type.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, data: Vec<u8>) -> &mut Row {
        let index = self.rows.len();
        let n = self.npol * self.nchan;
        self.rows.push(Row {
            data,
            scales: vec![1.0; n],
            offsets: vec![0.0; n],
            weights: vec![1.0; self.nchan],
            freqs: (0..self.nchan).map(|c| 1400.0 + c as f64).collect(),
            offs_sub: index as f64 + 0.5,
            tsubint: 1.0,
        });
        self.rows.last_mut().unwrap()
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).expect("Failed to write test file");
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let first = self.rows.first().expect("at least one row");
        let columns = [
            ("TSUBINT", "1D".to_string()),
            ("OFFS_SUB", "1D".to_string()),
            ("DAT_FREQ", format!("{}D", first.freqs.len())),
            ("DAT_WTS", format!("{}E", first.weights.len())),
            ("DAT_OFFS", format!("{}E", first.offsets.len())),
            ("DAT_SCL", format!("{}E", first.scales.len())),
            ("DATA", format!("{}B", first.data.len())),
        ];
        let row_len = 8 + 8 + 8 * first.freqs.len() + 4 * first.weights.len()
            + 4 * first.offsets.len()
            + 4 * first.scales.len()
            + first.data.len();

        let mut out = header_unit(&[
            card("SIMPLE", "T"),
            card("BITPIX", "8"),
            card("NAXIS", "0"),
            card("EXTEND", "T"),
            card("OBS_MODE", &quoted(&self.obs_mode)),
            card("TELESCOP", &quoted("SYNTH")),
        ]);

        // an unrelated empty table ahead of SUBINT
        out.extend(header_unit(&[
            card("XTENSION", &quoted("BINTABLE")),
            card("BITPIX", "8"),
            card("NAXIS", "2"),
            card("NAXIS1", "0"),
            card("NAXIS2", "0"),
            card("PCOUNT", "0"),
            card("GCOUNT", "1"),
            card("TFIELDS", "0"),
            card("EXTNAME", &quoted("HISTORY")),
        ]));

        let mut cards = vec![
            card("XTENSION", &quoted("BINTABLE")),
            card("BITPIX", "8"),
            card("NAXIS", "2"),
            card("NAXIS1", &row_len.to_string()),
            card("NAXIS2", &self.rows.len().to_string()),
            card("PCOUNT", "0"),
            card("GCOUNT", "1"),
            card("TFIELDS", &columns.len().to_string()),
        ];
        for (i, (name, tform)) in columns.iter().enumerate() {
            cards.push(card(&format!("TTYPE{}", i + 1), &quoted(name)));
            cards.push(card(&format!("TFORM{}", i + 1), &quoted(tform)));
        }
        cards.extend([
            card("EXTNAME", &quoted("SUBINT")),
            card("NSBLK", &self.nsblk.to_string()),
            card("NPOL", &self.npol.to_string()),
            card("NCHAN", &self.nchan.to_string()),
            card("NBITS", &self.nbits.to_string()),
            card("TBIN", &format!("{:.15E}", self.tbin).replace('E', "D")),
            card("POL_TYPE", &quoted(&self.pol_type)),
        ]);
        out.extend(header_unit(&cards));

        let mut data = Vec::with_capacity(row_len * self.rows.len());
        for row in &self.rows {
            data.extend(row.tsubint.to_be_bytes());
            data.extend(row.offs_sub.to_be_bytes());
            row.freqs.iter().for_each(|v| data.extend(v.to_be_bytes()));
            row.weights.iter().for_each(|v| data.extend(v.to_be_bytes()));
            row.offsets.iter().for_each(|v| data.extend(v.to_be_bytes()));
            row.scales.iter().for_each(|v| data.extend(v.to_be_bytes()));
            data.extend(&row.data);
        }
        data.resize(data.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);
        out.extend(data);
        out
    }
}

fn card(key: &str, value: &str) -> Vec<u8> {
    let mut c = format!("{key:<8}= {value:>20}").into_bytes();
    c.resize(CARD_LEN, b' ');
    c
}

fn quoted(s: &str) -> String {
    format!("'{:<8}'", s.replace('\'', "''"))
}

fn header_unit(cards: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes: Vec<u8> = cards.concat();
    let mut end = b"END".to_vec();
    end.resize(CARD_LEN, b' ');
    bytes.extend(end);
    bytes.resize(bytes.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, b' ');
    bytes
}

/// A file made of a single primary header unit with the given cards
pub fn primary_only(cards: &[(&str, &str)]) -> Vec<u8> {
    let cards: Vec<Vec<u8>> = cards.iter().map(|(k, v)| card(k, v)).collect();
    header_unit(&cards)
}

/// 8-bit block where every (pol, chan) of sample `s` holds `s + 1`
pub fn ramp_block_u8(nsblk: usize, npol: usize, nchan: usize) -> Vec<u8> {
    (0..nsblk)
        .flat_map(|s| std::iter::repeat_n(s as u8 + 1, npol * nchan))
        .collect()
}

/// Encode samples laid out `[sample, pol, chan]` as big-endian 16-bit
pub fn encode_i16_be(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Encode samples laid out `[sample, pol, chan]` as big-endian 32-bit floats
pub fn encode_f32_be(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Unique path in the temp directory
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("psrsearch_{}_{name}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_width() {
        assert_eq!(card("NBITS", "8").len(), CARD_LEN);
        assert_eq!(&card("OBS_MODE", &quoted("SEARCH"))[..10], b"OBS_MODE= ");
    }

    #[test]
    fn test_file_is_block_aligned() {
        let mut file = SearchFile::new(4, 2, 2, 8, "AABB");
        file.push_row(ramp_block_u8(4, 2, 2));
        assert_eq!(file.to_bytes().len() % BLOCK_LEN, 0);
    }

    #[test]
    fn test_ramp_block() {
        let block = ramp_block_u8(4, 2, 2);
        assert_eq!(block.len(), 16);
        assert_eq!(&block[..4], &[1, 1, 1, 1]);
        assert_eq!(&block[12..], &[4, 4, 4, 4]);
    }
}
