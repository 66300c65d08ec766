// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PackBits-style line compression shared by PWG and Apple raster.
//
// Each group starts with a line-repeat byte (repeat count minus one), then
// the line as runs of pixel units:
//   0..=127   the next unit repeated n+1 times
//   129..=255 257-n literal units follow
//   128       the rest of the line is blank (decoder only)

use std::io::Read;

use rasterwerk_core::{RasterError, Result};

/// Most lines one group can repeat.
pub const MAX_LINE_REPEAT: u32 = 256;
/// Most units one run can cover.
const MAX_RUN: usize = 128;
const FILL_REST: u8 = 128;

/// Bytes of one run unit for a given pixel size.
pub fn unit_size(bits_per_pixel: u32) -> usize {
    (bits_per_pixel as usize / 8).max(1)
}

/// Append the compressed runs of one line (without the repeat byte).
pub fn encode_line(line: &[u8], unit: usize, out: &mut Vec<u8>) {
    let n = line.len() / unit;
    let at = |i: usize| &line[i * unit..(i + 1) * unit];
    let mut i = 0;
    while i < n {
        if i + 1 < n && at(i) == at(i + 1) {
            let mut count = 2;
            while i + count < n && count < MAX_RUN && at(i + count) == at(i) {
                count += 1;
            }
            out.push((count - 1) as u8);
            out.extend_from_slice(at(i));
            i += count;
        } else {
            let start = i;
            let mut count = 1;
            i += 1;
            while i < n && count < MAX_RUN && !(i + 1 < n && at(i) == at(i + 1)) {
                count += 1;
                i += 1;
            }
            if count == 1 {
                out.push(0);
            } else {
                out.push((257 - count) as u8);
            }
            out.extend_from_slice(&line[start * unit..(start + count) * unit]);
        }
    }
}

/// Append a whole group: repeat byte and runs.
pub fn encode_group(line: &[u8], repeat: u32, unit: usize, out: &mut Vec<u8>) {
    debug_assert!((1..=MAX_LINE_REPEAT).contains(&repeat));
    out.push((repeat - 1) as u8);
    encode_line(line, unit, out);
}

fn read_byte<R: Read>(input: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    input.read_exact(&mut b).map_err(short)?;
    Ok(b[0])
}

fn short(err: std::io::Error) -> RasterError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        RasterError::Stream("compressed line ends early".into())
    } else {
        super::read_failed(err)
    }
}

/// Decode one group into `line`. Returns how many times the line repeats.
pub fn decode_group<R: Read>(input: &mut R, line: &mut [u8], unit: usize, blank: u8) -> Result<u32> {
    let repeat = read_byte(input)? as u32 + 1;
    let n = line.len() / unit;
    let mut pos = 0;
    while pos < n {
        let code = read_byte(input)?;
        if code == FILL_REST {
            line[pos * unit..].fill(blank);
            break;
        }
        if code < FILL_REST {
            let count = code as usize + 1;
            if pos + count > n {
                return Err(RasterError::Stream(format!(
                    "run of {count} overruns line at unit {pos} of {n}"
                )));
            }
            let first = pos * unit;
            input
                .read_exact(&mut line[first..first + unit])
                .map_err(short)?;
            for k in 1..count {
                line.copy_within(first..first + unit, first + k * unit);
            }
            pos += count;
        } else {
            let count = 257 - code as usize;
            if pos + count > n {
                return Err(RasterError::Stream(format!(
                    "literal of {count} overruns line at unit {pos} of {n}"
                )));
            }
            input
                .read_exact(&mut line[pos * unit..(pos + count) * unit])
                .map_err(short)?;
            pos += count;
        }
    }
    Ok(repeat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(line: &[u8], unit: usize) -> Vec<u8> {
        let mut enc = Vec::new();
        encode_group(line, 3, unit, &mut enc);
        let mut back = vec![0u8; line.len()];
        let repeat = decode_group(&mut enc.as_slice(), &mut back, unit, 0xff).unwrap();
        assert_eq!(repeat, 3);
        back
    }

    #[test]
    fn runs_and_literals() {
        let mut enc = Vec::new();
        encode_line(&[5, 5, 5, 1, 2, 3, 9], 1, &mut enc);
        // 3 x 5, then literal 1 2 3 9.
        assert_eq!(enc, vec![2, 5, 253, 1, 2, 3, 9]);
    }

    #[test]
    fn single_unit_uses_repeat_of_one() {
        let mut enc = Vec::new();
        encode_line(&[7], 1, &mut enc);
        assert_eq!(enc, vec![0, 7]);
    }

    #[test]
    fn long_runs_split_at_128() {
        let line = vec![0xaau8; 300];
        let mut enc = Vec::new();
        encode_line(&line, 1, &mut enc);
        assert_eq!(enc, vec![127, 0xaa, 127, 0xaa, 43, 0xaa]);
        assert_eq!(round_trip(&line, 1), line);
    }

    #[test]
    fn multi_byte_units() {
        let line: Vec<u8> = [[1u8, 2, 3], [1, 2, 3], [4, 5, 6], [7, 8, 9]].concat();
        assert_eq!(round_trip(&line, 3), line);
        let noisy: Vec<u8> = (0..600).map(|i| (i * 7 % 251) as u8).collect();
        assert_eq!(round_trip(&noisy, 3), noisy);
    }

    #[test]
    fn fill_rest_blanks_the_tail() {
        let data = [0u8, 1, 9, FILL_REST];
        let mut line = [0u8; 5];
        decode_group(&mut &data[..], &mut line, 1, 0xff).unwrap();
        assert_eq!(line, [9, 9, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn overrun_is_an_error() {
        let data = [0u8, 10, 1];
        let mut line = [0u8; 4];
        assert!(decode_group(&mut &data[..], &mut line, 1, 0).is_err());
    }

    #[test]
    fn truncated_group_is_an_error() {
        let data = [0u8, 253, 1];
        let mut line = [0u8; 4];
        assert!(matches!(
            decode_group(&mut &data[..], &mut line, 1, 0),
            Err(RasterError::Stream(_))
        ));
    }
}
