/*
 * @file blocking.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Shared pieces of the blocked drivers: how to cut a range of rows into
 * register tiles, and argument checking.
 */

use crate::error::{Error,Result};

/**
 * Cut `m` rows into blocks of 3, 2 or 1 registers of `lanes` rows each.
 * Returns (first row, registers) pairs in increasing order.  Big blocks
 * come first; the tail is made of smaller ones so that no block is more
 * than one register past the end.  The last block may still be partial.
 */
pub(crate) fn row_blocks(m:usize, lanes:usize) -> Vec<(usize,usize)> {
    let mut ret = Vec::with_capacity(m / lanes + 1);
    let mut i = 0;
    while i + 2*lanes < m { ret.push((i,3)); i += 3*lanes; }
    while i + lanes < m   { ret.push((i,2)); i += 2*lanes; }
    while i < m           { ret.push((i,1)); i += lanes; }
    ret
}

/** Fail with a dimension mismatch unless `found == expected` */
pub(crate) fn check_shape(op:&'static str, expected:(usize,usize), found:(usize,usize)) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        log::debug!("{}: expected {:?}, found {:?}", op, expected, found);
        Err(Error::DimensionMismatch { op: op, expected: expected, found: found })
    }
}

/** Size of a square matrix, or a mismatch error */
pub(crate) fn check_square(op:&'static str, shape:(usize,usize)) -> Result<usize> {
    check_shape(op, (shape.0,shape.0), shape)?;
    Ok(shape.0)
}

#[cfg(test)]
mod tests {
    use crate::blocking::*;

    #[test]
    fn blocks_cover_rows() {
        for lanes in [4,8] {
            for m in 0..100 {
                let blocks = row_blocks(m, lanes);
                let mut next = 0;
                for &(i,regs) in blocks.iter() {
                    assert_eq!(i, next);
                    assert!(regs >= 1 && regs <= 3);
                    assert!(i < m);
                    /* Never more than one register hangs past the end */
                    assert!(i + (regs-1)*lanes < m);
                    next = i + regs*lanes;
                }
                assert!(next >= m);
            }
        }
        assert_eq!(row_blocks(13, 4), vec![(0,3),(12,1)]);
        assert_eq!(row_blocks(7, 4), vec![(0,2)]);
        assert!(row_blocks(0, 4).is_empty());
    }

    #[test]
    fn shape_checks() {
        assert_eq!(check_shape("x", (2,3), (2,3)), Ok(()));
        assert_eq!(check_shape("x", (2,3), (3,2)),
            Err(Error::DimensionMismatch { op: "x", expected: (2,3), found: (3,2) }));
        assert_eq!(check_square("y", (4,4)), Ok(4));
        assert!(check_square("y", (4,5)).is_err());
    }
}
