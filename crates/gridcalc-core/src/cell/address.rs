//! A1-style cell addresses and rectangular ranges

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "AB12")
///
/// Both coordinates are 1-based, matching how addresses are written: column
/// letters map to base-26 numbers with `A = 1`, `Z = 26`, `AA = 27`.
///
/// Addresses order row-major (row first, then column), which is also the
/// order ranges are iterated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row number (1-based)
    pub row: u32,
    /// Column number (1-based, A=1)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address from 1-based row and column numbers
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `A1`-style text
    ///
    /// Column letters are case-insensitive. Grid limits are not checked
    /// here; see [`check_bounds`](Self::check_bounds).
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("ab12").unwrap();
    /// assert_eq!(addr.col, 28);
    /// assert_eq!(addr.row, 12);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let split = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());

        if split == 0 {
            return Err(Error::InvalidAddress(format!(
                "address '{}' must start with column letters",
                s
            )));
        }

        let col = Self::letters_to_column(&s[..split])?;

        let row_str = &s[split..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("address '{}' is missing its row", s)));
        }
        if !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!(
                "invalid row number in '{}'",
                s
            )));
        }

        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::RowOutOfBounds(u32::MAX, u32::MAX))?;

        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "rows start at 1, got '{}'",
                s
            )));
        }

        Ok(Self { row, col })
    }

    /// Check that this address lies inside a grid of the given size
    pub fn check_bounds(&self, max_rows: u32, max_cols: u32) -> Result<()> {
        if self.row > max_rows {
            return Err(Error::RowOutOfBounds(self.row, max_rows));
        }
        if self.col > max_cols {
            return Err(Error::ColumnOutOfBounds(self.col, max_cols));
        }
        Ok(())
    }

    /// Column number as letters: 1 is `A`, 27 is `AA`
    pub fn column_to_letters(col: u32) -> String {
        let mut letters = Vec::new();
        let mut n = col;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// Base-26 column number for `letters`, case-insensitive
    pub fn letters_to_column(letters: &str) -> Result<u32> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("missing column letters".into()));
        }

        letters.bytes().try_fold(0u32, |col, b| {
            if !b.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "'{}' is not a column letter",
                    b as char
                )));
            }
            let digit = (b.to_ascii_uppercase() - b'A') as u32 + 1;
            col.checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| Error::InvalidAddress(format!("column {} is too large", letters)))
        })
    }

    pub fn to_a1_string(&self) -> String {
        format!("{}{}", Self::column_to_letters(self.col), self.row)
    }

    /// Range spanning this address and `other`
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_to_letters(self.col), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10")
///
/// Always normalized: `start` is the top-left corner and `end` the
/// bottom-right, whatever order the corners were given in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    /// Top-left corner
    pub start: CellAddress,
    /// Bottom-right corner
    pub end: CellAddress,
}

impl CellRange {
    /// Range between two corners, in any order
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Range covering just `addr`
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse `A1:B10`, or a lone address as a one-cell range
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        match s.split_once(':') {
            Some((start, end)) => {
                let start = CellAddress::parse(start)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                let end = CellAddress::parse(end)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                Ok(Self::new(start, end))
            }
            None => Ok(Self::single(CellAddress::parse(s)?)),
        }
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        (self.start.row..=self.end.row).contains(&addr.row)
            && (self.start.col..=self.end.col).contains(&addr.col)
    }

    pub fn row_count(&self) -> u32 {
        1 + self.end.row - self.start.row
    }

    pub fn col_count(&self) -> u32 {
        1 + self.end.col - self.start.col
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.row_count()) * u64::from(self.col_count())
    }

    /// Iterate over all cell addresses in the range (rows outer, columns inner)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            row: self.start.row,
            col: self.start.col,
            remaining: self.cell_count(),
        }
    }

    pub fn to_a1_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Row-major walk over a [`CellRange`]
pub struct CellRangeIterator {
    range: CellRange,
    row: u32,
    col: u32,
    remaining: u64,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let addr = CellAddress::new(self.row, self.col);
        self.remaining -= 1;
        if self.col == self.range.end.col {
            self.col = self.range.start.col;
            self.row += 1;
        } else {
            self.col += 1;
        }
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for CellRangeIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters_from_number() {
        assert_eq!(CellAddress::column_to_letters(1), "A");
        assert_eq!(CellAddress::column_to_letters(2), "B");
        assert_eq!(CellAddress::column_to_letters(26), "Z");
        assert_eq!(CellAddress::column_to_letters(27), "AA");
        assert_eq!(CellAddress::column_to_letters(702), "ZZ");
        assert_eq!(CellAddress::column_to_letters(703), "AAA");
        assert_eq!(CellAddress::column_to_letters(16384), "XFD");
    }

    #[test]
    fn test_column_number_from_letters() {
        assert_eq!(CellAddress::letters_to_column("A").unwrap(), 1);
        assert_eq!(CellAddress::letters_to_column("Z").unwrap(), 26);
        assert_eq!(CellAddress::letters_to_column("AA").unwrap(), 27);
        assert_eq!(CellAddress::letters_to_column("XFD").unwrap(), 16384);

        // Case insensitive
        assert_eq!(CellAddress::letters_to_column("a").unwrap(), 1);
        assert_eq!(CellAddress::letters_to_column("aa").unwrap(), 27);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(CellAddress::parse("A1").unwrap(), CellAddress::new(1, 1));
        assert_eq!(CellAddress::parse(" c10 ").unwrap(), CellAddress::new(10, 3));
        assert_eq!("XFD7".parse::<CellAddress>().unwrap(), CellAddress::new(7, 16_384));
    }

    #[test]
    fn test_parse_rejects_malformed_addresses() {
        for bad in ["", "A", "1", "A0", "A1B", "A-1", "A99999999999"] {
            assert!(CellAddress::parse(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_check_bounds() {
        let corner = CellAddress::new(1_048_576, 16_384);
        assert!(corner.check_bounds(1_048_576, 16_384).is_ok());
        assert_eq!(
            CellAddress::new(11, 1).check_bounds(10, 10),
            Err(Error::RowOutOfBounds(11, 10))
        );
        assert_eq!(
            CellAddress::new(1, 11).check_bounds(10, 10),
            Err(Error::ColumnOutOfBounds(11, 10))
        );
    }

    #[test]
    fn test_display_address() {
        assert_eq!(CellAddress::new(1, 1).to_string(), "A1");
        assert_eq!(CellAddress::new(100, 3).to_string(), "C100");
    }

    #[test]
    fn test_cell_range_normalizes_corners() {
        let range = CellRange::parse("B3:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(1, 1));
        assert_eq!(range.end, CellAddress::new(3, 2));

        let range = CellRange::parse("A3:B1").unwrap();
        assert_eq!(range.to_string(), "A1:B3");
    }

    #[test]
    fn test_range_contains() {
        let range: CellRange = "B2:D4".parse().unwrap();
        assert!(range.contains(&CellAddress::new(2, 2))); // B2
        assert!(range.contains(&CellAddress::new(4, 4))); // D4
        assert!(!range.contains(&CellAddress::new(1, 1))); // A1
        assert!(!range.contains(&CellAddress::new(5, 2))); // B5
    }

    #[test]
    fn test_range_cells_are_row_major() {
        let range = CellRange::parse("b2:a1").unwrap();
        assert_eq!(
            range.cells().collect::<Vec<_>>(),
            vec![
                CellAddress::new(1, 1), // A1
                CellAddress::new(1, 2), // B1
                CellAddress::new(2, 1), // A2
                CellAddress::new(2, 2), // B2
            ]
        );
        assert_eq!(range.cells().len(), 4);
    }
}
