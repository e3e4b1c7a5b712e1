//! # gridcalc-core
//!
//! Core data structures shared by the gridcalc formula engine.
//!
//! This crate provides:
//! - [`CellValue`] - Values a cell holds or a formula produces (numbers are decimals)
//! - [`CellError`] - Error markers shown in place of a value (`#DIV/0!`, `#CIRC!`, ...)
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellAddress, CellRange, CellValue};
//!
//! let addr: CellAddress = "B2".parse().unwrap();
//! assert_eq!((addr.row, addr.col), (2, 2));
//!
//! let range = CellRange::parse("C3:A1").unwrap();
//! assert_eq!(range.to_string(), "A1:C3");
//! assert_eq!(range.cell_count(), 9);
//!
//! assert_eq!(CellValue::from(42).to_string(), "42");
//! ```

pub mod cell;
pub mod error;

pub use cell::{CellAddress, CellError, CellRange, CellRangeIterator, CellValue, SharedString};
pub use error::{Error, Result};

/// Default maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Default maximum number of columns in a worksheet
pub const MAX_COLS: u32 = 16_384;
