//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value a cell holds or a formula produces
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangular range of cells (e.g., "A1:B10")

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use value::{CellError, CellValue, SharedString};
