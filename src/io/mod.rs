//! Byte-range access to slide files.

mod local_reader;
mod range_reader;

pub use local_reader::LocalFileReader;
pub(crate) use range_reader::check_range;
pub use range_reader::RangeReader;
