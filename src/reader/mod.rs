pub mod workbook_reader;

pub use workbook_reader::*;
