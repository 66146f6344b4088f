//! File scanning and collection functionality

pub mod file_scanner;

pub use file_scanner::{extension_of, scan, FileEntry};
