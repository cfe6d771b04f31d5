//! The EDB on-disk table format: a paged, memory-mapped file with an
//! intra-file heap allocator for variable-length values (spec §4.7), plus a
//! line-oriented CSV import/export codec (spec §4.8).

pub mod bytes;
pub mod csv;
pub mod edb_table;
pub mod heap;
pub mod layout;
pub mod mapping;

pub use edb_table::EdbTable;
