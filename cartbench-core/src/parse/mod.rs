//! Output parsers for the external codec tools.
//!
//! One parser per tool invocation shape. All parsers are pure, synchronous
//! functions over captured output lines: unrecognized lines are skipped,
//! recognized markers fill a typed record, and the record is returned only
//! when every required marker appeared. Callers commit records to the
//! container model on success, which keeps a failed parse from partially
//! overwriting earlier metadata.

pub mod nds;
pub mod threeds;
