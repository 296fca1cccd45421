//! schedrecon - scheduling timeline reconstruction from per-CPU trace records
//!
//! This library rebuilds a coherent scheduling history from independent,
//! per-processor streams of sparse trace records (task handoffs, yields, work
//! queue phases). It produces two mutually consistent views: a per-CPU
//! occupancy timeline and a per-task timeline, resolving task identities that
//! were unknown when a record was captured.
//!
//! # Example
//!
//! ```
//! use schedrecon::descriptor::RunDescriptor;
//! use schedrecon::run::reconstruct_from_readers;
//! use std::io::Cursor;
//!
//! # fn main() -> schedrecon::error::Result<()> {
//! let descriptor = RunDescriptor::from_json_str(
//!     r#"{"csvs": [], "pc_map": {"0x10": "jmp", "0x20": "yield"}, "task_map": {"a": 1}}"#,
//! )?;
//! let cpu0 = Cursor::new("pc,tsc,val\n0x10,10,a\n0x20,20,a\n");
//! let result = reconstruct_from_readers(&descriptor, [(0, cpu0)])?;
//! assert_eq!(result.model.cpu_timeline(0).unwrap().len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod cli;
pub mod csv_output;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod event;
pub mod intervals;
pub mod json_output;
pub mod model;
pub mod run;
pub mod stats;
pub mod stream_reader;
