//! `line-ext-sort` is an external merge sort for newline-delimited text.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass it sorts chunks of data that each fit in RAM, during the second pass it merges the sorted chunks
//! together. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Bounded memory:**
//!   at most one chunk of lines (10 000 by default) is held in memory at a time.
//! * **Bounded open files:**
//!   sorted chunks are merged in a tree of passes so that no more than a configured number of
//!   temporary files is open at once, whatever the input size.
//! * **Byte-wise ordering:**
//!   lines are compared as raw bytes, no UTF-8 validity is required. A final line without a trailing
//!   newline gets one appended.
//! * **Self-cleaning:**
//!   every temporary file is deleted once merged or on failure, only the result survives.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//! use std::path;
//!
//! use line_ext_sort::{ExternalSorter, ExternalSorterBuilder, LimitedBufferBuilder};
//!
//! fn main() {
//!     let input = fs::File::open("input.txt").unwrap();
//!
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_buffer(LimitedBufferBuilder::new(100_000, true))
//!         .build()
//!         .unwrap();
//!
//!     sorter.sort_to_writer(input, &mut io::stdout().lock()).unwrap();
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod merger;
pub mod reducer;
pub mod sort;
pub mod source;
pub mod storage;

pub use buffer::{ChunkBuffer, ChunkBufferBuilder, LimitedBuffer, LimitedBufferBuilder};
pub use merger::BinaryHeapMerger;
pub use reducer::MergeTreeReducer;
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError};
pub use source::{LineSource, Record};
pub use storage::{TempFile, TempKind, TempStorage};
