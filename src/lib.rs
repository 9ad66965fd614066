//! Merge many nearly chronological access log streams into one
//! time-ordered stream.
//!
//! Each input is parsed into [`Record`]s by a [`SourceAdapter`], sorted
//! within a bounded window by a [`Resequencer`] and the resulting streams
//! are combined by a k-way [`Merger`]. [`OrderedSource`] wires the first two
//! together for a single input:
//!
//! ```no_run
//! use logweave::{Dialect, Merger, OrderedSource, SourceOptions};
//!
//! # fn main() -> Result<(), logweave::MergeError> {
//! let options = SourceOptions::default();
//! let sources = vec![
//!     OrderedSource::open("web1/access.log.gz", Dialect::Combined, &options)?,
//!     OrderedSource::open("web2/access.log.gz", Dialect::Combined, &options)?,
//! ];
//! for record in Merger::new(sources)? {
//!     println!("{}", record?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dateglob;
pub mod decompression;
pub mod dialect;
pub mod error;
pub mod filters;
pub mod merger;
pub mod platform;
pub mod record;
pub mod resequencer;
pub mod source;
pub mod splitter;
pub mod stats;
pub mod window;

pub use dialect::{Dialect, LogLine};
pub use error::{MergeError, MergeResult, ParseError};
pub use filters::{DateFilter, DateRangeFilter, RecordStreamExt, SampleFilter};
pub use merger::Merger;
pub use record::{LogFields, Record};
pub use resequencer::Resequencer;
pub use source::{LossyLines, OrderedSource, RecordParser, SourceAdapter, SourceOptions};
pub use splitter::DateSplitter;
pub use window::Window;
