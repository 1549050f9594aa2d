//! Interchange record models.
//!
//! The core does no file I/O of its own; these modules define the record
//! shapes the external serializers speak, plus the lossless conversions
//! between records and the in-memory model:
//!
//! - [`tabular`]: one row per evidence, for the tabular interchange format
//! - [`archive`]: one JSON object per line, streamable and restartable
//! - [`propgraph`]: node/edge tables for a labeled property graph

pub mod archive;
pub mod propgraph;
pub mod tabular;
