//! # Engine
//!
//! Read-only, embedded string store backed by a single compact container.
//!
//! A container is built offline from a two-column table (see [`encode`]) and
//! loaded whole at startup. Lookups never touch the filesystem: the offset
//! index and the decompressed value region both live in memory.
//!
//! ## Read path
//!
//! ```text
//!   get(key)
//!      │
//!      ▼
//! ┌──────────┐ hit
//! │ TtlCache │──────────────────────────────► value
//! └────┬─────┘
//!      │ miss
//!      ▼
//! ┌─────────────┐ absent
//! │ OffsetIndex │─────────────────────────► None
//! └────┬────────┘
//!      │ offset
//!      ▼
//! ┌─────────────┐   ┌──────────────────┐
//! │ ValueReader │──►│ AdaptivePromoter │──► cache if hot ──► value
//! └─────────────┘   └──────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use engine::{Compression, ContainerWriter, Engine, EngineConfig, EntryMap};
//!
//! let entries: EntryMap = [("a", "Hello"), ("b", "World"), ("a", "Ignored")]
//!     .into_iter()
//!     .collect();
//! let bytes = ContainerWriter::encode(&entries, Compression::Lz4).unwrap();
//!
//! let engine = Engine::new(EngineConfig::default());
//! engine.load_from_bytes(&bytes).unwrap();
//!
//! assert_eq!(engine.get("a").unwrap().as_deref(), Some("Hello"));
//! assert_eq!(engine.count().unwrap(), 2);
//! assert_eq!(engine.get("z").unwrap(), None);
//! ```

mod config;
mod decode;
mod engine;
mod error;
mod store;

use std::path::Path;

pub use config::EngineConfig;
pub use decode::{BufferPool, STACK_DECODE_LIMIT};
pub use engine::{Engine, EngineState, Entries};
pub use error::{EngineError, Result};
pub use store::{ReadStrategy, SharedReader, ValueReader, WorkerLocalReader};

pub use cache::{CacheStats, Clock, ManualClock, MonotonicClock};
pub use container::{inspect, Compression, ContainerInfo, ContainerWriter, EntryMap, KeyInterner};

/// Builds a container file at `output` from the two-column table at
/// `source`.
///
/// The table needs an identifier column (`key`, `id` or `identifier`) and a
/// text column (`value` or `text`), matched case-insensitively. Duplicate
/// identifiers keep their first value.
///
/// # Errors
///
/// - [`EngineError::SourceNotFound`] if `source` does not exist.
/// - [`EngineError::Container`] for a malformed table or a failed write.
pub fn encode<P, Q>(source: P, output: Q, compression: Compression) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    container::encode(source.as_ref(), output.as_ref(), compression).map_err(Into::into)
}
