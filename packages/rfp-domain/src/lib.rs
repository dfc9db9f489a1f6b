pub mod chunk;
pub mod filter;
pub mod tenant;
pub mod time_serde;

mod error;

pub use chunk::{Chunk, Depth, Outcome, SourceTier, VectorMatch, VectorRecord, point_id_for};
pub use error::{Error, Result};
pub use filter::{Predicate, SearchFilter};
pub use tenant::TenantId;
