pub mod index;
pub mod qdrant;

mod error;

pub use error::Error;
pub use index::{BoxFuture, VectorIndex, clamp_top_k};
pub use rfp_config::MAX_TOP_K;

pub type Result<T, E = Error> = std::result::Result<T, E>;
