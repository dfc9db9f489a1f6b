pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid tenant id: {message}")]
	InvalidTenant { message: String },
	#[error("Invalid chunk {document_id}#{chunk_index}: {message}")]
	InvalidChunk { document_id: String, chunk_index: u32, message: String },
	#[error("Unknown {kind}: {value}.")]
	UnknownVariant { kind: &'static str, value: String },
}
