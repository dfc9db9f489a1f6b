pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Embedding failure: {message}")]
	EmbeddingFailure { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Encoding error: {message}")]
	Encoding { message: String },
	#[error("Retrieval deadline exceeded.")]
	DeadlineExceeded,
}
impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Encoding { message: err.to_string() }
	}
}

impl From<rfp_storage::Error> for Error {
	fn from(err: rfp_storage::Error) -> Self {
		match err {
			rfp_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<rfp_domain::Error> for Error {
	fn from(err: rfp_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<rfp_providers::Error> for Error {
	fn from(err: rfp_providers::Error) -> Self {
		Self::EmbeddingFailure { message: err.to_string() }
	}
}
