pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Service unavailable: {message}")]
	ServiceUnavailable { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<hrag_storage::Error> for Error {
	fn from(err: hrag_storage::Error) -> Self {
		match err {
			hrag_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			hrag_storage::Error::SerdeJson(inner) => Self::Storage { message: inner.to_string() },
			hrag_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			hrag_storage::Error::NotFound(message) => Self::NotFound { message },
			hrag_storage::Error::Qdrant(inner) =>
				Self::ServiceUnavailable { message: inner.to_string() },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
