pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Catalog unavailable: {message}")]
	CatalogUnavailable { message: String },
}
impl From<sieve_domain::Error> for Error {
	fn from(err: sieve_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<sieve_storage::Error> for Error {
	fn from(err: sieve_storage::Error) -> Self {
		match err {
			sieve_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::CatalogUnavailable { message: other.to_string() },
		}
	}
}

impl From<sieve_providers::Error> for Error {
	fn from(err: sieve_providers::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
