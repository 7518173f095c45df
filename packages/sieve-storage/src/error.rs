#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Failed to decode catalog row {id}: {message}")]
	Decode { id: String, message: String },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
