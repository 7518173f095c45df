#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid criteria: {message}")]
	InvalidCriteria { message: String },
	#[error("Invalid unit value {raw:?}.")]
	InvalidUnitValue { raw: String },
}
