use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is mandatory")]
    Config(&'static str),
    #[error("error while querying Nuki API (status: {status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("couldn't send request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("couldn't decode response: {0}")]
    Decode(#[from] serde_json::Error),
}
pub type ApiResult<T> = std::result::Result<T, ApiError>;
