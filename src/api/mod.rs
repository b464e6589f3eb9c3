mod client;
pub use client::{Client, ClientOptions, DEFAULT_BASE_URL};

mod error;
pub use error::{ApiError, ApiResult};

mod model;
pub use model::*;

mod traits;
pub use traits::*;
