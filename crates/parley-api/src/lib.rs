pub mod auth;
pub mod error;
pub mod groups;
pub mod members;
pub mod messages;
pub mod middleware;
pub mod topics;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ApiResult};
