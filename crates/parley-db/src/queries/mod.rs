//! Query methods on [`Database`](crate::Database), grouped per entity.

mod groups;
mod members;
mod messages;
mod topics;
mod users;

pub use groups::MAX_SLUG_ATTEMPTS;
