pub mod auth;
pub mod group;
pub mod user;

pub use auth::*;
pub use group::*;
pub use user::*;
