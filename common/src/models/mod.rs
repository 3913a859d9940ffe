pub mod asset;
pub mod session;
pub mod user;

pub use asset::*;
pub use user::*;
