//! Database models split into domain-specific modules.

pub mod booking;
pub mod category;
pub mod review;
pub mod tutor;
pub mod user;

pub use booking::*;
pub use category::*;
pub use review::*;
pub use tutor::*;
pub use user::*;
