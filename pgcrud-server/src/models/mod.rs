//! Request models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod item;
pub mod pagination;
pub mod user;
pub mod validation;

pub use item::NewItem;
pub use pagination::{Window, WindowParams};
pub use user::{Email, NewUser, UserName};
pub use validation::ValidationError;
