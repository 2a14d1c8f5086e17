pub mod hooks;
pub mod model;
pub mod service;
pub mod validation;

pub use model::{AuthToken, NewUser, PublicUser, User, UserField};
pub use service::Accounts;
