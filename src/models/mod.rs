pub mod session;
pub mod user;

pub use session::{NewSession, SessionRecord};
pub use user::UserIdentity;
