pub mod user;
pub mod user_2fa;

pub use user::User;
pub use user_2fa::User2fa;
