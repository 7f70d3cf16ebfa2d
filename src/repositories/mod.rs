pub mod user;
pub mod user_2fa;

pub use user::UserRepository;
pub use user_2fa::User2faRepository;
