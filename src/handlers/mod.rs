pub mod health;
pub mod two_factor;

pub use health::health_check;
pub use two_factor::{challenge_2fa, disable_2fa, setup_2fa, status_2fa, verify_2fa};
