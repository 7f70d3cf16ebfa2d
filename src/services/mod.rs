pub mod base32;
pub mod payload;
pub mod totp;

pub use payload::PayloadCodec;
pub use totp::TotpService;
