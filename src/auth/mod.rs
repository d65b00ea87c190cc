//! Token issuance, password hashing and reset codes.

mod jwt;
mod otp;
mod password;

pub use jwt::{Claims, TokenIssuer};
pub use otp::generate_reset_code;
pub use password::{hash_password, verify_password};
