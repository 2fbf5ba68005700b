//! # cantina-auth
//!
//! Authentication building blocks shared by the back office, the point of
//! sale and the parent portal:
//!
//! - [`hasher`]: argon2id password hashing
//! - [`token`]: opaque bearer tokens and their lifetime
//! - [`principal`]: the authenticated caller and role checks
//! - [`throttle`]: login lockout after repeated failures
//! - [`signature`]: HMAC-SHA256 signatures of gateway webhooks

pub mod hasher;
pub mod principal;
pub mod signature;
pub mod throttle;
pub mod token;

pub use hasher::{Argon2Hasher, PasswordHasher};
pub use principal::Principal;
pub use throttle::LoginThrottle;
pub use token::SessionToken;
