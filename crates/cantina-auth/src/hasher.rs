use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
	PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use cantina_core::{Error, Result};

/// Password hasher trait
///
/// # Examples
///
/// ```
/// use cantina_auth::{Argon2Hasher, PasswordHasher};
///
/// let hasher = Argon2Hasher::new();
/// let hash = hasher.hash("caja-secreta").unwrap();
///
/// assert!(hasher.verify("caja-secreta", &hash).unwrap());
/// assert!(!hasher.verify("otra", &hash).unwrap());
/// ```
pub trait PasswordHasher: Send + Sync {
	/// Hashes a password into a PHC string.
	fn hash(&self, password: &str) -> Result<String>;

	/// `Ok(false)` on a mismatch; `Err` only when `hash` is not a valid
	/// PHC string.
	fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id password hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
	pub fn new() -> Self {
		Self
	}
}

impl PasswordHasher for Argon2Hasher {
	fn hash(&self, password: &str) -> Result<String> {
		let salt = SaltString::generate(&mut OsRng);

		Argon2::default()
			.hash_password(password.as_bytes(), &salt)
			.map(|hash| hash.to_string())
			.map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
	}

	fn verify(&self, password: &str, hash: &str) -> Result<bool> {
		let parsed_hash = PasswordHash::new(hash)
			.map_err(|e| Error::Internal(format!("Stored password hash is invalid: {}", e)))?;

		Ok(Argon2::default()
			.verify_password(password.as_bytes(), &parsed_hash)
			.is_ok())
	}
}

/// Minimum password length accepted for employees and guardians.
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn validate_password(password: &str) -> Result<()> {
	if password.chars().count() < MIN_PASSWORD_LENGTH {
		return Err(Error::Validation(format!(
			"Password must be at least {} characters",
			MIN_PASSWORD_LENGTH
		)));
	}
	Ok(())
}
