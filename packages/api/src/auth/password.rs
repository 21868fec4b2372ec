//! # Password hashing for the local fallback admin — Argon2id
//!
//! The fallback admin's credentials live in configuration as an email plus a
//! PHC-format hash (`$argon2id$v=19$m=19456,t=2,p=1$...`), never as plaintext.
//!
//! - [`hash_password`] produces such a hash with a fresh [`OsRng`] salt and the default
//!   Argon2id parameters. Use it once to generate the `local_admin.password_hash` value.
//! - [`verify_password`] checks a candidate password against a stored hash. A mismatch
//!   is `Ok(false)`; only a malformed hash is an error.

use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};

/// Hash `password` into a PHC-format Argon2id string.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check `password` against a PHC-format hash.
pub fn verify_password(password: &str, phc_hash: &str) -> Result<bool, password_hash::Error> {
    let parsed = PasswordHash::new(phc_hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
