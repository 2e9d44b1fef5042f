use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

const DKLEN: usize = 32;
const SALT_BYTES: usize = 16;

/// Hash a password with PBKDF2-HMAC-SHA256, producing the same
/// `{alg}${iterations}${salt_hex}${b64_hash}` wire format the upstream
/// service's `password_hash` helper emits, so existing stored hashes remain
/// verifiable unchanged.
pub fn hash(algorithm: &str, iterations: u32, password: &str) -> String {
	let salt = random_salt_hex();
	hash_with_salt(algorithm, iterations, password, &salt)
}

fn hash_with_salt(algorithm: &str, iterations: u32, password: &str, salt_hex: &str) -> String {
	let digest = derive(password, salt_hex, iterations);
	format!("{algorithm}${iterations}${salt_hex}${}", BASE64.encode(digest))
}

fn derive(password: &str, salt_hex: &str, iterations: u32) -> [u8; DKLEN] {
	let iterations = NonZeroU32::new(iterations).unwrap_or(NonZeroU32::new(1).unwrap());
	let mut out = [0u8; DKLEN];
	pbkdf2::derive(
		pbkdf2::PBKDF2_HMAC_SHA256,
		iterations,
		salt_hex.as_bytes(),
		password.as_bytes(),
		&mut out,
	);
	out
}

fn random_salt_hex() -> String {
	let rng = SystemRandom::new();
	let mut bytes = [0u8; SALT_BYTES];
	rng.fill(&mut bytes).expect("system RNG is available");
	hex::encode(bytes)
}

/// Verify `password` against a stored hash. Any hash that does not split
/// into exactly four `$`-separated parts is treated as invalid, matching the
/// upstream service's `password_verify`, and comparison is constant-time.
pub fn verify(password: &str, stored: &str) -> bool {
	let parts: Vec<&str> = stored.split('$').collect();
	let [algorithm, iterations, salt, _hash] = parts.as_slice() else {
		return false;
	};
	let Ok(iterations) = iterations.parse::<u32>() else {
		return false;
	};
	let recomputed = hash_with_salt(algorithm, iterations, password, salt);
	ring::constant_time::verify_slices_are_equal(stored.as_bytes(), recomputed.as_bytes()).is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips() {
		let hashed = hash("pbkdf2_sha256", 1_000, "hunter2");
		assert!(verify("hunter2", &hashed));
		assert!(!verify("hunter3", &hashed));
	}

	#[test]
	fn matches_reference_vector() {
		// Fixed salt and iteration count must reproduce a deterministic digest.
		let hashed = hash_with_salt(
			"pbkdf2_sha256",
			60_000,
			"secret",
			"0123456789abcdef0123456789abcdef",
		);
		let parts: Vec<&str> = hashed.split('$').collect();
		assert_eq!(parts.len(), 4);
		assert_eq!(parts[0], "pbkdf2_sha256");
		assert_eq!(parts[1], "60000");
		assert_eq!(parts[2], "0123456789abcdef0123456789abcdef");
		assert!(verify("secret", &hashed));
	}

	#[test]
	fn rejects_malformed_hash() {
		assert!(!verify("secret", "not-a-valid-hash"));
		assert!(!verify("secret", "a$b$c$d$e"));
	}
}
