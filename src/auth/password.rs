pub use bcrypt::BcryptError;

/// bcrypt hash at `cost`; the salt and cost travel inside the stored string.
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(password, stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Lowest cost bcrypt accepts; keeps the suite fast.
    const COST: u32 = 4;

    #[test]
    fn verifies_matching_password() {
        let stored = hash_password("correct horse", COST).unwrap();
        assert!(verify_password("correct horse", &stored).unwrap());
        assert!(!verify_password("wrong horse", &stored).unwrap());
    }

    #[test]
    fn stored_value_is_a_bcrypt_hash() {
        let stored = hash_password("correct horse", COST).unwrap();
        assert!(stored.starts_with("$2"), "{stored}");
        assert!(!stored.contains("correct horse"));
    }

    #[test]
    fn salts_differ_per_hash() {
        assert_ne!(hash_password("same", COST).unwrap(), hash_password("same", COST).unwrap());
    }

    #[test]
    fn cost_is_recorded_in_the_hash() {
        let stored = hash_password("x", 5).unwrap();
        assert!(stored.starts_with("$2b$05$"), "{stored}");
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "no-separator").is_err());
    }
}
