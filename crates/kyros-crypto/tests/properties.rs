//! Property tests for the crypto primitives

use proptest::prelude::*;

use kyros_crypto::{Aead, password};

proptest! {
    // bcrypt at cost 12 is deliberately slow; a handful of cases is enough
    // to exercise the property without minutes of wall clock.
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn password_roundtrip_accepts_only_the_original(
        p in "[a-zA-Z0-9!@#]{1,24}",
        q in "[a-zA-Z0-9!@#]{1,24}",
    ) {
        let hashed = password::hash(&p).unwrap();
        prop_assert!(password::verify(&p, &hashed));
        if p != q {
            prop_assert!(!password::verify(&q, &hashed));
        }
    }
}

proptest! {
    #[test]
    fn aead_roundtrip(key in proptest::array::uniform32(any::<u8>()), pt in ".{0,256}") {
        let aead = Aead::new(&key).unwrap();
        let ct = aead.encrypt(&pt).unwrap();
        prop_assert_eq!(aead.decrypt(&ct).unwrap(), pt);
    }

    #[test]
    fn aead_ciphertexts_are_nondeterministic(
        key in proptest::array::uniform32(any::<u8>()),
        pt in ".{1,64}",
    ) {
        let aead = Aead::new(&key).unwrap();
        let a = aead.encrypt(&pt).unwrap();
        let b = aead.encrypt(&pt).unwrap();
        // Random nonces: the same plaintext never encrypts twice to the
        // same envelope.
        prop_assert_ne!(a, b);
    }

    #[test]
    fn aead_passthrough_is_identity_for_unmarked_values(value in "[^e].{0,64}") {
        let aead = Aead::disabled();
        prop_assert_eq!(aead.encrypt(&value).unwrap(), value.clone());
        prop_assert_eq!(aead.decrypt(&value).unwrap(), value);
    }
}
