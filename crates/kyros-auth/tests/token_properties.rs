//! Property tests for the token codec

use std::time::Duration;

use proptest::prelude::*;
use uuid::Uuid;

use kyros_auth::{AuthError, TokenCodec, TokenKind};

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(fut)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn minted_access_tokens_verify_with_matching_claims(
        email in "[a-z]{1,12}@[a-z]{1,8}\\.(io|dev|com)",
        ttl_secs in 1u64..86_400,
    ) {
        let codec = TokenCodec::new("property-test-secret-0123456789ab", false);
        let user_id = Uuid::new_v4();

        let token = codec
            .mint(TokenKind::Access, user_id, &email, Duration::from_secs(ttl_secs))
            .unwrap();
        let claims = block_on(codec.verify(&token, TokenKind::Access)).unwrap();

        prop_assert_eq!(claims.sub, user_id);
        prop_assert_eq!(claims.email, email);
        prop_assert_eq!(claims.kind, TokenKind::Access);
        prop_assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_kinds_never_cross(
        email in "[a-z]{1,12}@x\\.io",
        mint_access in any::<bool>(),
    ) {
        let codec = TokenCodec::new("property-test-secret-0123456789ab", false);
        let (mint_kind, verify_kind) = if mint_access {
            (TokenKind::Access, TokenKind::Refresh)
        } else {
            (TokenKind::Refresh, TokenKind::Access)
        };

        let token = codec
            .mint(mint_kind, Uuid::new_v4(), &email, Duration::from_secs(900))
            .unwrap();
        let result = block_on(codec.verify(&token, verify_kind));

        prop_assert!(
            matches!(result, Err(AuthError::WrongTokenKind { .. })),
            "expected WrongTokenKind error"
        );
    }
}
