//! Property tests for candidate verdicts.
//!
//! The revision 3 early-exit check must never change a verdict, and the
//! generated password must always be the only match among alphanumeric
//! candidates.

use pdf_recover::{EncryptionParameters, PermutationKind, Session};
use proptest::prelude::*;

const CASES: u32 = 64;

fn password() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![b'a'..=b'z', b'A'..=b'Z', b'0'..=b'9'],
        1..=32,
    )
}

fn key_bits() -> impl Strategy<Value = u32> {
    (5u32..=16).prop_map(|bytes| bytes * 8)
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: CASES,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn partial_check_agrees_with_full_check_for_user(
        user in password(),
        candidate in password(),
        bits in key_bits(),
        id in proptest::collection::vec(any::<u8>(), 0..24),
    ) {
        let params = EncryptionParameters::synthesize(b"owner", &user, 3, bits, -4, &id);
        let mut fast = Session::begin(&params, None, true, PermutationKind::None).unwrap();
        let mut full = Session::begin(&params, None, true, PermutationKind::None)
            .unwrap()
            .with_partial_check(false);

        prop_assert_eq!(fast.test(&candidate), full.test(&candidate));
        prop_assert!(fast.test(&user));
        prop_assert!(full.test(&user));
    }

    #[test]
    fn partial_check_agrees_with_full_check_for_owner(
        owner in password(),
        user in password(),
        candidate in password(),
        bits in key_bits(),
    ) {
        let params = EncryptionParameters::synthesize(&owner, &user, 3, bits, -1340, b"prop-id");
        let mut fast = Session::begin(&params, None, false, PermutationKind::None).unwrap();
        let mut full = Session::begin(&params, None, false, PermutationKind::None)
            .unwrap()
            .with_partial_check(false);

        prop_assert_eq!(fast.test(&candidate), full.test(&candidate));
        prop_assert!(fast.test(&owner));
        prop_assert_eq!(fast.recovered_user_password(), Some(user.clone()));
    }

    #[test]
    fn only_the_password_matches(
        user in password(),
        candidate in password(),
        revision in 2u32..=3,
    ) {
        prop_assume!(candidate != user);
        let params = EncryptionParameters::synthesize(b"o", &user, revision, 128, -4, b"id");
        let mut session = Session::begin(&params, None, true, PermutationKind::None).unwrap();

        prop_assert!(!session.test(&candidate));
        prop_assert!(session.test(&user));
    }

    #[test]
    fn owner_given_user_matches_only_owner(
        owner in password(),
        user in password(),
        candidate in password(),
    ) {
        prop_assume!(candidate != owner);
        let params = EncryptionParameters::synthesize(&owner, &user, 3, 128, -4, b"given");
        let mut session =
            Session::begin(&params, Some(&user[..]), false, PermutationKind::None).unwrap();

        prop_assert!(!session.test(&candidate));
        prop_assert!(session.test(&owner));
    }
}
