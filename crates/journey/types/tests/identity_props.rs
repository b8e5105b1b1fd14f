//! Property tests: instance identity tokens are stable across links.

use journey_types::{JourneyInstanceId, UNIQUE_KEY};
use proptest::prelude::*;

/// Journey names as they appear in practice, plus a few awkward characters.
fn arb_journey_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9-]{0,20}",
        "[A-Za-z ?&=%+/]{1,12}",
    ]
}

/// Distinct key/value pairs with arbitrary printable values.
fn arb_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9_]{0,10}", "[ -~]{1,16}", 0..6)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    /// Parsing the canonical token gives back an equal identity.
    #[test]
    fn token_round_trip(name in arb_journey_name(), pairs in arb_pairs(), token in "[0-9a-f]{32}") {
        let mut id = JourneyInstanceId::new(name);
        for (k, v) in &pairs {
            id.insert(k.clone(), v.clone());
        }
        id.insert(UNIQUE_KEY, token);

        let parsed = JourneyInstanceId::parse(&id.to_token()).unwrap();
        prop_assert_eq!(&parsed, &id);
        prop_assert_eq!(parsed.to_token(), id.to_token());
    }

    /// Insertion order never changes equality or the storage key.
    #[test]
    fn equality_is_order_independent(pairs in arb_pairs()) {
        let mut forward = JourneyInstanceId::new("j");
        for (k, v) in &pairs {
            forward.insert(k.clone(), v.clone());
        }
        let mut reverse = JourneyInstanceId::new("j");
        for (k, v) in pairs.iter().rev() {
            reverse.insert(k.clone(), v.clone());
        }

        prop_assert_eq!(&forward, &reverse);
        prop_assert_eq!(forward.storage_key(), reverse.storage_key());
    }
}
