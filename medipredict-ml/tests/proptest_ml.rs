//! Property-based tests for voting and label encoding.

use proptest::prelude::*;

use medipredict_ml::{LabelCodec, majority_vote};

// --- Plurality vote properties ---

proptest! {
    #[test]
    fn two_agreeing_votes_decide(agreed in 0usize..50, other in 0usize..50, position in 0usize..3) {
        let mut votes = vec![agreed, agreed];
        votes.insert(position.min(2), other);
        prop_assert_eq!(majority_vote(&votes), Some(agreed));
    }

    #[test]
    fn pairwise_disagreement_picks_smallest(a in 0usize..50, b in 0usize..50, c in 0usize..50) {
        prop_assume!(a != b && b != c && a != c);
        let smallest = a.min(b).min(c);
        prop_assert_eq!(majority_vote(&[a, b, c]), Some(smallest));
    }

    #[test]
    fn winner_is_always_one_of_the_votes(votes in prop::collection::vec(0usize..20, 1..12)) {
        let winner = majority_vote(&votes).unwrap();
        prop_assert!(votes.contains(&winner));
        let count = |v: usize| votes.iter().filter(|&&x| x == v).count();
        prop_assert!(votes.iter().all(|&v| count(v) <= count(winner)));
    }
}

// --- Label codec properties ---

proptest! {
    #[test]
    fn codec_roundtrips_every_label(labels in prop::collection::vec("[A-Za-z ]{1,20}", 1..30)) {
        let codec = LabelCodec::fit(&labels).unwrap();
        for label in &labels {
            let index = codec.encode(label).unwrap();
            prop_assert!(index < codec.len());
            prop_assert_eq!(codec.decode(index).unwrap(), label.as_str());
        }
    }

    #[test]
    fn codec_indices_follow_sorted_order(labels in prop::collection::vec("[a-z]{1,8}", 2..30)) {
        let codec = LabelCodec::fit(&labels).unwrap();
        prop_assert!(codec.validate().is_ok());
        for pair in codec.classes().windows(2) {
            prop_assert!(codec.encode(&pair[0]).unwrap() < codec.encode(&pair[1]).unwrap());
        }
    }

    #[test]
    fn codec_rejects_out_of_range(labels in prop::collection::vec("[a-z]{1,8}", 1..10), extra in 0usize..5) {
        let codec = LabelCodec::fit(&labels).unwrap();
        prop_assert!(codec.decode(codec.len() + extra).is_err());
    }
}
