//! # Fingerprint Tests
//!
//! Unit and property tests for tokenization, cosine similarity, and IDF
//! weighting.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::fingerprint::{cosine, tokenize, Fingerprint, IdfTable};

    #[test]
    fn tokenizer_lowercases_and_splits_on_non_alphanumerics() {
        let tokens: Vec<String> = tokenize("The QUICK brown-fox, jumps!! over 42nd").collect();
        assert_eq!(
            tokens,
            vec!["the", "quick", "brown", "fox", "jumps", "over", "42nd"]
        );
    }

    #[test]
    fn tokenizer_drops_short_tokens() {
        let tokens: Vec<String> = tokenize("I am at an old inn").collect();
        assert_eq!(tokens, vec!["old", "inn"]);
    }

    #[test]
    fn empty_text_yields_empty_fingerprint() {
        let fp = Fingerprint::from_text("a b c -- !!");
        assert!(fp.is_empty());
        assert_eq!(fp.len(), 0);
    }

    #[test]
    fn term_frequencies_are_counted() {
        let fp = Fingerprint::from_text("rain rain rain umbrella");
        assert!((fp.weight("rain") - 3.0).abs() < f64::EPSILON);
        assert!((fp.weight("umbrella") - 1.0).abs() < f64::EPSILON);
        assert!((fp.norm() - (10.0_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_identical_texts_is_one() {
        let a = Fingerprint::from_text("winter storm coming north");
        let b = Fingerprint::from_text("winter storm coming north");
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_disjoint_texts_is_zero() {
        let a = Fingerprint::from_text("winter storm");
        let b = Fingerprint::from_text("summer heat");
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_with_empty_side_is_zero() {
        let a = Fingerprint::from_text("winter storm");
        let empty = Fingerprint::empty();
        assert_eq!(cosine(&a, &empty), 0.0);
        assert_eq!(cosine(&empty, &a), 0.0);
        assert_eq!(cosine(&empty, &empty), 0.0);
    }

    #[test]
    fn idf_declined_below_two_documents() {
        let single = Fingerprint::from_text("lonely document");
        assert!(IdfTable::build([&single]).is_none());
        assert!(IdfTable::build(std::iter::empty::<&Fingerprint>()).is_none());
    }

    #[test]
    fn idf_uses_plus_one_smoothing() {
        let a = Fingerprint::from_text("shared alpha");
        let b = Fingerprint::from_text("shared beta");
        let idf = IdfTable::build([&a, &b]).unwrap();

        // df = 2 of n = 2: ln(3/3) = 0
        assert!((idf.weight("shared")).abs() < 1e-12);
        // df = 1 of n = 2: ln(3/2)
        assert!((idf.weight("alpha") - (3.0_f64 / 2.0).ln()).abs() < 1e-12);
        // never seen in the corpus
        assert_eq!(idf.weight("gamma"), 0.0);
    }

    #[test]
    fn reweight_drops_ubiquitous_and_unknown_tokens() {
        let a = Fingerprint::from_text("shared alpha");
        let b = Fingerprint::from_text("shared beta");
        let idf = IdfTable::build([&a, &b]).unwrap();

        let rip = Fingerprint::from_text("shared alpha novel");
        let weighted = rip.reweight(&idf);

        // "shared" idf is 0, "novel" never appeared in the corpus
        assert_eq!(weighted.weight("shared"), 0.0);
        assert_eq!(weighted.weight("novel"), 0.0);
        assert!(weighted.weight("alpha") > 0.0);
        assert_eq!(weighted.len(), 1);
    }

    #[test]
    fn reweight_to_nothing_is_the_empty_fingerprint() {
        let a = Fingerprint::from_text("shared common");
        let b = Fingerprint::from_text("shared common");
        let idf = IdfTable::build([&a, &b]).unwrap();

        let weighted = a.reweight(&idf);
        assert!(weighted.is_empty());
        assert_eq!(cosine(&weighted, &b), 0.0);
    }

    #[test]
    fn reweighting_from_raw_is_idempotent() {
        use crate::types::RipFingerprint;

        let r1 = Fingerprint::from_text("castle siege dawn");
        let r2 = Fingerprint::from_text("castle retreat dusk");
        let idf = IdfTable::build([&r1, &r2]).unwrap();

        let mut rip = RipFingerprint::new(
            "s01e01".to_string(),
            1,
            "t.srt".into(),
            "castle siege dawn retreat",
        );
        rip.apply_idf(&idf);
        let first = rip.vector.clone();
        rip.apply_idf(&idf);
        assert_eq!(rip.vector, first);
    }

    proptest! {
        #[test]
        fn cosine_is_symmetric_and_bounded(
            ta in "[a-f]{3,6}( [a-f]{3,6}){0,20}",
            tb in "[a-f]{3,6}( [a-f]{3,6}){0,20}",
        ) {
            let a = Fingerprint::from_text(&ta);
            let b = Fingerprint::from_text(&tb);
            let ab = cosine(&a, &b);
            let ba = cosine(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&ab));
        }

        #[test]
        fn from_weights_never_keeps_zero_entries(
            entries in proptest::collection::hash_map("[a-z]{3,8}", 0.0_f64..5.0, 0..16),
        ) {
            let fp = Fingerprint::from_weights(entries.clone());
            for (token, _) in fp.iter() {
                prop_assert!(fp.weight(token) > 0.0);
            }
        }
    }
}
