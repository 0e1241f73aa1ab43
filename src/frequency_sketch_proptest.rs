#![cfg(test)]

// Property tests for FrequencySketch kept inside the crate so they can read
// the counter mass without widening the public API.

use crate::frequency_sketch::FrequencySketch;
use proptest::prelude::*;
use std::collections::HashMap;

// Property: without an intervening aging pass, every estimate stays within
// [0, 15], never falls below min(true count, 15), and never decreases.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_estimates_bounded_and_monotone(ops in proptest::collection::vec(0u16..40, 1..200)) {
        let mut sut = FrequencySketch::new();
        // 256 words -> sample size 2560, well above the op count.
        sut.ensure_capacity(256);
        let mut model: HashMap<u16, u32> = HashMap::new();
        let mut last: HashMap<u16, u32> = HashMap::new();

        for e in ops {
            sut.increment(&e);
            *model.entry(e).or_insert(0) += 1;

            for (k, truth) in model.iter() {
                let f = sut.frequency(k);
                prop_assert!(f <= 15);
                prop_assert!(f >= (*truth).min(15), "count-min under-estimated {}", k);
                let prev = last.insert(*k, f).unwrap_or(0);
                prop_assert!(f >= prev, "estimate for {} decreased", k);
            }
        }
        prop_assert!(sut.size() < sut.sample_size());
    }
}

// Property: across aging passes on a tiny table, `size` stays below the
// sample size, estimates stay within [0, 15], and each aging pass at least
// halves the counter mass (allowing for the increment that triggered it).
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_aging_halves_mass(capacity in 1u64..=8, ops in proptest::collection::vec(any::<u32>(), 1..600)) {
        let mut sut = FrequencySketch::new();
        sut.ensure_capacity(capacity);

        for e in ops {
            let size_before = sut.size();
            let mass_before = sut.counter_sum();
            sut.increment(&e);

            prop_assert!(sut.size() < sut.sample_size());
            prop_assert!(sut.frequency(&e) <= 15);
            if sut.size() < size_before {
                prop_assert_eq!(size_before + 1, sut.sample_size());
                prop_assert!(2 * sut.counter_sum() <= mass_before + 4);
            } else {
                prop_assert!(sut.counter_sum() >= mass_before);
            }
        }
    }
}
