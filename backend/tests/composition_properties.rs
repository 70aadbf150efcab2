//! Property tests for breed composition inheritance.

use std::collections::BTreeSet;

use chickerp::api::{BreedId, BreedShare};
use chickerp::models::{
    calculate_child_breed_composition, is_complete_composition, normalize_breed_percentages,
    total_percentage,
};
use proptest::prelude::*;

/// Whole-number composition summing to exactly 100 over breeds
/// `first_id..first_id + weights.len()`.
fn composition(first_id: i64, weights: &[u32]) -> Vec<BreedShare> {
    let sum: u32 = weights.iter().sum();
    let mut percentages: Vec<u32> = weights.iter().map(|w| w * 100 / sum).collect();
    let assigned: u32 = percentages.iter().sum();
    percentages[0] += 100 - assigned;
    percentages
        .into_iter()
        .enumerate()
        .filter(|(_, p)| *p > 0)
        .map(|(i, p)| BreedShare::new(BreedId(first_id + i as i64), p as f64))
        .collect()
}

fn weights() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=10, 1..=4)
}

fn breed_ids(shares: &[BreedShare]) -> BTreeSet<BreedId> {
    shares.iter().map(|s| s.breed_id).collect()
}

proptest! {
    #[test]
    fn complete_parents_give_complete_child(
        sire_w in weights(),
        dam_w in weights(),
        overlap in 0i64..4,
    ) {
        let sire = composition(1, &sire_w);
        let dam = composition(1 + overlap, &dam_w);
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));

        prop_assert!(is_complete_composition(&child), "total was {}", total_percentage(&child));
    }

    #[test]
    fn child_breeds_are_the_union_of_parent_breeds(
        sire_w in weights(),
        dam_w in weights(),
        overlap in 0i64..4,
    ) {
        let sire = composition(1, &sire_w);
        let dam = composition(1 + overlap, &dam_w);
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));

        let expected: BTreeSet<BreedId> =
            breed_ids(&sire).union(&breed_ids(&dam)).copied().collect();
        prop_assert_eq!(breed_ids(&child), expected);
        prop_assert_eq!(child.len(), breed_ids(&child).len());
    }

    #[test]
    fn child_shares_are_sorted_descending(sire_w in weights(), dam_w in weights()) {
        let sire = composition(1, &sire_w);
        let dam = composition(10, &dam_w);
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));

        for pair in child.windows(2) {
            prop_assert!(pair[0].percentage >= pair[1].percentage);
        }
        for share in &child {
            prop_assert!(share.percentage > 0.0 && share.percentage <= 100.0);
        }
    }

    #[test]
    fn single_parent_passes_on_half(parent_w in weights(), use_sire in any::<bool>()) {
        let parent = composition(1, &parent_w);
        let child = if use_sire {
            calculate_child_breed_composition(Some(&parent), None)
        } else {
            calculate_child_breed_composition(None, Some(&parent))
        };

        prop_assert_eq!(child.len(), parent.len());
        prop_assert!((total_percentage(&child) - 50.0).abs() < 1e-9);
        for (c, p) in child.iter().zip(&parent) {
            prop_assert_eq!(c.breed_id, p.breed_id);
            prop_assert!((c.percentage - p.percentage / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn blending_is_symmetric_in_content(
        sire_w in weights(),
        dam_w in weights(),
        overlap in 0i64..4,
    ) {
        let a = composition(1, &sire_w);
        let b = composition(1 + overlap, &dam_w);
        let ab = calculate_child_breed_composition(Some(&a), Some(&b));
        let ba = calculate_child_breed_composition(Some(&b), Some(&a));

        for share in &ab {
            let other = ba.iter().find(|s| s.breed_id == share.breed_id);
            prop_assert!(other.is_some());
            prop_assert!((other.unwrap().percentage - share.percentage).abs() < 1e-9);
        }
    }

    #[test]
    fn normalization_sums_to_one_hundred(raw in prop::collection::vec(0.5f64..80.0, 1..=6)) {
        let shares: Vec<BreedShare> = raw
            .iter()
            .enumerate()
            .map(|(i, p)| BreedShare::new(BreedId(i as i64 + 1), *p))
            .collect();
        let normalized = normalize_breed_percentages(&shares);

        prop_assert_eq!(normalized.len(), shares.len());
        prop_assert!(
            is_complete_composition(&normalized),
            "total was {}",
            total_percentage(&normalized)
        );

    }
}

#[test]
fn pure_bred_parents_give_pure_bred_chick() {
    let silkie = [BreedShare::new(BreedId(7), 100.0)];
    let child = calculate_child_breed_composition(Some(&silkie), Some(&silkie));
    assert_eq!(child, vec![BreedShare::new(BreedId(7), 100.0)]);
}

#[test]
fn no_parent_data_gives_empty_composition() {
    assert!(calculate_child_breed_composition(None, None).is_empty());
    assert!(calculate_child_breed_composition(Some(&[]), Some(&[])).is_empty());
}

#[test]
fn normalizing_nothing_gives_nothing() {
    assert!(normalize_breed_percentages(&[]).is_empty());
    assert!(normalize_breed_percentages(&[BreedShare::new(BreedId(1), 0.0)]).is_empty());
}
