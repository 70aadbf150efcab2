//! Breed composition inheritance.
//!
//! A bird's breed composition is a percentage breakdown of its ancestry
//! across breeds. Compositions are blended 50/50 from the sire and dam.
//! Percentages are expected to sum to 100 but this is not enforced: partial
//! pedigrees are stored as entered and only flagged through
//! [`is_complete_composition`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::api::BreedId;

/// Tolerance used when deciding whether a composition adds up to 100.
pub const COMPLETE_TOLERANCE: f64 = 0.05;

/// One breed's share of a bird's ancestry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreedShare {
    pub breed_id: BreedId,
    pub percentage: f64,
}

impl BreedShare {
    pub fn new(breed_id: impl Into<BreedId>, percentage: f64) -> Self {
        Self {
            breed_id: breed_id.into(),
            percentage,
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn by_percentage_desc(a: &BreedShare, b: &BreedShare) -> Ordering {
    b.percentage
        .partial_cmp(&a.percentage)
        .unwrap_or(Ordering::Equal)
}

/// Compute a chick's composition from its parents' compositions.
///
/// - no data on either side: empty
/// - one parent only: that parent's shares halved, in the parent's order
/// - both parents: each breed receives `percentage / 100 * 50` from each side;
///   breeds with a zero total are dropped and the result is sorted by
///   percentage descending (ties keep first appearance, sire first)
///
/// All percentages are rounded to one decimal place.
pub fn calculate_child_breed_composition(
    sire: Option<&[BreedShare]>,
    dam: Option<&[BreedShare]>,
) -> Vec<BreedShare> {
    let sire = sire.filter(|shares| !shares.is_empty());
    let dam = dam.filter(|shares| !shares.is_empty());

    match (sire, dam) {
        (None, None) => Vec::new(),
        (Some(parent), None) | (None, Some(parent)) => parent
            .iter()
            .map(|share| BreedShare {
                breed_id: share.breed_id,
                percentage: round_one_decimal(share.percentage * 0.5),
            })
            .collect(),
        (Some(sire), Some(dam)) => {
            let mut blended: Vec<BreedShare> = Vec::with_capacity(sire.len() + dam.len());
            for share in sire.iter().chain(dam.iter()) {
                let contribution = share.percentage / 100.0 * 50.0;
                match blended.iter_mut().find(|b| b.breed_id == share.breed_id) {
                    Some(existing) => existing.percentage += contribution,
                    None => blended.push(BreedShare {
                        breed_id: share.breed_id,
                        percentage: contribution,
                    }),
                }
            }

            blended.retain(|share| share.percentage != 0.0);
            for share in &mut blended {
                share.percentage = round_one_decimal(share.percentage);
            }
            blended.sort_by(by_percentage_desc);
            blended
        }
    }
}

/// Sum of all shares.
pub fn total_percentage(shares: &[BreedShare]) -> f64 {
    shares.iter().map(|share| share.percentage).sum()
}

/// Whether the composition adds up to 100 within [`COMPLETE_TOLERANCE`].
pub fn is_complete_composition(shares: &[BreedShare]) -> bool {
    (total_percentage(shares) - 100.0).abs() <= COMPLETE_TOLERANCE
}

/// Rescale shares so they sum to 100.
///
/// Returns an empty list when the total is not positive. Shares are rounded
/// to one decimal and the rounding residual is added to the largest share.
pub fn normalize_breed_percentages(shares: &[BreedShare]) -> Vec<BreedShare> {
    let total = total_percentage(shares);
    if total <= 0.0 || !total.is_finite() {
        return Vec::new();
    }

    let mut normalized: Vec<BreedShare> = shares
        .iter()
        .map(|share| BreedShare {
            breed_id: share.breed_id,
            percentage: round_one_decimal(share.percentage / total * 100.0),
        })
        .collect();

    let residual = 100.0 - total_percentage(&normalized);
    if residual != 0.0 {
        let mut largest = 0;
        for (idx, share) in normalized.iter().enumerate() {
            if share.percentage > normalized[largest].percentage {
                largest = idx;
            }
        }
        normalized[largest].percentage =
            round_one_decimal(normalized[largest].percentage + residual);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(id: i64, pct: f64) -> BreedShare {
        BreedShare::new(id, pct)
    }

    #[test]
    fn test_no_parents_yields_empty() {
        assert!(calculate_child_breed_composition(None, None).is_empty());
        assert!(calculate_child_breed_composition(Some(&[]), Some(&[])).is_empty());
    }

    #[test]
    fn test_single_parent_is_halved() {
        let sire = [share(1, 100.0)];
        let child = calculate_child_breed_composition(Some(&sire), None);
        assert_eq!(child, vec![share(1, 50.0)]);

        let dam = [share(2, 75.0), share(3, 25.0)];
        let child = calculate_child_breed_composition(None, Some(&dam));
        assert_eq!(child, vec![share(2, 37.5), share(3, 12.5)]);
    }

    #[test]
    fn test_single_parent_rounds_to_one_decimal() {
        let dam = [share(4, 12.34)];
        let child = calculate_child_breed_composition(None, Some(&dam));
        assert_eq!(child, vec![share(4, 6.2)]);
    }

    #[test]
    fn test_two_purebred_parents() {
        let sire = [share(1, 100.0)];
        let dam = [share(2, 100.0)];
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));
        assert_eq!(child, vec![share(1, 50.0), share(2, 50.0)]);
    }

    #[test]
    fn test_symmetric_parents_are_idempotent() {
        let parent = [share(1, 50.0), share(2, 50.0)];
        let child = calculate_child_breed_composition(Some(&parent), Some(&parent));
        assert_eq!(child, vec![share(1, 50.0), share(2, 50.0)]);
    }

    #[test]
    fn test_blend_sorted_descending() {
        let sire = [share(1, 25.0), share(2, 75.0)];
        let dam = [share(2, 50.0), share(3, 50.0)];
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));
        assert_eq!(child, vec![share(2, 62.5), share(3, 25.0), share(1, 12.5)]);
    }

    #[test]
    fn test_zero_contributions_dropped() {
        let sire = [share(1, 100.0), share(9, 0.0)];
        let dam = [share(2, 100.0)];
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));
        assert!(child.iter().all(|s| s.breed_id != BreedId(9)));
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn test_partial_pedigree_is_carried_through() {
        let sire = [share(1, 60.0)];
        let dam = [share(2, 100.0)];
        let child = calculate_child_breed_composition(Some(&sire), Some(&dam));
        assert_eq!(child, vec![share(2, 50.0), share(1, 30.0)]);
        assert!(!is_complete_composition(&child));
    }

    #[test]
    fn test_total_percentage() {
        assert_eq!(total_percentage(&[]), 0.0);
        assert_eq!(total_percentage(&[share(1, 40.0), share(2, 35.5)]), 75.5);
    }

    #[test]
    fn test_normalize_empty_and_zero_total() {
        assert!(normalize_breed_percentages(&[]).is_empty());
        assert!(normalize_breed_percentages(&[share(1, 0.0), share(2, 0.0)]).is_empty());
    }

    #[test]
    fn test_normalize_rescales_to_hundred() {
        let normalized = normalize_breed_percentages(&[share(1, 30.0), share(2, 10.0)]);
        assert_eq!(normalized, vec![share(1, 75.0), share(2, 25.0)]);
    }

    #[test]
    fn test_normalize_assigns_residual_to_largest() {
        let normalized =
            normalize_breed_percentages(&[share(1, 1.0), share(2, 1.0), share(3, 1.0)]);
        assert!((total_percentage(&normalized) - 100.0).abs() < 1e-9);
        assert_eq!(normalized[0].percentage, 33.4);
        assert_eq!(normalized[1].percentage, 33.3);
    }
}
