//! Fair-split allocation engine
//!
//! Splits a bill total across participants in proportion to a per-person
//! ratio derived from their tags:
//!
//! ```text
//! raw_ratio = 1.0 + sum(weight_of(tag))
//! ratio     = max(raw_ratio, ratio_floor)
//! share     = ratio / sum(ratio) * total
//! ```
//!
//! `adjustment` is reported against the naive equal split `total / n`.
//! The computation is a pure function of its inputs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SplitParams;
use crate::error::{Error, Result};
use crate::roster::Participant;
use crate::weights::WeightTable;

/// A tag's contribution to one participant's ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagContribution {
    pub tag: String,
    pub weight: f64,
    pub predefined: bool,
}

/// Computed allocation for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub name: String,
    pub color: String,
    pub tags: Vec<TagContribution>,
    pub raw_ratio: f64,
    pub ratio: f64,
    /// True when the floor replaced a lower raw ratio
    pub clamped: bool,
    pub share: f64,
    pub adjustment: f64,
    /// Share as a percentage of the total
    pub percent: f64,
}

/// Result of one split computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitResult {
    pub total: f64,
    pub base_share: f64,
    pub total_ratio: f64,
    pub participants: Vec<Allocation>,
}

impl SplitResult {
    pub fn get(&self, id: &str) -> Option<&Allocation> {
        self.participants.iter().find(|a| a.id == id)
    }

    /// Sum of all shares (equal to `total` up to float error)
    pub fn allocated(&self) -> f64 {
        self.participants.iter().map(|a| a.share).sum()
    }

    /// Equal-split percentage, the reference point for tag adjustments
    pub fn base_percent(&self) -> f64 {
        if self.participants.is_empty() {
            0.0
        } else {
            100.0 / self.participants.len() as f64
        }
    }
}

/// Split `total` across `participants`.
///
/// Fails with [`Error::EmptyRoster`] when there is nobody to split across and
/// with [`Error::InvalidData`] for a negative or non-finite total. Parameters
/// that fail [`SplitParams::validate`] are rejected before any share is
/// computed.
pub fn compute_split(
    total: f64,
    participants: &[Participant],
    weights: &WeightTable,
    params: &SplitParams,
) -> Result<SplitResult> {
    params.validate()?;
    if participants.is_empty() {
        return Err(Error::EmptyRoster);
    }
    if !total.is_finite() || total < 0.0 {
        return Err(Error::InvalidData(format!(
            "Bill total must be a non-negative amount, got {}",
            total
        )));
    }

    let n = participants.len() as f64;
    let base_share = total / n;

    let staged: Vec<(Vec<TagContribution>, f64, f64)> = participants
        .iter()
        .map(|p| {
            let tags: Vec<TagContribution> = p
                .tags
                .iter()
                .map(|tag| TagContribution {
                    tag: tag.clone(),
                    weight: weights.weight_of(tag),
                    predefined: weights.is_predefined(tag),
                })
                .collect();
            let raw_ratio = 1.0 + tags.iter().map(|t| t.weight).sum::<f64>();
            let ratio = raw_ratio.max(params.ratio_floor);
            (tags, raw_ratio, ratio)
        })
        .collect();

    let total_ratio: f64 = staged.iter().map(|(_, _, ratio)| ratio).sum();

    let allocations = participants
        .iter()
        .zip(staged)
        .map(|(p, (tags, raw_ratio, ratio))| {
            let share = ratio / total_ratio * total;
            let percent = if total > 0.0 {
                share / total * 100.0
            } else {
                0.0
            };
            Allocation {
                id: p.id.clone(),
                name: p.name.clone(),
                color: p.color.clone(),
                tags,
                raw_ratio,
                ratio,
                clamped: raw_ratio < params.ratio_floor,
                share,
                adjustment: share - base_share,
                percent,
            }
        })
        .collect();

    debug!(
        participants = participants.len(),
        total, total_ratio, "Computed bill split"
    );

    Ok(SplitResult {
        total,
        base_share,
        total_ratio,
        participants: allocations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagWeight;

    const EPSILON: f64 = 1e-6;

    fn person(id: &str, tags: &[&str]) -> Participant {
        Participant::new(id, format!("P{}", id), "#000000").with_tags(tags.iter().copied())
    }

    fn round2(v: f64) -> f64 {
        (v * 100.0).round() / 100.0
    }

    #[test]
    fn test_gaming_pc_scenario() {
        let people = vec![person("1", &["Gaming PC"]), person("2", &[])];
        let result =
            compute_split(300.0, &people, &WeightTable::default(), &SplitParams::default())
                .unwrap();

        let p1 = result.get("1").unwrap();
        let p2 = result.get("2").unwrap();
        assert!((p1.raw_ratio - 1.3).abs() < EPSILON);
        assert!((p2.raw_ratio - 1.0).abs() < EPSILON);
        assert!((result.total_ratio - 2.3).abs() < EPSILON);
        assert_eq!(round2(p1.share), 169.57);
        assert_eq!(round2(p2.share), 130.43);
        assert!((result.allocated() - 300.0).abs() < EPSILON);
        assert_eq!(result.base_share, 150.0);
        assert!((p1.adjustment - (p1.share - 150.0)).abs() < EPSILON);
    }

    #[test]
    fn test_floor_scenario() {
        let weights = WeightTable::new(
            vec![TagWeight {
                name: "Solar Panels".to_string(),
                weight: -1.5,
            }],
            0.1,
        );
        let people = vec![
            person("1", &["Solar Panels"]),
            person("2", &[]),
            person("3", &[]),
        ];
        let result = compute_split(300.0, &people, &weights, &SplitParams::default()).unwrap();

        let clamped = result.get("1").unwrap();
        assert!((clamped.raw_ratio - -0.5).abs() < EPSILON);
        assert_eq!(clamped.ratio, 0.2);
        assert!(clamped.clamped);
        assert!((result.total_ratio - 2.2).abs() < EPSILON);
        assert_eq!(round2(clamped.share), 27.27);
        assert!(!result.get("2").unwrap().clamped);
    }

    #[test]
    fn test_no_tags_is_equal_split() {
        let people: Vec<_> = (1..=4).map(|i| person(&i.to_string(), &[])).collect();
        let result =
            compute_split(101.0, &people, &WeightTable::default(), &SplitParams::default())
                .unwrap();
        for a in &result.participants {
            assert!((a.share - 25.25).abs() < EPSILON);
            assert!(a.adjustment.abs() < EPSILON);
            assert_eq!(a.ratio, 1.0);
            assert!((a.percent - 25.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_sum_invariant_across_tag_mixes() {
        let weights = WeightTable::default();
        let catalog = weights.catalog();
        let params = SplitParams::default();

        for n in 1..=6 {
            let people: Vec<_> = (0..n)
                .map(|i| {
                    let tags: Vec<&str> = catalog
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| (i + j) % 3 == 0)
                        .map(|(_, t)| t.as_str())
                        .collect();
                    person(&i.to_string(), &tags)
                })
                .collect();
            for total in [0.0, 0.01, 57.3, 300.0, 12345.67] {
                let result = compute_split(total, &people, &weights, &params).unwrap();
                assert!((result.allocated() - total).abs() < EPSILON);
                assert!(result.participants.iter().all(|a| a.ratio >= 0.2));
            }
        }
    }

    #[test]
    fn test_custom_tag_uses_default_weight() {
        let people = vec![person("1", &["Aquarium"]), person("2", &[])];
        let result =
            compute_split(210.0, &people, &WeightTable::default(), &SplitParams::default())
                .unwrap();
        let p1 = result.get("1").unwrap();
        assert!((p1.ratio - 1.1).abs() < EPSILON);
        assert!(!p1.tags[0].predefined);
        assert!((p1.share - 110.0).abs() < EPSILON);
    }

    #[test]
    fn test_negative_tags_reduce_share() {
        let people = vec![person("1", &["Frequently Out", "Office Job"]), person("2", &[])];
        let result =
            compute_split(100.0, &people, &WeightTable::default(), &SplitParams::default())
                .unwrap();
        let p1 = result.get("1").unwrap();
        assert!((p1.ratio - 0.6).abs() < EPSILON);
        assert!(p1.adjustment < 0.0);
        assert!(!p1.clamped);
    }

    #[test]
    fn test_idempotent() {
        let people = vec![
            person("1", &["Gaming PC", "Night Owl"]),
            person("2", &["Office Job"]),
            person("3", &["Sauna"]),
        ];
        let weights = WeightTable::default();
        let params = SplitParams::default();
        let a = compute_split(187.42, &people, &weights, &params).unwrap();
        let b = compute_split(187.42, &people, &weights, &params).unwrap();
        assert_eq!(a, b);
        for (x, y) in a.participants.iter().zip(&b.participants) {
            assert_eq!(x.share.to_bits(), y.share.to_bits());
        }
    }

    #[test]
    fn test_configurable_floor() {
        let params = SplitParams {
            ratio_floor: 0.8,
            ..SplitParams::default()
        };
        let people = vec![person("1", &["Frequently Out"]), person("2", &[])];
        let result = compute_split(90.0, &people, &WeightTable::default(), &params).unwrap();
        let p1 = result.get("1").unwrap();
        assert_eq!(p1.ratio, 0.8);
        assert!(p1.clamped);
        assert!((p1.share - 40.0).abs() < EPSILON);
    }

    #[test]
    fn test_empty_roster_is_error() {
        let err = compute_split(100.0, &[], &WeightTable::default(), &SplitParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyRoster));
    }

    #[test]
    fn test_invalid_total_is_error() {
        let people = vec![person("1", &[])];
        for total in [-1.0, f64::NAN, f64::INFINITY] {
            let err = compute_split(total, &people, &WeightTable::default(), &SplitParams::default())
                .unwrap_err();
            assert!(matches!(err, Error::InvalidData(_)));
        }
    }

    #[test]
    fn test_non_positive_floor_is_error() {
        let weights = WeightTable::new(
            vec![TagWeight {
                name: "Solar Panels".to_string(),
                weight: -1.0,
            }],
            0.1,
        );
        let people = vec![person("1", &["Solar Panels"])];
        for floor in [0.0, -0.5, f64::NAN] {
            let params = SplitParams {
                ratio_floor: floor,
                ..SplitParams::default()
            };
            let err = compute_split(100.0, &people, &weights, &params).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }
    }

    #[test]
    fn test_single_participant_pays_everything() {
        let people = vec![person("1", &["Electric Heater"])];
        let result =
            compute_split(80.0, &people, &WeightTable::default(), &SplitParams::default())
                .unwrap();
        assert_eq!(result.participants[0].share, 80.0);
        assert_eq!(result.participants[0].adjustment, 0.0);
        assert_eq!(result.base_percent(), 100.0);
    }
}
