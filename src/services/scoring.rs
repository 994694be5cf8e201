use std::collections::HashMap;

use crate::models::{BehaviorScore, InterestWeight};

/// Interaction count at which the engagement factor saturates
const SATURATION_INTERACTIONS: f64 = 10.0;

/// Merges explicit interest weights with observed behavior into one scalar
///
/// An interest with no behavior entry scores its bare weight. With behavior, the
/// weight is boosted by the behavior score scaled by an interaction-volume factor
/// that saturates at 10 interactions:
///
/// `combined = weight * (1 + score * min(1, interaction_count / 10))`
pub fn combine_scores(
    weights: &[InterestWeight],
    behavior: &HashMap<i64, BehaviorScore>,
) -> HashMap<i64, f64> {
    let mut combined = HashMap::with_capacity(weights.len());

    for entry in weights {
        let interest_id = entry.interest.id;
        let score = match behavior.get(&interest_id) {
            Some(b) => {
                let volume_factor =
                    (b.interaction_count as f64 / SATURATION_INTERACTIONS).min(1.0);
                entry.weight * (1.0 + b.score * volume_factor)
            }
            None => entry.weight,
        };
        combined.insert(interest_id, score);
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InterestRef;
    use chrono::Utc;

    fn weight(interest_id: i64, value: f64) -> InterestWeight {
        InterestWeight {
            interest: InterestRef {
                id: interest_id,
                name: format!("interest-{interest_id}"),
                category: "Test".to_string(),
            },
            weight: value,
            updated_at: Utc::now(),
        }
    }

    fn behavior(score: f64, interaction_count: i32) -> BehaviorScore {
        BehaviorScore {
            score,
            interaction_count,
            last_interaction: Some(Utc::now()),
        }
    }

    #[test]
    fn test_no_behavior_entry_scores_bare_weight() {
        let combined = combine_scores(&[weight(1, 2.5)], &HashMap::new());
        assert_eq!(combined[&1], 2.5);
    }

    #[test]
    fn test_behavior_boosts_weight() {
        let mut scores = HashMap::new();
        scores.insert(1, behavior(0.5, 5));

        let combined = combine_scores(&[weight(1, 2.0)], &scores);
        // 2.0 * (1 + 0.5 * 0.5) = 2.5
        assert!((combined[&1] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_volume_factor_saturates_at_ten_interactions() {
        let mut at_ten = HashMap::new();
        at_ten.insert(1, behavior(1.0, 10));
        let mut at_hundred = HashMap::new();
        at_hundred.insert(1, behavior(1.0, 100));

        let combined_ten = combine_scores(&[weight(1, 1.0)], &at_ten);
        let combined_hundred = combine_scores(&[weight(1, 1.0)], &at_hundred);

        assert!((combined_ten[&1] - 2.0).abs() < 1e-9);
        assert_eq!(combined_ten[&1], combined_hundred[&1]);
    }

    #[test]
    fn test_zero_interactions_contribute_nothing() {
        let mut scores = HashMap::new();
        scores.insert(1, behavior(0.9, 0));

        let combined = combine_scores(&[weight(1, 3.0)], &scores);
        assert_eq!(combined[&1], 3.0);
    }

    #[test]
    fn test_negative_behavior_score_penalizes() {
        let mut scores = HashMap::new();
        scores.insert(1, behavior(-0.5, 10));

        let combined = combine_scores(&[weight(1, 2.0)], &scores);
        assert!((combined[&1] - 1.0).abs() < 1e-9);
    }
}
