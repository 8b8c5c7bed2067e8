//! Reward planning
//!
//! Pure part of the calculator: given the referrer chain and the brand's
//! rules, decide who gets what. No I/O, so the payout rules are unit-tested
//! here and the calculator only persists the plan.

use rust_decimal::Decimal;

use super::models::RewardRequest;
use crate::core_types::{DistributorId, UserId};
use crate::distributor::Distributor;
use crate::level_config::LevelRewardRule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReward {
    pub distributor_id: DistributorId,
    /// Owner of the balance to credit
    pub user_id: UserId,
    pub level: i32,
    pub amount: Decimal,
}

/// Number of ancestors worth loading for `start_level`
pub fn walk_depth(rules: &[LevelRewardRule], start_level: i32) -> usize {
    rules.iter().filter(|r| r.level >= start_level).count()
}

/// Rewards for each chain member, nearest first.
///
/// Member `i` sits at level `start_level + i`. The walk stops at the first
/// level without a rule. A member owned by the buyer is skipped but still
/// occupies its level. Amounts that round to zero are dropped.
pub fn plan_rewards(
    chain: &[Distributor],
    rules: &[LevelRewardRule],
    req: &RewardRequest,
    scale: u32,
) -> Vec<PlannedReward> {
    let mut planned = Vec::with_capacity(chain.len());

    for (depth, member) in chain.iter().enumerate() {
        let level = req.start_level + depth as i32;
        let Some(rule) = rules.iter().find(|r| r.level == level) else {
            break;
        };

        if member.user_id == req.buyer_user_id {
            tracing::debug!(
                order_id = req.order_id,
                distributor_id = member.id,
                level = level,
                "Self-referral skipped"
            );
            continue;
        }

        let amount = rule.reward_for(req.order_amount, scale);
        if amount <= Decimal::ZERO {
            continue;
        }

        planned.push(PlannedReward {
            distributor_id: member.id,
            user_id: member.user_id,
            level,
            amount,
        });
    }

    planned
}

/// Credit order for one transaction: ascending user, then distributor.
///
/// Every transaction takes balance row locks in this one global order, so two
/// orders crediting the same users cannot deadlock.
pub fn credit_order(planned: &[PlannedReward]) -> Vec<&PlannedReward> {
    let mut ordered: Vec<_> = planned.iter().collect();
    ordered.sort_by_key(|p| (p.user_id, p.distributor_id));
    ordered
}

pub fn total_amount(planned: &[PlannedReward]) -> Decimal {
    planned.iter().map(|p| p.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributor::DistributorStatus;
    use crate::level_config::{LevelRewardSetting, RewardType};
    use chrono::Utc;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn member(id: i64, user_id: i64) -> Distributor {
        Distributor {
            id,
            user_id,
            brand_id: 1,
            referrer_id: None,
            level: 1,
            status: DistributorStatus::Active,
            total_earnings: Decimal::ZERO,
            subordinates_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pct(level: i32, value: &str) -> LevelRewardRule {
        LevelRewardSetting::new(level, RewardType::Percentage, d(value)).into_rule(1)
    }

    fn fixed(level: i32, value: &str) -> LevelRewardRule {
        LevelRewardSetting::new(level, RewardType::Fixed, d(value)).into_rule(1)
    }

    fn request(buyer: i64, amount: &str) -> RewardRequest {
        RewardRequest {
            order_id: 77,
            brand_id: 1,
            buyer_user_id: buyer,
            start_level: 1,
            referrer_id: Some(1),
            order_amount: d(amount),
        }
    }

    #[test]
    fn test_two_levels_configured_three_deep_chain() {
        // A -> B -> C, only two levels configured
        let chain = vec![member(1, 101), member(2, 102), member(3, 103)];
        let rules = vec![pct(1, "0.10"), pct(2, "0.05")];

        let planned = plan_rewards(&chain, &rules, &request(999, "1000"), 2);

        assert_eq!(
            planned,
            vec![
                PlannedReward {
                    distributor_id: 1,
                    user_id: 101,
                    level: 1,
                    amount: d("100")
                },
                PlannedReward {
                    distributor_id: 2,
                    user_id: 102,
                    level: 2,
                    amount: d("50")
                },
            ]
        );
        assert_eq!(total_amount(&planned), d("150"));
        assert_eq!(walk_depth(&rules, 1), 2);
    }

    #[test]
    fn test_gap_in_levels_stops_the_walk() {
        let chain = vec![member(1, 101), member(2, 102), member(3, 103)];
        let rules = vec![pct(1, "0.10"), pct(3, "0.05")];

        let planned = plan_rewards(&chain, &rules, &request(999, "1000"), 2);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].level, 1);
    }

    #[test]
    fn test_buyer_never_rewarded_at_any_depth() {
        let rules = vec![pct(1, "0.10"), pct(2, "0.05"), fixed(3, "3")];
        for buyer_pos in 0..3 {
            let chain: Vec<_> = (0..3).map(|i| member(i + 1, 100 + i)).collect();
            let buyer = 100 + buyer_pos;
            let planned = plan_rewards(&chain, &rules, &request(buyer, "1000"), 2);

            assert_eq!(planned.len(), 2);
            assert!(planned.iter().all(|p| p.user_id != buyer));
            // skipped member keeps its level slot
            assert!(planned.iter().all(|p| p.level != buyer_pos as i32 + 1));
        }
    }

    #[test]
    fn test_start_level_offsets_levels() {
        let chain = vec![member(1, 101), member(2, 102)];
        let rules = vec![pct(1, "0.10"), pct(2, "0.05"), pct(3, "0.02")];
        let mut req = request(999, "1000");
        req.start_level = 2;

        let planned = plan_rewards(&chain, &rules, &req, 2);
        assert_eq!(planned.iter().map(|p| p.level).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(planned[0].amount, d("50"));
        assert_eq!(planned[1].amount, d("20"));
        assert_eq!(walk_depth(&rules, 2), 2);
    }

    #[test]
    fn test_percentage_total_bounded_by_rates() {
        let chain: Vec<_> = (0..5).map(|i| member(i + 1, 100 + i)).collect();
        let rules = vec![pct(1, "0.075"), pct(2, "0.033"), pct(3, "0.011")];
        let rate_sum: Decimal = rules.iter().map(|r| r.reward_value).sum();

        for amount in ["0.01", "1.99", "333.33", "1000", "98765.43"] {
            let planned = plan_rewards(&chain, &rules, &request(1, amount), 2);
            assert!(planned.len() <= rules.len());
            assert!(planned.iter().all(|p| p.level <= 3));
            // half-up rounding can add at most half a cent per level
            let slack = Decimal::new(5, 3) * Decimal::from(planned.len() as i64);
            assert!(total_amount(&planned) <= d(amount) * rate_sum + slack);
        }
    }

    #[test]
    fn test_rounding_half_up_and_zero_dropped() {
        let chain = vec![member(1, 101), member(2, 102)];
        let rules = vec![pct(1, "0.125"), pct(2, "0.001")];

        // 0.3 * 0.125 = 0.0375 -> 0.04 ; 0.3 * 0.001 = 0.0003 -> 0.00 dropped
        let planned = plan_rewards(&chain, &rules, &request(999, "0.3"), 2);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].amount, d("0.04"));
    }

    #[test]
    fn test_credit_order_by_user() {
        // chain order 303 -> 101 -> 202
        let chain = vec![member(1, 303), member(2, 101), member(3, 202)];
        let rules = vec![pct(1, "0.10"), pct(2, "0.05"), pct(3, "0.02")];
        let planned = plan_rewards(&chain, &rules, &request(999, "1000"), 2);

        let users: Vec<_> = credit_order(&planned).iter().map(|p| p.user_id).collect();
        assert_eq!(users, vec![101, 202, 303]);
        // plan itself keeps chain order
        assert_eq!(planned[0].user_id, 303);
    }

    #[test]
    fn test_empty_chain_or_rules() {
        let rules = vec![pct(1, "0.10")];
        assert!(plan_rewards(&[], &rules, &request(1, "10"), 2).is_empty());
        assert!(plan_rewards(&[member(1, 101)], &[], &request(1, "10"), 2).is_empty());
    }
}
