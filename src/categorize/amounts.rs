use crate::model::{MatchSource, RuleMatchResult, Transaction};

use super::{MatchContext, Matcher, contains_ci, direction_allows, match_result};

pub struct AmountMatcher;

impl Matcher for AmountMatcher {
    fn name(&self) -> &'static str {
        "amount_rule"
    }

    fn apply(&self, tx: &Transaction, ctx: &MatchContext) -> Option<RuleMatchResult> {
        let counter_party = tx.counter_party.as_deref()?;
        let abs = tx.amount.abs();

        for rule in &ctx.rules.amount_rules {
            if !contains_ci(counter_party, &rule.counter_party_contains) {
                continue;
            }

            for bucket in &rule.buckets {
                if abs < bucket.min_abs {
                    continue;
                }
                if let Some(max) = bucket.max_abs {
                    if abs >= max {
                        continue;
                    }
                }

                let Some(category) = ctx.category_by_code(&bucket.category_code) else {
                    continue;
                };
                if !direction_allows(category, tx.amount) {
                    continue;
                }

                return Some(match_result(
                    tx,
                    category,
                    bucket.confidence,
                    MatchSource::AmountRule,
                    format!(
                        "amount {abs:.2} in bucket {min:.2}..{max} for counterparty class \"{class}\"",
                        min = bucket.min_abs,
                        max = bucket
                            .max_abs
                            .map(|m| format!("{m:.2}"))
                            .unwrap_or_else(|| "∞".to_owned()),
                        class = rule.counter_party_contains,
                    ),
                ));
            }
        }

        None
    }
}
