use crate::model::{MatchSource, RuleMatchResult, Transaction};

use super::{MatchContext, Matcher, direction_allows, match_result};

pub struct ContextRuleMatcher;

impl Matcher for ContextRuleMatcher {
    fn name(&self) -> &'static str {
        "context_rule"
    }

    fn apply(&self, tx: &Transaction, ctx: &MatchContext) -> Option<RuleMatchResult> {
        for rule in &ctx.rules.context_rules {
            if rule.counter_party.is_none() && rule.description_prefix.is_none() {
                continue;
            }

            if let Some(counter_party) = &rule.counter_party {
                let Some(actual) = &tx.counter_party else {
                    continue;
                };
                if !actual.eq_ignore_ascii_case(counter_party) {
                    continue;
                }
            }
            if let Some(prefix) = &rule.description_prefix {
                if !tx.description.to_lowercase().starts_with(&prefix.to_lowercase()) {
                    continue;
                }
            }

            let abs = tx.amount.abs();
            if let Some(min) = rule.min_abs_amount {
                if abs < min {
                    continue;
                }
            }
            if let Some(max) = rule.max_abs_amount {
                if abs > max {
                    continue;
                }
            }

            let Some(category) = ctx.category_by_code(&rule.category_code) else {
                continue;
            };
            if !direction_allows(category, tx.amount) {
                continue;
            }

            return Some(match_result(
                tx,
                category,
                rule.confidence,
                MatchSource::ContextRule,
                context_reasoning(rule),
            ));
        }

        None
    }
}

fn context_reasoning(rule: &crate::categorize::rules::ContextRule) -> String {
    match (&rule.counter_party, &rule.description_prefix) {
        (Some(counter_party), _) => format!("known counterparty \"{counter_party}\""),
        (None, Some(prefix)) => format!("description prefix \"{prefix}\""),
        (None, None) => "context rule".to_owned(),
    }
}
