use crate::model::{MatchSource, RuleMatchResult, Transaction};

use super::{MatchContext, Matcher, contains_ci, direction_allows, match_result};

pub struct UserRuleMatcher;

impl Matcher for UserRuleMatcher {
    fn name(&self) -> &'static str {
        "user_rule"
    }

    fn apply(&self, tx: &Transaction, ctx: &MatchContext) -> Option<RuleMatchResult> {
        for rule in &ctx.rules.user_rules {
            if !contains_ci(&tx.description, &rule.pattern) {
                continue;
            }
            if let Some(direction) = rule.direction {
                if !direction.allows(tx.amount) {
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
                1.0,
                MatchSource::UserRule,
                format!("matched user rule \"{}\"", rule.pattern),
            ));
        }

        None
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use crate::categorize::rules::{RuleSet, UserRule};
    use crate::model::{Category, CategoryKind, Direction};

    use super::*;

    fn tx(description: &str, amount: f64) -> Transaction {
        Transaction {
            index: 0,
            date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            description: description.to_owned(),
            amount,
            counter_party: None,
            reference: None,
            balance: None,
            label: None,
            row_number: 2,
        }
    }

    fn fixture(direction: Option<Direction>) -> (Vec<Category>, RuleSet) {
        let categories = vec![Category {
            id: "cat-SAL".to_owned(),
            code: "SAL".to_owned(),
            kind: CategoryKind::Income,
            keywords: vec![],
            exclusions: vec![],
            match_priority: 0,
        }];
        let rules = RuleSet {
            user_rules: vec![UserRule {
                pattern: "acme payroll".to_owned(),
                direction,
                category_code: "SAL".to_owned(),
            }],
            ..RuleSet::default()
        };
        (categories, rules)
    }

    #[test]
    fn pattern_match_is_case_insensitive() {
        let (categories, rules) = fixture(None);
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        let result = UserRuleMatcher.apply(&tx("ACME Payroll 04/2025", 2000.0), &ctx);

        let result = result.unwrap();
        assert_eq!(result.category_code, "SAL");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.source, MatchSource::UserRule);
    }

    #[test]
    fn amount_sign_condition_is_honored() {
        let (categories, rules) = fixture(Some(Direction::Inbound));
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        assert!(UserRuleMatcher.apply(&tx("acme payroll refund", -50.0), &ctx).is_none());
        assert!(UserRuleMatcher.apply(&tx("acme payroll", 50.0), &ctx).is_some());
    }

    #[test]
    fn income_category_never_matches_a_debit() {
        let (categories, rules) = fixture(None);
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        assert!(UserRuleMatcher.apply(&tx("acme payroll chargeback", -2000.0), &ctx).is_none());
    }
}
