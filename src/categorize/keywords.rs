use crate::model::{Category, MatchSource, RuleMatchResult, Transaction};

use super::{MatchContext, Matcher, direction_allows, match_result};

const KEYWORD_CONFIDENCE: f64 = 0.95;

pub struct KeywordMatcher;

impl Matcher for KeywordMatcher {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn apply(&self, tx: &Transaction, ctx: &MatchContext) -> Option<RuleMatchResult> {
        let description = tx.description.to_lowercase();

        let mut best: Option<(&Category, &str)> = None;
        for category in ctx.categories {
            if !direction_allows(category, tx.amount) {
                continue;
            }
            if category
                .exclusions
                .iter()
                .any(|pattern| description.contains(&pattern.to_lowercase()))
            {
                continue;
            }

            for keyword in &category.keywords {
                if keyword.is_empty() || !description.contains(&keyword.to_lowercase()) {
                    continue;
                }
                let candidate = (category, keyword.as_str());
                if best.is_none_or(|current| beats(candidate, current)) {
                    best = Some(candidate);
                }
            }
        }

        let (category, keyword) = best?;
        Some(match_result(
            tx,
            category,
            KEYWORD_CONFIDENCE,
            MatchSource::Keyword,
            format!("description contains \"{keyword}\""),
        ))
    }
}

/// Longest keyword wins; priority, then category code, complete the order
/// so ties never depend on iteration accidents.
fn beats(candidate: (&Category, &str), current: (&Category, &str)) -> bool {
    let candidate_rank = (candidate.1.len(), candidate.0.match_priority);
    let current_rank = (current.1.len(), current.0.match_priority);
    if candidate_rank != current_rank {
        return candidate_rank > current_rank;
    }
    candidate.0.code < current.0.code
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use crate::categorize::rules::RuleSet;
    use crate::model::CategoryKind;

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

    fn category(code: &str, kind: CategoryKind, keywords: &[&str], exclusions: &[&str]) -> Category {
        Category {
            id: format!("cat-{code}"),
            code: code.to_owned(),
            kind,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            exclusions: exclusions.iter().map(|e| e.to_string()).collect(),
            match_priority: 0,
        }
    }

    #[test]
    fn longest_keyword_wins_the_tie_break() {
        let categories = vec![
            category("SHORT", CategoryKind::Expense, &["ABC"], &[]),
            category("LONG", CategoryKind::Expense, &["ABCDEF"], &[]),
        ];
        let rules = RuleSet::default();
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        let result = KeywordMatcher.apply(&tx("payment ABCDEF gmbh", -10.0), &ctx);

        assert_eq!(result.unwrap().category_code, "LONG");
    }

    #[test]
    fn directionality_conflict_discards_the_match() {
        let categories = vec![
            category("SAL", CategoryKind::Income, &["salary"], &[]),
            category("FEES", CategoryKind::Expense, &["fee"], &[]),
        ];
        let rules = RuleSet::default();
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        // negative amount cannot land in an income category
        assert!(KeywordMatcher.apply(&tx("salary correction", -100.0), &ctx).is_none());
        // positive amount cannot land in an expense category
        assert!(KeywordMatcher.apply(&tx("fee refund", 5.0), &ctx).is_none());
    }

    #[test]
    fn exclusion_pattern_suppresses_a_false_positive() {
        let categories = vec![category(
            "FUEL",
            CategoryKind::Expense,
            &["shell"],
            &["shell consulting"],
        )];
        let rules = RuleSet::default();
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        assert!(KeywordMatcher.apply(&tx("SHELL station 42", -60.0), &ctx).is_some());
        assert!(KeywordMatcher.apply(&tx("Shell Consulting invoice", -60.0), &ctx).is_none());
    }

    #[test]
    fn equal_length_ties_resolve_by_category_code() {
        let categories = vec![
            category("BBB", CategoryKind::Expense, &["abcd"], &[]),
            category("AAA", CategoryKind::Expense, &["wxyz"], &[]),
        ];
        let rules = RuleSet::default();
        let ctx = MatchContext {
            categories: &categories,
            rules: &rules,
        };

        let result = KeywordMatcher.apply(&tx("abcd wxyz", -10.0), &ctx);

        assert_eq!(result.unwrap().category_code, "AAA");
    }
}
