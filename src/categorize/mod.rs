use crate::model::{
    BalanceImpact, Category, MatchSource, RuleMatchResult, Transaction,
};

pub mod classifier;
pub mod rules;

mod amounts;
mod context_rules;
mod keywords;
mod labels;
mod user_rules;

use rules::RuleSet;

pub struct MatchContext<'a> {
    pub categories: &'a [Category],
    pub rules: &'a RuleSet,
}

impl MatchContext<'_> {
    pub fn category_by_code(&self, code: &str) -> Option<&Category> {
        let category = self.categories.iter().find(|c| c.code == code);
        if category.is_none() {
            tracing::warn!(code, "rule references unknown category code");
        }
        category
    }
}

/// One cascade stage. Stages never see a transaction an earlier stage
/// already resolved.
pub trait Matcher {
    fn name(&self) -> &'static str;
    fn apply(&self, tx: &Transaction, ctx: &MatchContext) -> Option<RuleMatchResult>;
}

/// Stage order is the precedence order; the first `Some` wins.
fn matchers() -> Vec<Box<dyn Matcher>> {
    vec![
        Box::new(user_rules::UserRuleMatcher),
        Box::new(context_rules::ContextRuleMatcher),
        Box::new(labels::LabelMatcher),
        Box::new(keywords::KeywordMatcher),
        Box::new(amounts::AmountMatcher),
    ]
}

#[derive(Debug)]
pub struct CascadeOutcome {
    pub matched: Vec<RuleMatchResult>,
    pub unresolved: Vec<Transaction>,
}

/// Runs every transaction through the cascade. Pure: identical inputs
/// produce identical output, with no time-based or random tie-breaks.
pub fn classify(
    transactions: &[Transaction],
    categories: &[Category],
    rules: &RuleSet,
) -> CascadeOutcome {
    let ctx = MatchContext { categories, rules };
    let matchers = matchers();

    let mut matched = Vec::new();
    let mut unresolved = Vec::new();

    for tx in transactions {
        let hit = matchers.iter().find_map(|matcher| {
            let result = matcher.apply(tx, &ctx);
            if let Some(result) = &result {
                tracing::debug!(
                    index = tx.index,
                    stage = matcher.name(),
                    code = %result.category_code,
                    "transaction matched"
                );
            }
            result
        });

        match hit {
            Some(result) => matched.push(result),
            None => unresolved.push(tx.clone()),
        }
    }

    CascadeOutcome {
        matched,
        unresolved,
    }
}

pub(crate) fn match_result(
    tx: &Transaction,
    category: &Category,
    confidence: f64,
    source: MatchSource,
    reasoning: String,
) -> RuleMatchResult {
    RuleMatchResult {
        transaction_index: tx.index,
        category_id: category.id.clone(),
        category_code: category.code.clone(),
        category_kind: category.kind,
        confidence,
        source,
        reasoning,
        affects_pnl: category.kind.affects_pnl(),
        balance_impact: BalanceImpact::for_amount(category.kind, tx.amount),
    }
}

/// A category whose kind implies a direction never matches a transaction
/// on the wrong side of zero.
pub(crate) fn direction_allows(category: &Category, amount: f64) -> bool {
    match category.kind.direction() {
        Some(direction) => direction.allows(amount),
        None => true,
    }
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use crate::model::CategoryKind;

    use super::rules::{AmountBucket, AmountRule, ContextRule, LabelEntry, UserRule};
    use super::*;

    fn tx(index: usize, description: &str, amount: f64) -> Transaction {
        Transaction {
            index,
            date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            description: description.to_owned(),
            amount,
            counter_party: None,
            reference: None,
            balance: None,
            label: None,
            row_number: index + 2,
        }
    }

    fn category(code: &str, kind: CategoryKind, keywords: &[&str]) -> Category {
        Category {
            id: format!("cat-{code}"),
            code: code.to_owned(),
            kind,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            exclusions: vec![],
            match_priority: 0,
        }
    }

    fn fixture() -> (Vec<Category>, RuleSet) {
        let categories = vec![
            category("SAL", CategoryKind::Income, &["salary"]),
            category("RENT", CategoryKind::Expense, &["rent"]),
            category("SOFT", CategoryKind::Expense, &["hosting", "software"]),
            category("LOAN", CategoryKind::Financing, &[]),
        ];
        let rules = RuleSet {
            user_rules: vec![UserRule {
                pattern: "ACME PAYROLL".to_owned(),
                direction: None,
                category_code: "SAL".to_owned(),
            }],
            context_rules: vec![ContextRule {
                counter_party: Some("Main Street Realty".to_owned()),
                description_prefix: None,
                min_abs_amount: None,
                max_abs_amount: None,
                category_code: "RENT".to_owned(),
                confidence: 0.95,
            }],
            labels: vec![LabelEntry {
                label: "loan payment".to_owned(),
                inbound_code: Some("LOAN".to_owned()),
                outbound_code: Some("LOAN".to_owned()),
                confidence: 0.9,
            }],
            amount_rules: vec![AmountRule {
                counter_party_contains: "card services".to_owned(),
                buckets: vec![AmountBucket {
                    min_abs: 0.0,
                    max_abs: Some(20.0),
                    category_code: "SOFT".to_owned(),
                    confidence: 0.6,
                }],
            }],
        };
        (categories, rules)
    }

    #[test]
    fn stages_run_in_precedence_order() {
        let (categories, rules) = fixture();
        // description would also keyword-match SAL, the user rule must win
        let transactions = vec![tx(0, "ACME PAYROLL salary April", 2500.0)];

        let outcome = classify(&transactions, &categories, &rules);

        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.matched[0].source, MatchSource::UserRule);
        assert_eq!(outcome.matched[0].confidence, 1.0);
    }

    #[test]
    fn unmatched_transactions_flow_to_unresolved() {
        let (categories, rules) = fixture();
        let transactions = vec![
            tx(0, "salary April", 2500.0),
            tx(1, "completely opaque wire", -80.0),
        ];

        let outcome = classify(&transactions, &categories, &rules);

        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(outcome.unresolved[0].index, 1);
    }

    #[test]
    fn no_index_is_both_matched_and_unresolved() {
        let (categories, rules) = fixture();
        let transactions: Vec<Transaction> = (0..30)
            .map(|i| {
                let desc = match i % 3 {
                    0 => "salary payment",
                    1 => "rent march",
                    _ => "mystery",
                };
                tx(i, desc, if i % 3 == 0 { 100.0 } else { -100.0 })
            })
            .collect();

        let outcome = classify(&transactions, &categories, &rules);

        let matched: std::collections::HashSet<usize> = outcome
            .matched
            .iter()
            .map(|m| m.transaction_index)
            .collect();
        for tx in &outcome.unresolved {
            assert!(!matched.contains(&tx.index));
        }
        assert_eq!(outcome.matched.len() + outcome.unresolved.len(), 30);
    }

    #[test]
    fn identical_inputs_yield_byte_identical_results() {
        let (categories, rules) = fixture();
        let transactions: Vec<Transaction> = (0..20)
            .map(|i| tx(i, "software hosting rent salary", if i % 2 == 0 { 10.0 } else { -10.0 }))
            .collect();

        let a = classify(&transactions, &categories, &rules);
        let b = classify(&transactions, &categories, &rules);

        let a_json = serde_json::to_string(&a.matched).unwrap();
        let b_json = serde_json::to_string(&b.matched).unwrap();
        assert_eq!(a_json, b_json);
        assert_eq!(a.unresolved, b.unresolved);
    }
}
