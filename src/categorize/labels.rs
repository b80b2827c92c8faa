use crate::model::{MatchSource, RuleMatchResult, Transaction};

use super::{MatchContext, Matcher, contains_ci, direction_allows, match_result};

pub struct LabelMatcher;

impl Matcher for LabelMatcher {
    fn name(&self) -> &'static str {
        "excel_label"
    }

    fn apply(&self, tx: &Transaction, ctx: &MatchContext) -> Option<RuleMatchResult> {
        let label = tx.label.as_deref()?.trim();
        if label.is_empty() {
            return None;
        }

        // exact match first, substring only as a fallback
        let entry = ctx
            .rules
            .labels
            .iter()
            .find(|entry| entry.label.eq_ignore_ascii_case(label))
            .or_else(|| {
                ctx.rules
                    .labels
                    .iter()
                    .find(|entry| contains_ci(label, &entry.label))
            })?;

        // sign picks the side for entries that carry both codes
        let code = if tx.amount >= 0.0 {
            entry.inbound_code.as_ref().or(entry.outbound_code.as_ref())
        } else {
            entry.outbound_code.as_ref().or(entry.inbound_code.as_ref())
        }?;

        let category = ctx.category_by_code(code)?;
        if !direction_allows(category, tx.amount) {
            return None;
        }

        Some(match_result(
            tx,
            category,
            entry.confidence,
            MatchSource::ExcelLabel,
            format!("label \"{label}\" matched table entry \"{}\"", entry.label),
        ))
    }
}
