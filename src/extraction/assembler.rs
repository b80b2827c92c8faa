use std::collections::BTreeMap;

use crate::model::{FailedBatch, RowRange, Transaction};

/// File rows a batch covered, 1-based inclusive, header = row 1. Computed
/// from the batch index alone so gaps stay auditable after the content is
/// gone.
pub fn row_range(batch_index: usize, batch_size: usize, total_rows: usize) -> RowRange {
    let first_data_row = batch_index * batch_size;
    let last_data_row = (first_data_row + batch_size).min(total_rows).max(first_data_row + 1) - 1;

    RowRange {
        start: first_data_row + 2,
        end: last_data_row + 2,
    }
}

/// Flattens per-batch result slots in batch-index order, then sorts by
/// global index so the final order never depends on completion order.
pub fn flatten_slots(slots: BTreeMap<usize, Vec<Transaction>>) -> Vec<Transaction> {
    let mut transactions: Vec<Transaction> = slots.into_values().flatten().collect();
    transactions.sort_by_key(|tx| tx.index);
    transactions
}

/// Pure merge of per-batch results and permanently failed batches into the
/// definitive run output.
pub fn assemble(
    slots: BTreeMap<usize, Vec<Transaction>>,
    mut failed: Vec<FailedBatch>,
) -> (Vec<Transaction>, Vec<FailedBatch>) {
    failed.sort_by_key(|f| f.batch_index);
    failed.dedup_by_key(|f| f.batch_index);

    (flatten_slots(slots), failed)
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    fn tx(index: usize) -> Transaction {
        Transaction {
            index,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            description: format!("tx {index}"),
            amount: -1.0,
            counter_party: None,
            reference: None,
            balance: None,
            label: None,
            row_number: index + 2,
        }
    }

    #[test]
    fn failed_middle_batch_of_25_rows_covers_rows_12_to_21() {
        let range = row_range(1, 10, 25);

        assert_eq!(range, RowRange { start: 12, end: 21 });
    }

    #[test]
    fn short_last_batch_range_is_clamped() {
        let range = row_range(2, 10, 25);

        assert_eq!(range, RowRange { start: 22, end: 26 });
        assert_eq!(range.len(), 5);
    }

    #[test]
    fn flatten_orders_by_global_index_regardless_of_slot_insertion() {
        let mut slots = BTreeMap::new();
        slots.insert(2, vec![tx(20), tx(21)]);
        slots.insert(0, vec![tx(0), tx(1)]);
        slots.insert(1, vec![tx(10)]);

        let transactions = flatten_slots(slots);

        let indices: Vec<usize> = transactions.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 10, 20, 21]);
    }

    #[test]
    fn assemble_sorts_and_dedups_failures() {
        let failed = vec![
            FailedBatch {
                batch_index: 3,
                row_range: row_range(3, 10, 45),
                error: "timeout".to_owned(),
                retry_count: 3,
            },
            FailedBatch {
                batch_index: 1,
                row_range: row_range(1, 10, 45),
                error: "timeout".to_owned(),
                retry_count: 3,
            },
            FailedBatch {
                batch_index: 3,
                row_range: row_range(3, 10, 45),
                error: "timeout".to_owned(),
                retry_count: 3,
            },
        ];

        let (_, failed) = assemble(BTreeMap::new(), failed);

        let indices: Vec<usize> = failed.iter().map(|f| f.batch_index).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
