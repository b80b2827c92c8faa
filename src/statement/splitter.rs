use crate::{error::ImportError, model::RawBatch};

/// Splits a row-oriented statement into fixed-size batches, each prefixed
/// with the header line. Purely textual, no transaction semantics.
pub fn split_statement(content: &str, batch_size: usize) -> Result<Vec<RawBatch>, ImportError> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| ImportError::EmptyStatement("no header row".to_owned()))?;

    let rows: Vec<&str> = lines.collect();
    if rows.is_empty() {
        return Err(ImportError::EmptyStatement("no data rows".to_owned()));
    }

    let mut batches = Vec::with_capacity(rows.len().div_ceil(batch_size));
    for (batch_index, chunk) in rows.chunks(batch_size).enumerate() {
        let mut content = String::from(header);
        for row in chunk {
            content.push('\n');
            content.push_str(row);
        }
        batches.push(RawBatch {
            batch_index,
            content,
        });
    }

    Ok(batches)
}

/// Data rows in one batch, header excluded.
pub fn batch_row_count(batch: &RawBatch) -> usize {
    batch.content.lines().count().saturating_sub(1)
}

pub fn total_row_count(batches: &[RawBatch]) -> usize {
    batches.iter().map(batch_row_count).sum()
}

#[cfg(test)]
mod test {
    use super::*;

    fn statement(rows: usize) -> String {
        let mut content = String::from("Date;Description;Amount");
        for row in 0..rows {
            content.push_str(&format!("\n2025-01-{:02};ROW {row};-{row}.00", row % 28 + 1));
        }
        content
    }

    #[test]
    fn splits_25_rows_into_3_batches_of_10() {
        let batches = split_statement(&statement(25), 10).unwrap();

        assert_eq!(batches.len(), 3);
        assert_eq!(batch_row_count(&batches[0]), 10);
        assert_eq!(batch_row_count(&batches[1]), 10);
        assert_eq!(batch_row_count(&batches[2]), 5);
        assert_eq!(total_row_count(&batches), 25);
    }

    #[test]
    fn every_batch_carries_the_header() {
        let batches = split_statement(&statement(25), 10).unwrap();

        for batch in &batches {
            assert!(batch.content.starts_with("Date;Description;Amount\n"));
        }
    }

    #[test]
    fn preserves_row_order_across_batches() {
        let batches = split_statement(&statement(12), 5).unwrap();

        let rows: Vec<&str> = batches
            .iter()
            .flat_map(|b| b.content.lines().skip(1))
            .collect();
        for (i, row) in rows.iter().enumerate() {
            assert!(row.contains(&format!("ROW {i};")));
        }
    }

    #[test]
    fn identical_input_yields_identical_batches() {
        let content = statement(17);

        let a = split_statement(&content, 10).unwrap();
        let b = split_statement(&content, 10).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn skips_blank_lines() {
        let content = "Date;Amount\n\nrow one;1.00\n   \nrow two;2.00\n";

        let batches = split_statement(content, 10).unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batch_row_count(&batches[0]), 2);
    }

    #[test]
    fn header_only_statement_is_an_error() {
        let err = split_statement("Date;Amount\n", 10).unwrap_err();

        assert!(matches!(err, ImportError::EmptyStatement(_)));
    }

    #[test]
    fn empty_statement_is_an_error() {
        let err = split_statement("", 10).unwrap_err();

        assert!(matches!(err, ImportError::EmptyStatement(_)));
    }
}
