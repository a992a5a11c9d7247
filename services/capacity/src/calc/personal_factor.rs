use crate::schema::columns;
use crate::table::Table;

/// Finds the factor column, tolerating the line break in its header.
fn factor_column(table: &Table) -> Option<usize> {
    table.column_index(columns::PERSONAL_FACTOR).or_else(|| {
        table.columns().iter().position(|c| {
            c.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .eq_ignore_ascii_case("personal factor")
        })
    })
}

/// Weighted personal factor: Σ(factor × result) / Σ result.
///
/// Rows missing either value drop out of the numerator; a missing factor
/// still counts its result in the denominator. A non-positive weight sum
/// yields `0.0`. `None` when the table lacks the expected columns.
pub fn weighted_average(table: &Table) -> Option<f64> {
    let factor = factor_column(table)?;
    let result = table.column_index(columns::RESULT)?;

    let mut weighted = 0.0;
    let mut weights = 0.0;
    for row in table.rows() {
        let r = row[result].as_f64();
        if let (Some(f), Some(r)) = (row[factor].as_f64(), r) {
            weighted += f * r;
        }
        weights += r.unwrap_or(0.0);
    }
    if weights > 0.0 {
        Some(weighted / weights)
    } else {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn table(rows: &[(Option<f64>, Option<f64>)]) -> Table {
        let mut t = Table::new(["Personal\nFactor", "SMT Type", "Result"]);
        for (f, r) in rows {
            t.push_row(vec![Cell::from_opt(*f), Cell::text("SMT1"), Cell::from_opt(*r)]);
        }
        t
    }

    #[test]
    fn test_weighted_average() {
        let t = table(&[(Some(1.2), Some(2.0)), (Some(0.9), Some(1.0))]);
        let avg = weighted_average(&t).unwrap();
        assert!((avg - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_average_missing_factor_keeps_weight() {
        let t = table(&[(Some(1.0), Some(1.0)), (None, Some(1.0))]);
        assert_eq!(weighted_average(&t), Some(0.5));
    }

    #[test]
    fn test_weighted_average_zero_weights() {
        let t = table(&[(Some(1.0), Some(0.0))]);
        assert_eq!(weighted_average(&t), Some(0.0));
    }

    #[test]
    fn test_header_variants() {
        let mut t = Table::new(["Personal  Factor", "Result"]);
        t.push_row(vec![Cell::Number(2.0), Cell::Number(1.0)]);
        assert_eq!(weighted_average(&t), Some(2.0));
        assert_eq!(weighted_average(&Table::new(["Result"])), None);
    }
}
