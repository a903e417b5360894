//! Tabular input for the local score.
//!
//! A [`Dataset`] is a dense row-major `N × n` matrix of `f64`. Categorical columns hold dense
//! integer codes `0..k` and carry their cardinality `k` in `n_categories`; continuous columns
//! have cardinality 0. All checks happen here, so scoring code can assume complete, finite
//! data with in-range codes.

use std::collections::BTreeSet;

use crate::engine::errors::GesError;

/// Complete-case mixed continuous/categorical data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dataset {
    names: Vec<String>,
    n_samples: usize,
    values: Vec<f64>,
    n_categories: Vec<usize>,
    category_labels: Vec<Vec<String>>,
    dropped_rows: usize,
}

impl Dataset {
    /// Builds a dataset from row-major values.
    ///
    /// `names.len()` fixes the number of columns. `n_categories[j] == 0` marks column `j`
    /// continuous; otherwise every value in it must be an integer code in `0..n_categories[j]`.
    pub fn new(
        names: Vec<String>,
        values: Vec<f64>,
        n_categories: Vec<usize>,
    ) -> Result<Self, GesError> {
        let n_vars = names.len();
        if n_vars == 0 {
            return Err(GesError::ValidationError(
                "dataset must have at least one column".into(),
            ));
        }
        if n_categories.len() != n_vars {
            return Err(GesError::ValidationError(format!(
                "n_categories has {} entries for {} columns",
                n_categories.len(),
                n_vars
            )));
        }
        if values.is_empty() || values.len() % n_vars != 0 {
            return Err(GesError::ValidationError(format!(
                "{} values do not fill whole rows of {} columns",
                values.len(),
                n_vars
            )));
        }
        let n_samples = values.len() / n_vars;

        for (idx, &v) in values.iter().enumerate() {
            let (row, col) = (idx / n_vars, idx % n_vars);
            if !v.is_finite() {
                return Err(GesError::ValidationError(format!(
                    "non-finite value {} at row {}, column '{}'",
                    v, row, names[col]
                )));
            }
            let k = n_categories[col];
            if k > 0 && (v.fract() != 0.0 || v < 0.0 || v >= k as f64) {
                return Err(GesError::ValidationError(format!(
                    "category code {} at row {}, column '{}' is outside 0..{}",
                    v, row, names[col], k
                )));
            }
        }

        let category_labels = n_categories
            .iter()
            .map(|&k| (0..k).map(|c| c.to_string()).collect())
            .collect();

        Ok(Self {
            names,
            n_samples,
            values,
            n_categories,
            category_labels,
            dropped_rows: 0,
        })
    }

    /// Builds a dataset from raw text cells, as read from a delimited file.
    ///
    /// Columns flagged in `categorical` are encoded by sorted unique label. Other columns are
    /// parsed as `f64`. Rows with an empty or non-finite cell are dropped; a continuous cell
    /// that is not a number at all is rejected.
    pub fn from_text_columns(
        names: Vec<String>,
        rows: &[Vec<String>],
        categorical: &[bool],
    ) -> Result<Self, GesError> {
        let n_vars = names.len();
        if categorical.len() != n_vars {
            return Err(GesError::ValidationError(format!(
                "categorical flags given for {} of {} columns",
                categorical.len(),
                n_vars
            )));
        }

        let mut complete: Vec<Vec<&str>> = Vec::with_capacity(rows.len());
        let mut parsed: Vec<Vec<f64>> = Vec::with_capacity(rows.len());
        'rows: for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != n_vars {
                return Err(GesError::ValidationError(format!(
                    "row {} has {} cells, expected {}",
                    row_idx,
                    row.len(),
                    n_vars
                )));
            }
            let mut numeric = vec![0.0; n_vars];
            for (col, cell) in row.iter().enumerate() {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue 'rows;
                }
                if categorical[col] {
                    continue;
                }
                let v: f64 = cell.parse().map_err(|_| {
                    GesError::ValidationError(format!(
                        "cell '{}' at row {}, column '{}' is not a number; \
                         mark the column categorical",
                        cell, row_idx, names[col]
                    ))
                })?;
                if !v.is_finite() {
                    continue 'rows;
                }
                numeric[col] = v;
            }
            complete.push(row.iter().map(|c| c.trim()).collect());
            parsed.push(numeric);
        }

        let dropped_rows = rows.len() - complete.len();
        if complete.is_empty() {
            return Err(GesError::ValidationError(format!(
                "no complete rows remain out of {}",
                rows.len()
            )));
        }

        let mut category_labels: Vec<Vec<String>> = vec![Vec::new(); n_vars];
        for col in (0..n_vars).filter(|&c| categorical[c]) {
            let labels: BTreeSet<&str> = complete.iter().map(|r| r[col]).collect();
            category_labels[col] = labels.into_iter().map(str::to_string).collect();
        }
        let n_categories: Vec<usize> = category_labels.iter().map(Vec::len).collect();

        let mut values = Vec::with_capacity(complete.len() * n_vars);
        for (cells, numeric) in complete.iter().zip(&parsed) {
            for col in 0..n_vars {
                if categorical[col] {
                    let code = category_labels[col]
                        .binary_search_by(|l| l.as_str().cmp(cells[col]))
                        .map_err(|_| {
                            GesError::Internal(format!(
                                "label '{}' missing from column '{}'",
                                cells[col], names[col]
                            ))
                        })?;
                    values.push(code as f64);
                } else {
                    values.push(numeric[col]);
                }
            }
        }

        #[cfg(feature = "tracing")]
        if dropped_rows > 0 {
            tracing::info!(
                dropped_rows,
                kept_rows = complete.len(),
                "dropped incomplete rows"
            );
        }

        let mut dataset = Dataset::new(names, values, n_categories)?;
        dataset.category_labels = category_labels;
        dataset.dropped_rows = dropped_rows;
        Ok(dataset)
    }

    /// Column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows `N`.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of columns `n`.
    pub fn n_vars(&self) -> usize {
        self.names.len()
    }

    /// Category count per column; 0 for continuous columns.
    pub fn n_categories(&self) -> &[usize] {
        &self.n_categories
    }

    /// Whether column `col` is categorical.
    pub fn is_categorical(&self, col: usize) -> bool {
        self.n_categories[col] > 0
    }

    /// Labels of the codes of a categorical column, indexed by code.
    pub fn category_labels(&self, col: usize) -> &[String] {
        &self.category_labels[col]
    }

    /// Rows discarded by complete-case filtering.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Value at `(row, col)`.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.n_vars() + col]
    }

    /// Category code at `(row, col)` of a categorical column.
    #[inline]
    pub fn code(&self, row: usize, col: usize) -> usize {
        self.value(row, col) as usize
    }

    /// Copy of one column.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_samples).map(|r| self.value(r, col)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn new_accepts_mixed_columns() {
        let ds = Dataset::new(names(&["a", "b"]), vec![0.5, 1.0, -2.0, 0.0], vec![0, 2])
            .expect("valid");
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.n_vars(), 2);
        assert_eq!(ds.code(0, 1), 1);
        assert_eq!(ds.column(0), vec![0.5, -2.0]);
        assert!(ds.is_categorical(1));
    }

    #[test]
    fn new_rejects_bad_codes_and_non_finite_values() {
        let err = Dataset::new(names(&["a"]), vec![0.0, 2.0], vec![2]).expect_err("code 2");
        assert!(err.to_string().contains("outside 0..2"));

        let err = Dataset::new(names(&["a"]), vec![0.5], vec![2]).expect_err("fractional");
        assert!(err.to_string().contains("outside"));

        let err = Dataset::new(names(&["a"]), vec![f64::NAN], vec![0]).expect_err("nan");
        assert!(err.to_string().contains("non-finite"));

        let err = Dataset::new(names(&["a", "b"]), vec![1.0, 2.0, 3.0], vec![0, 0])
            .expect_err("ragged");
        assert!(err.to_string().contains("whole rows"));
    }

    #[test]
    fn text_columns_encode_categories_and_drop_incomplete_rows() {
        let ds = Dataset::from_text_columns(
            names(&["x", "colour"]),
            &rows(&[
                &["1.5", "red"],
                &["", "blue"],
                &["2.0", "blue"],
                &["NaN", "green"],
                &["-1", "red"],
            ]),
            &[false, true],
        )
        .expect("valid");
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.dropped_rows(), 2);
        assert_eq!(ds.n_categories(), &[0, 2]);
        assert_eq!(ds.category_labels(1), &["blue".to_string(), "red".to_string()]);
        assert_eq!(ds.column(1), vec![1.0, 0.0, 1.0]);
        assert_eq!(ds.column(0), vec![1.5, 2.0, -1.0]);
    }

    #[test]
    fn text_columns_reject_words_in_continuous_column() {
        let err = Dataset::from_text_columns(
            names(&["x"]),
            &rows(&[&["1"], &["high"]]),
            &[false],
        )
        .expect_err("not numeric");
        assert!(err.to_string().contains("mark the column categorical"));
    }
}
