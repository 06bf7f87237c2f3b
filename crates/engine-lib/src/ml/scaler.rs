//! Feature standardization
//!
//! Fit on the training set, reuse at inference: a model trained on scaled
//! features produces garbage when handed raw ones, so the fitted scaler
//! travels with the model it was fitted for.

/// Columns with near-zero spread divide by 1.0 instead
const MIN_STD: f64 = 1e-12;

/// Per-column zero-mean unit-variance scaler
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit column means and standard deviations on the training rows
    pub fn fit(&mut self, rows: &[Vec<f64>]) {
        if rows.is_empty() {
            self.means.clear();
            self.stds.clear();
            return;
        }
        let dim = rows[0].len();
        let n = rows.len() as f64;

        self.means = vec![0.0; dim];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                self.means[i] += v;
            }
        }
        for m in &mut self.means {
            *m /= n;
        }

        self.stds = vec![0.0; dim];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                self.stds[i] += (v - self.means[i]).powi(2);
            }
        }
        for s in &mut self.stds {
            *s = (*s / n).sqrt();
            if *s < MIN_STD {
                *s = 1.0;
            }
        }
    }

    /// Scale one row with the fitted parameters
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, v)| {
                let mean = self.means.get(i).copied().unwrap_or(0.0);
                let std = self.stds.get(i).copied().unwrap_or(1.0);
                (v - mean) / std
            })
            .collect()
    }

    /// Fit and scale the training rows in one pass
    pub fn fit_transform(&mut self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        self.fit(rows);
        rows.iter().map(|r| self.transform(r)).collect()
    }

    pub fn is_fitted(&self) -> bool {
        !self.means.is_empty()
    }
}
