//! Bagged ensemble of regression trees
//!
//! Bootstrap-sampled trees averaged at inference. With 0/1 labels the
//! averaged output is a class probability; with numeric labels it is a
//! smoothed regression estimate.

use super::{DecisionTree, LabeledSample, Lcg};

/// Ensemble of depth-limited regression trees
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_trees: usize,
    max_depth: usize,
    sample_ratio: f64,
    seed: u64,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_trees: n_trees.max(1),
            max_depth,
            sample_ratio: 0.8,
            seed: 42,
        }
    }

    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit the ensemble on bootstrap samples; empty input leaves it unfitted
    pub fn fit(&mut self, samples: &[LabeledSample]) {
        self.trees.clear();
        if samples.is_empty() {
            return;
        }

        let mut rng = Lcg::new(self.seed);
        let sample_size = ((samples.len() as f64 * self.sample_ratio) as usize).max(1);

        for _ in 0..self.n_trees {
            let bootstrap: Vec<LabeledSample> = (0..sample_size)
                .map(|_| samples[rng.next() as usize % samples.len()].clone())
                .collect();

            let mut tree = DecisionTree::new(self.max_depth, 2);
            tree.fit(&bootstrap);
            self.trees.push(tree);
        }
    }

    /// Mean prediction across the ensemble; `None` while unfitted
    pub fn predict(&self, features: &[f64]) -> Option<f64> {
        if self.trees.is_empty() {
            return None;
        }
        let outputs: Vec<f64> = self
            .trees
            .iter()
            .filter_map(|t| t.predict(features))
            .collect();
        if outputs.is_empty() {
            return None;
        }
        Some(outputs.iter().sum::<f64>() / outputs.len() as f64)
    }

    pub fn is_fitted(&self) -> bool {
        self.trees.iter().any(|t| t.is_fitted())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(10, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_samples(n: usize) -> Vec<LabeledSample> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                LabeledSample::new(vec![x], if x > n as f64 / 2.0 { 100.0 } else { 10.0 })
            })
            .collect()
    }

    #[test]
    fn test_unfitted_predicts_none() {
        let forest = RandomForest::default();
        assert!(forest.predict(&[1.0]).is_none());
    }

    #[test]
    fn test_fit_and_predict_threshold_rule() {
        let mut forest = RandomForest::new(10, 4);
        forest.fit(&threshold_samples(40));

        assert!(forest.is_fitted());
        assert_eq!(forest.n_trees(), 10);
        assert!(forest.predict(&[2.0]).unwrap() < 55.0);
        assert!(forest.predict(&[38.0]).unwrap() > 55.0);
    }

    #[test]
    fn test_binary_labels_average_to_probability() {
        let samples: Vec<LabeledSample> = (0..40)
            .map(|i| {
                let x = i as f64;
                LabeledSample::new(vec![x], if x > 20.0 { 1.0 } else { 0.0 })
            })
            .collect();
        let mut forest = RandomForest::new(10, 4);
        forest.fit(&samples);

        let p_low = forest.predict(&[1.0]).unwrap();
        let p_high = forest.predict(&[39.0]).unwrap();
        assert!((0.0..=1.0).contains(&p_low));
        assert!((0.0..=1.0).contains(&p_high));
        assert!(p_high > p_low);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let samples = threshold_samples(30);
        let mut a = RandomForest::new(5, 3).with_seed(7);
        let mut b = RandomForest::new(5, 3).with_seed(7);
        a.fit(&samples);
        b.fit(&samples);

        for x in [1.0, 10.0, 20.0, 29.0] {
            assert_eq!(a.predict(&[x]), b.predict(&[x]));
        }
    }

    #[test]
    fn test_empty_fit_stays_unfitted() {
        let mut forest = RandomForest::default();
        forest.fit(&[]);
        assert!(!forest.is_fitted());
        assert!(forest.predict(&[0.0]).is_none());
    }
}
