//! Variance-reduction regression tree
//!
//! Axis-aligned splits chosen to minimize the summed squared error of the
//! two children. Leaves predict the mean label, so a tree fit on 0/1 labels
//! doubles as a probability estimator.

use super::LabeledSample;

/// Splits with less gain than this are not worth a node
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Depth-limited regression tree
#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Option<Node>,
    max_depth: usize,
    min_samples_split: usize,
}

impl DecisionTree {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            root: None,
            max_depth: max_depth.max(1),
            min_samples_split: min_samples_split.max(2),
        }
    }

    /// Fit the tree; an empty sample set leaves it unfitted
    pub fn fit(&mut self, samples: &[LabeledSample]) {
        if samples.is_empty() {
            self.root = None;
            return;
        }
        let indices: Vec<usize> = (0..samples.len()).collect();
        self.root = Some(self.build(samples, &indices, 0));
    }

    /// Predict the leaf mean for one feature row; `None` while unfitted
    pub fn predict(&self, features: &[f64]) -> Option<f64> {
        let mut node = self.root.as_ref()?;
        loop {
            match node {
                Node::Leaf { value } => return Some(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = features.get(*feature).copied().unwrap_or(0.0);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    fn build(&self, samples: &[LabeledSample], indices: &[usize], depth: usize) -> Node {
        let mean = label_mean(samples, indices);

        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || labels_uniform(samples, indices)
        {
            return Node::Leaf { value: mean };
        }

        let (feature, threshold) = match best_split(samples, indices) {
            Some(split) => split,
            None => return Node::Leaf { value: mean },
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| samples[i].features.get(feature).copied().unwrap_or(0.0) <= threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return Node::Leaf { value: mean };
        }

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(samples, &left_idx, depth + 1)),
            right: Box::new(self.build(samples, &right_idx, depth + 1)),
        }
    }
}

fn label_mean(samples: &[LabeledSample], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| samples[i].label).sum::<f64>() / indices.len() as f64
}

fn labels_uniform(samples: &[LabeledSample], indices: &[usize]) -> bool {
    let first = samples[indices[0]].label;
    indices.iter().all(|&i| samples[i].label == first)
}

/// Best (feature, threshold) by summed-squared-error reduction
///
/// Per feature: one sort, then a prefix-sum scan over candidate thresholds,
/// O(d · n log n) per node.
fn best_split(samples: &[LabeledSample], indices: &[usize]) -> Option<(usize, f64)> {
    let dim = samples[indices[0]].features.len();
    let n = indices.len() as f64;

    let total_sum: f64 = indices.iter().map(|&i| samples[i].label).sum();
    let total_sq: f64 = indices.iter().map(|&i| samples[i].label.powi(2)).sum();
    let parent_sse = total_sq - total_sum.powi(2) / n;

    let mut best: Option<(usize, f64, f64)> = None;

    for feature in 0..dim {
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| {
                (
                    samples[i].features.get(feature).copied().unwrap_or(0.0),
                    samples[i].label,
                )
            })
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for split_at in 1..pairs.len() {
            left_sum += pairs[split_at - 1].1;
            left_sq += pairs[split_at - 1].1.powi(2);

            // No threshold separates equal feature values
            if pairs[split_at].0 == pairs[split_at - 1].0 {
                continue;
            }

            let n_left = split_at as f64;
            let n_right = n - n_left;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;

            let sse = (left_sq - left_sum.powi(2) / n_left)
                + (right_sq - right_sum.powi(2) / n_right);
            let gain = parent_sse - sse;

            if gain > MIN_GAIN && best.map(|(_, _, g)| gain > g).unwrap_or(true) {
                let threshold = (pairs[split_at - 1].0 + pairs[split_at].0) / 2.0;
                best = Some((feature, threshold, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}
