use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Upper bound on the sub-sample each tree is grown from.
pub const MAX_SAMPLES: usize = 256;

/// Expected path length of an unsuccessful search in a binary search tree
/// built from `n` points; used to normalise depths.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(mut samples: Vec<f64>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(&mut samples, 0, max_depth, rng);
        tree
    }

    fn grow_node(&mut self, samples: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { size: samples.len() });

        if samples.len() < 2 || depth >= max_depth {
            return idx;
        }

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if min >= max {
            return idx;
        }

        let mut threshold = rng.gen_range(min..max);
        if threshold >= max {
            threshold = min;
        }

        let split = partition(samples, threshold);
        let (left_samples, right_samples) = samples.split_at_mut(split);
        let left = self.grow_node(left_samples, depth + 1, max_depth, rng);
        let right = self.grow_node(right_samples, depth + 1, max_depth, rng);
        self.nodes[idx] = Node::Split { threshold, left, right };

        idx
    }

    /// Depth of the leaf reached by `x`, plus the expected remaining depth
    /// for the points that leaf still holds.
    fn path_length(&self, x: f64) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split { threshold, left, right } => {
                    idx = if x <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Moves values `<= threshold` to the front; returns how many there are.
fn partition(samples: &mut [f64], threshold: f64) -> usize {
    let mut split = 0;
    for i in 0..samples.len() {
        if samples[i] <= threshold {
            samples.swap(i, split);
            split += 1;
        }
    }
    split
}

/// Isolation forest over a single feature.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
}

impl IsolationForest {
    /// Grow `n_estimators` trees. The generator is seeded from `seed` and
    /// lives only for the duration of this call.
    pub fn fit(values: &[f64], n_estimators: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_samples = values.len().min(MAX_SAMPLES);
        let max_depth = (max_samples.max(2) as f64).log2().ceil() as usize;

        let trees = (0..n_estimators)
            .map(|_| {
                let sample: Vec<f64> = if max_samples < values.len() {
                    index::sample(&mut rng, values.len(), max_samples)
                        .into_iter()
                        .map(|i| values[i])
                        .collect()
                } else {
                    values.to_vec()
                };
                IsolationTree::grow(sample, max_depth, &mut rng)
            })
            .collect();

        Self { trees, max_samples }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Raw anomaly score per value in `[-1, 0)`; lower is more anomalous.
    pub fn score_samples(&self, values: &[f64]) -> Vec<f64> {
        let norm = average_path_length(self.max_samples);
        let trees = self.trees.len().max(1) as f64;

        values
            .iter()
            .map(|&x| {
                let mean_depth = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / trees;
                let ratio = if norm > 0.0 { mean_depth / norm } else { 1.0 };
                -(2f64.powf(-ratio))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_path_length_matches_closed_form() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.2448).abs() < 1e-3, "c(256) = {c256}");
    }

    #[test]
    fn partition_puts_low_values_first() {
        let mut values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let split = partition(&mut values, 2.5);
        assert_eq!(split, 2);
        assert!(values[..split].iter().all(|&v| v <= 2.5));
        assert!(values[split..].iter().all(|&v| v > 2.5));
    }

    #[test]
    fn isolated_value_has_shorter_paths_than_the_cluster() {
        let mut values = vec![0.0; 40];
        values.push(8.0);

        let forest = IsolationForest::fit(&values, 50, 7);
        let scores = forest.score_samples(&[0.0, 8.0]);
        assert_eq!(forest.tree_count(), 50);
        assert!(scores[1] < scores[0]);
    }

    #[test]
    fn subsamples_large_inputs() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let forest = IsolationForest::fit(&values, 10, 1);
        assert_eq!(forest.max_samples, MAX_SAMPLES);
        let scores = forest.score_samples(&values);
        assert!(scores.iter().all(|s| (-1.0..0.0).contains(s)));
    }

    #[test]
    fn single_point_scores_half() {
        let forest = IsolationForest::fit(&[3.0], 5, 0);
        assert_eq!(forest.score_samples(&[3.0]), vec![-0.5]);
    }
}
