use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::domain::{ClusteredRow, ClusteredTable, MetadataTable};
use crate::error::ClusterError;

pub const DEFAULT_CLUSTERS: usize = 3;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    pub clusters: usize,
    pub seed: u64,
    /// Independent k-means++ restarts; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative to the variance of the input.
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTERS,
            seed: DEFAULT_SEED,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<f64>,
    pub inertia: f64,
    pub iterations: usize,
}

/// Maps each distinct value to its first-appearance index: 0, 1, 2, ...
pub fn encode_hosts<'a, I>(hosts: I) -> Vec<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut codes: HashMap<&'a str, usize> = HashMap::new();
    hosts
        .into_iter()
        .map(|host| {
            let next = codes.len();
            *codes.entry(host).or_insert(next)
        })
        .collect()
}

/// Encodes the host column and assigns every row to one of `config.clusters` groups.
pub fn cluster_metadata(
    table: MetadataTable,
    config: &KMeansConfig,
) -> Result<ClusteredTable, ClusterError> {
    let encoded = encode_hosts(table.hosts());
    let points: Vec<f64> = encoded.iter().map(|code| *code as f64).collect();
    let distinct = encoded.iter().max().map(|max| max + 1).unwrap_or(0);
    if distinct < config.clusters && points.len() >= config.clusters {
        tracing::warn!(
            distinct,
            clusters = config.clusters,
            "fewer distinct hosts than clusters; some clusters will be empty"
        );
    }

    let fit = kmeans(&points, config)?;
    tracing::info!(
        rows = points.len(),
        clusters = config.clusters,
        inertia = fit.inertia,
        iterations = fit.iterations,
        "clustered hosts"
    );

    let rows = table
        .rows
        .into_iter()
        .zip(encoded)
        .zip(fit.labels)
        .map(|((row, host_encoded), cluster)| ClusteredRow {
            row,
            host_encoded,
            cluster,
        })
        .collect();
    Ok(ClusteredTable {
        clusters: config.clusters,
        rows,
    })
}

/// Seeded k-means over one-dimensional points.
pub fn kmeans(points: &[f64], config: &KMeansConfig) -> Result<KMeansFit, ClusterError> {
    let k = config.clusters;
    if k == 0 {
        return Err(ClusterError::InvalidClusterCount);
    }
    if points.len() < k {
        return Err(ClusterError::TooFewSamples {
            samples: points.len(),
            clusters: k,
        });
    }

    let threshold = config.tolerance * variance(points);
    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let mut best: Option<KMeansFit> = None;
    for _ in 0..config.n_init.max(1) {
        let centroids = kmeans_plus_plus(points, k, &mut rng);
        let fit = lloyd(points, centroids, config.max_iter, threshold);
        if best
            .as_ref()
            .is_none_or(|current| fit.inertia < current.inertia)
        {
            best = Some(fit);
        }
    }
    best.ok_or(ClusterError::InvalidClusterCount)
}

fn kmeans_plus_plus(points: &[f64], k: usize, rng: &mut ChaCha20Rng) -> Vec<f64> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    let mut distances: Vec<f64> = points
        .iter()
        .map(|point| (point - centroids[0]).powi(2))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let index = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0_f64;
            distances
                .iter()
                .position(|distance| {
                    cumulative += *distance;
                    cumulative > target
                })
                .unwrap_or(points.len() - 1)
        } else {
            rng.gen_range(0..points.len())
        };
        let centroid = points[index];
        centroids.push(centroid);
        for (distance, point) in distances.iter_mut().zip(points) {
            *distance = distance.min((point - centroid).powi(2));
        }
    }
    centroids
}

fn lloyd(points: &[f64], mut centroids: Vec<f64>, max_iter: usize, threshold: f64) -> KMeansFit {
    let mut labels = assign(points, &centroids);
    let mut iterations = 0;
    while iterations < max_iter {
        iterations += 1;
        let updated = recompute(points, &labels, &centroids);
        let shift: f64 = updated
            .iter()
            .zip(&centroids)
            .map(|(new, old)| (new - old).powi(2))
            .sum();
        centroids = updated;
        let next = assign(points, &centroids);
        let stable = next == labels;
        labels = next;
        if stable || shift <= threshold {
            break;
        }
    }

    let inertia: f64 = points
        .iter()
        .zip(&labels)
        .map(|(point, label)| (point - centroids[*label]).powi(2))
        .sum();
    KMeansFit {
        labels,
        centroids,
        inertia,
        iterations,
    }
}

/// Nearest centroid per point; ties go to the lower label.
fn assign(points: &[f64], centroids: &[f64]) -> Vec<usize> {
    points
        .iter()
        .map(|point| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (label, centroid) in centroids.iter().enumerate() {
                let distance = (point - centroid).powi(2);
                if distance < best_distance {
                    best = label;
                    best_distance = distance;
                }
            }
            best
        })
        .collect()
}

/// Empty clusters keep their previous centroid.
fn recompute(points: &[f64], labels: &[usize], centroids: &[f64]) -> Vec<f64> {
    let mut sums = vec![0.0_f64; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (point, label) in points.iter().zip(labels) {
        sums[*label] += *point;
        counts[*label] += 1;
    }
    sums.iter()
        .zip(&counts)
        .zip(centroids)
        .map(|((sum, count), previous)| {
            if *count == 0 {
                *previous
            } else {
                sum / *count as f64
            }
        })
        .collect()
}

fn variance(points: &[f64]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean = points.iter().sum::<f64>() / n;
    points.iter().map(|point| (point - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_breaks_ties_toward_lower_label() {
        assert_eq!(assign(&[1.0, 2.0], &[1.0, 1.0, 3.0]), vec![0, 0]);
    }

    #[test]
    fn recompute_keeps_empty_centroid() {
        let centroids = recompute(&[0.0, 2.0], &[0, 0], &[1.0, 9.0]);
        assert_eq!(centroids, vec![1.0, 9.0]);
    }

    #[test]
    fn plus_plus_picks_distinct_seeds_when_possible() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut centroids = kmeans_plus_plus(&[0.0, 0.0, 5.0, 10.0], 3, &mut rng);
        centroids.sort_by(f64::total_cmp);
        assert_eq!(centroids, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn variance_of_constant_is_zero() {
        assert_eq!(variance(&[2.0, 2.0, 2.0]), 0.0);
    }
}
