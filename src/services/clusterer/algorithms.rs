//! Clustering primitives over precomputed distance matrices.
//!
//! Both algorithms take a symmetric distance matrix (D = 1 - similarity),
//! which keeps the feature-fusion pipeline independent of any point geometry.

use ndarray::Array2;

/// DBSCAN over a precomputed distance matrix. Returns one label per row;
/// noise points get -1. A point is core when its eps-neighborhood (self
/// included) holds at least `min_samples` points.
pub fn dbscan_precomputed(distances: &Array2<f64>, eps: f64, min_samples: usize) -> Vec<i64> {
    let n = distances.nrows();
    let mut labels = vec![-1i64; n];
    let mut visited = vec![false; n];
    let mut cluster_id = 0i64;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n).filter(|&j| distances[[i, j]] <= eps).collect()
    };

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seed = neighbors(i);
        if seed.len() < min_samples {
            continue; // noise unless adopted by a later cluster
        }

        labels[i] = cluster_id;
        let mut queue: Vec<usize> = seed;
        let mut head = 0;

        while head < queue.len() {
            let j = queue[head];
            head += 1;

            if labels[j] == -1 {
                labels[j] = cluster_id;
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;

            let j_neighbors = neighbors(j);
            if j_neighbors.len() >= min_samples {
                queue.extend(j_neighbors);
            }
        }

        cluster_id += 1;
    }

    labels
}

/// Agglomerative clustering with average linkage over a precomputed distance
/// matrix. Clusters merge while the smallest average inter-cluster distance
/// stays below `distance_threshold`. Returns the member index sets.
pub fn agglomerative_average(
    distances: &Array2<f64>,
    distance_threshold: f64,
) -> Vec<Vec<usize>> {
    let n = distances.nrows();
    if n == 0 {
        return Vec::new();
    }

    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    loop {
        if clusters.len() < 2 {
            break;
        }

        let mut best: Option<(usize, usize, f64)> = None;
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let d = average_distance(distances, &clusters[a], &clusters[b]);
                if best.is_none_or(|(_, _, current)| d < current) {
                    best = Some((a, b, d));
                }
            }
        }

        match best {
            Some((a, b, d)) if d < distance_threshold => {
                let merged = clusters.swap_remove(b);
                clusters[a].extend(merged);
            },
            _ => break,
        }
    }

    for members in &mut clusters {
        members.sort_unstable();
    }
    clusters
}

fn average_distance(distances: &Array2<f64>, a: &[usize], b: &[usize]) -> f64 {
    let mut total = 0.0;
    for &i in a {
        for &j in b {
            total += distances[[i, j]];
        }
    }
    total / (a.len() * b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn block_matrix() -> Array2<f64> {
        // two tight pairs far apart
        arr2(&[
            [0.0, 0.1, 0.9, 0.9],
            [0.1, 0.0, 0.9, 0.9],
            [0.9, 0.9, 0.0, 0.1],
            [0.9, 0.9, 0.1, 0.0],
        ])
    }

    #[test]
    fn dbscan_separates_blocks() {
        let labels = dbscan_precomputed(&block_matrix(), 0.4, 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        assert!(labels.iter().all(|&l| l >= 0));
    }

    #[test]
    fn dbscan_marks_isolated_points_as_noise() {
        let distances = arr2(&[[0.0, 0.9, 0.9], [0.9, 0.0, 0.9], [0.9, 0.9, 0.0]]);
        let labels = dbscan_precomputed(&distances, 0.4, 2);
        assert!(labels.iter().all(|&l| l == -1));
    }

    #[test]
    fn agglomerative_stops_at_threshold() {
        let clusters = agglomerative_average(&block_matrix(), 0.5);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().any(|c| c == &vec![0, 1]));
        assert!(clusters.iter().any(|c| c == &vec![2, 3]));
    }

    #[test]
    fn agglomerative_handles_single_row() {
        let distances = arr2(&[[0.0]]);
        let clusters = agglomerative_average(&distances, 0.5);
        assert_eq!(clusters, vec![vec![0]]);
    }

    #[test]
    fn identical_inputs_produce_identical_labels() {
        let labels_a = dbscan_precomputed(&block_matrix(), 0.4, 2);
        let labels_b = dbscan_precomputed(&block_matrix(), 0.4, 2);
        assert_eq!(labels_a, labels_b);
    }
}
