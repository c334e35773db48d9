use crate::{
    distortion::Distortion,
    lines::TrainingSet,
    pmf::Symbol,
};

/// Iteration cap for k-means.
pub const MAX_KMEANS_ITER: usize = 1000;


/// One cohort of similar training lines. Means are integer-valued
/// (floor of the column average), so they live in the symbol alphabet.
pub struct Cluster {
    pub id:     u8,
    pub mean:   Vec<Symbol>,
    pub count:  u64,  // Member lines after the last pass
}

/// K-means clustering over training lines, with distance measured by
/// the distortion table summed across columns. Every training line
/// belongs to exactly one cluster; lines outside the training prefix
/// are assigned to the nearest mean at coding time.
pub struct ClusterSet {
    pub clusters:     Vec<Cluster>,
    pub assignments:  Vec<u8>,  // Cluster id per training line
}
impl ClusterSet {
    /// Run k-means over the training set. Initial means are k lines
    /// picked uniformly at random; a pass that changes no assignment
    /// terminates the loop.
    pub fn train(data: &TrainingSet, dist: &Distortion, k: usize, verbose: bool) -> ClusterSet {
        let columns = data.columns;
        let line_count = data.lines as usize;
        let all_lines: Vec<&[Symbol]> = data.iter().collect();

        let mut clusters: Vec<Cluster> = (0..k).map(|id| {
            let pick = fastrand::usize(0..line_count.max(1));
            Cluster {
                id:     id as u8,
                mean:   all_lines.get(pick).map_or(vec![0; columns], |l| l.to_vec()),
                count:  0,
            }
        }).collect();

        let mut assignments = vec![0u8; line_count];
        let mut sums = vec![0u64; k * columns];
        let mut iter = 0;
        let mut changed = true;

        while changed && iter < MAX_KMEANS_ITER {
            changed = false;
            iter += 1;

            for cluster in clusters.iter_mut() {
                cluster.count = 0;
            }
            for sum in sums.iter_mut() {
                *sum = 0;
            }

            // Reassign every line to its nearest mean, accumulating
            // column sums for the mean update.
            for (i, line) in all_lines.iter().enumerate() {
                let id = nearest(&clusters, line, dist);
                if assignments[i] != id {
                    changed = true;
                    assignments[i] = id;
                }
                clusters[id as usize].count += 1;
                let base = id as usize * columns;
                for (j, &sym) in line.iter().enumerate() {
                    sums[base + j] += sym as u64;
                }
            }

            // Integer means; an empty cluster keeps its previous mean.
            for cluster in clusters.iter_mut() {
                if cluster.count == 0 {
                    continue;
                }
                let base = cluster.id as usize * columns;
                for j in 0..columns {
                    cluster.mean[j] = (sums[base + j] / cluster.count) as Symbol;
                }
            }
        }

        if verbose {
            println!("Clustering finished after {} iterations.", iter);
        }

        ClusterSet { clusters, assignments }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Nearest cluster id for a line, used for every coded line.
    pub fn assign(&self, line: &[Symbol], dist: &Distortion) -> u8 {
        nearest(&self.clusters, line, dist)
    }
}

/// Cluster id minimizing the distortion-table distance to the line.
/// Ties break toward the lowest id.
fn nearest(clusters: &[Cluster], line: &[Symbol], dist: &Distortion) -> u8 {
    let mut id = 0;
    let mut best = f64::MAX;
    for cluster in clusters.iter() {
        let mut d = 0.0;
        for (&sym, &mean) in line.iter().zip(cluster.mean.iter()) {
            d += dist.get(sym as usize, mean as usize);
        }
        if d < best {
            best = d;
            id = cluster.id;
        }
    }
    id
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::DistortionKind;
    use crate::lines::TrainingSet;
    use std::{env, fs};

    fn write_two_families(path: &std::path::Path, columns: usize, per_family: usize) {
        fastrand::seed(21);
        let mut contents = Vec::new();
        for family_mean in [10i32, 30].iter() {
            for _ in 0..per_family {
                for _ in 0..columns {
                    let noise = fastrand::i32(-1..=1);
                    contents.push((family_mean + noise + 33) as u8);
                }
                contents.push(b'\n');
            }
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn separates_two_line_families() {
        let path = env::temp_dir().join("qvpack_cluster_families.txt");
        write_two_families(&path, 10, 200);
        let data = TrainingSet::load(&path, 0).unwrap();
        let dist = Distortion::new(41, DistortionKind::Mse);

        fastrand::seed(22);
        let set = ClusterSet::train(&data, &dist, 2, false);

        // Every line of the first family lands in one cluster, every
        // line of the second in the other.
        let first = set.assignments[0];
        let second = set.assignments[200];
        assert_ne!(first, second);
        assert!(set.assignments[..200].iter().all(|&id| id == first));
        assert!(set.assignments[200..].iter().all(|&id| id == second));

        // Means recover the true family means within 2.
        for (id, truth) in [(first, 10i32), (second, 30)].iter() {
            let mean = &set.clusters[*id as usize].mean;
            assert!(mean.iter().all(|&m| (m as i32 - truth).abs() <= 2));
        }

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn single_cluster_takes_everything() {
        let path = env::temp_dir().join("qvpack_cluster_single.txt");
        fs::write(&path, b"%%%%\n&&&&\n''''\n").unwrap();
        let data = TrainingSet::load(&path, 0).unwrap();
        let dist = Distortion::new(41, DistortionKind::Mse);

        let set = ClusterSet::train(&data, &dist, 1, false);
        assert_eq!(set.len(), 1);
        assert_eq!(set.clusters[0].count, 3);
        assert!(set.assignments.iter().all(|&id| id == 0));

        fs::remove_file(&path).unwrap();
    }
}
