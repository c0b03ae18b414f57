use ndarray::{array, Array2};
use pcm::{synthetic_blobs, ClassifierConfig, ClusterMethod, ProfileClassifier};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Density path: let DBSCAN find the regimes and screen out anomalous
    // profiles instead of forcing every sample into a cluster.
    env_logger::init();

    let regimes = array![[14.0, 10.0, 6.0], [5.0, 4.0, 3.0]];
    let (blob, _) = synthetic_blobs(&regimes, 0.4, 80, 7)?;

    // Append a few corrupted profiles (sensor spikes).
    let n_good = blob.nrows();
    let mut data = Array2::zeros((n_good + 4, 3));
    data.slice_mut(ndarray::s![..n_good, ..]).assign(&blob);
    for (i, spike) in [60.0, -40.0, 95.0, -70.0].into_iter().enumerate() {
        data[[n_good + i, 0]] = spike;
        data[[n_good + i, 1]] = spike / 2.0;
        data[[n_good + i, 2]] = spike;
    }

    let config = ClassifierConfig {
        method: ClusterMethod::Dbscan {
            eps: 0.5,
            min_samples: 5,
        },
        ..Default::default()
    };
    let model = ProfileClassifier::fit(&data, &config)?;
    let summary = model.summary();

    println!(
        "found {} regimes, {} profiles flagged as noise",
        summary.n_clusters, summary.noise_count
    );
    for (k, count) in summary.cluster_counts.iter().enumerate() {
        println!("regime {k}: {count} profiles");
    }

    let result = model.classify(&data)?;
    let flagged: Vec<usize> = result
        .labels()
        .iter()
        .enumerate()
        .filter_map(|(i, l)| l.is_none().then_some(i))
        .collect();
    println!("noise indices: {flagged:?}");

    Ok(())
}
