use ndarray::{array, Array1, Axis};
use pcm::{
    synthetic_blobs, ClassifierConfig, ClusterMethod, ProfileClassifier, ProfileSet,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Minimal end-to-end: cohort -> standardize -> reduce -> mixture -> labels.
    //
    // The cohort is synthetic so the demo is self-contained: three "water
    // mass" regimes, each a blob in a 5-level profile space (think
    // temperature at five depth levels).
    env_logger::init();

    let regimes = array![
        [18.0, 15.0, 9.0, 5.0, 3.0], // subtropical: warm surface, sharp decay
        [8.0, 7.0, 6.0, 5.0, 4.0],   // subpolar: cool, weakly stratified
        [12.0, 11.5, 10.0, 7.0, 4.5] // transition
    ];
    let (data, truth) = synthetic_blobs(&regimes, 0.6, 120, 42)?;

    // Coordinates only matter for downstream mapping; fake a track.
    let n = data.nrows();
    let lon = Array1::from_iter((0..n).map(|i| -60.0 + 0.05 * i as f64));
    let lat = Array1::from_iter((0..n).map(|i| 35.0 + 0.02 * i as f64));
    let cohort = ProfileSet::new(data, lon, lat)?;

    let config = ClassifierConfig {
        method: ClusterMethod::Gmm { k: 3 },
        variance_threshold: 0.999,
        seed: Some(42),
        ..Default::default()
    };

    let model = ProfileClassifier::fit(cohort.data(), &config)?;
    let summary = model.summary();

    println!(
        "retained {} components ({:.4} of variance), mixture converged: {}",
        summary.n_components, summary.cumulative_explained_variance, summary.converged
    );
    for (k, (count, centroid)) in summary
        .cluster_counts
        .iter()
        .zip(summary.centroids.axis_iter(Axis(0)))
        .enumerate()
    {
        println!("class {k}: {count} profiles, surface value {:.2}", centroid[0]);
    }

    let result = model.classify(cohort.data())?;
    let labels: Vec<usize> = result.labels().iter().map(|l| l.unwrap()).collect();
    println!("agreement with generating regimes: ari = {:.3}", pcm::ari(&labels, &truth));

    // Posteriors flag frontal profiles: anything without a dominant class.
    let posteriors = result.posteriors().expect("mixture path yields posteriors");
    let uncertain = posteriors
        .axis_iter(Axis(0))
        .filter(|row| row.iter().cloned().fold(f64::MIN, f64::max) < 0.8)
        .count();
    println!("{uncertain} of {n} profiles lack a dominant class (posterior < 0.8)");

    // First few labeled positions, as a mapping tool would consume them.
    for i in 0..3 {
        println!(
            "profile {i} at ({:.2}, {:.2}) -> class {:?}",
            cohort.lon()[i],
            cohort.lat()[i],
            result.labels()[i]
        );
    }

    Ok(())
}
