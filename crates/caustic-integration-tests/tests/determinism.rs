//! The parallel engine must reproduce the sequential catalog exactly for
//! any worker count.

use caustic_fragment::{FilamentCriterion, FragmentationEngine, FragmentationSettings, MergeCriterion, ParallelEngine};
use caustic_integration_tests::{growth, lattice, points_from, settings};
use caustic_lattice::Connectivity;
use proptest::prelude::*;

fn scattered_times(n: usize) -> Vec<Option<f64>> {
    (0..n * n * n)
        .map(|i| {
            let h = (i * 2654435761) % 1000;
            (h < 700).then(|| 0.1 + (h / 10) as f64 / 100.0)
        })
        .collect()
}

async fn compare(n: usize, connectivity: Connectivity, times: &[Option<f64>], settings: FragmentationSettings, workers: &[usize]) {
    let lattice = lattice(n, connectivity);
    let box_size = 3.0 * n as f64;
    let sequential = FragmentationEngine::new(lattice.clone(), box_size, growth(), settings.clone())
        .unwrap()
        .run(points_from(n, times))
        .unwrap();
    for &w in workers {
        let parallel = ParallelEngine::new(lattice.clone(), box_size, growth(), settings.clone(), w)
            .unwrap()
            .run(points_from(n, times))
            .await
            .unwrap();
        assert_eq!(parallel.catalogs, sequential.catalogs, "{w} workers");
        assert_eq!(parallel.membership, sequential.membership, "{w} workers");
        for (a, b) in parallel.catalogs.iter().zip(&sequential.catalogs) {
            assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }
}

#[tokio::test]
async fn one_two_and_eight_workers_agree() {
    let n = 8;
    compare(n, Connectivity::Faces, &scattered_times(n), settings(3), &[1, 2, 8]).await;
}

#[tokio::test]
async fn wider_stencils_agree() {
    let n = 8;
    let times = scattered_times(n);
    for connectivity in [Connectivity::FacesEdges, Connectivity::Full] {
        compare(n, connectivity, &times, settings(5), &[2, 4, 8]).await;
    }
}

#[tokio::test]
async fn strict_predicates_agree() {
    let n = 8;
    let strict = FragmentationSettings {
        merge: MergeCriterion::Proximity { factor: 1.0 },
        filament: FilamentCriterion::Anisotropy { max_ratio: 0.3 },
        ..settings(2)
    };
    compare(n, Connectivity::Faces, &scattered_times(n), strict, &[2, 3, 8]).await;

    let coeval = FragmentationSettings {
        merge: MergeCriterion::Coeval { max_gap: 0.1 },
        ..settings(2)
    };
    compare(n, Connectivity::Faces, &scattered_times(n), coeval, &[2, 8]).await;
}

#[tokio::test]
async fn single_batch_agrees() {
    let n = 6;
    let one_batch = FragmentationSettings {
        batch_count: 1,
        ..settings(2)
    };
    compare(n, Connectivity::Faces, &scattered_times(n), one_batch, &[3, 6]).await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_fields_agree(
        times in prop::collection::vec(prop::option::weighted(0.7, 0.05f64..1.0), 216),
        workers in 2usize..=6,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(compare(6, Connectivity::Faces, &times, settings(2), &[workers]));
    }
}
