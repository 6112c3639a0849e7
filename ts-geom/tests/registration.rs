use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use ts_core::{
    nalgebra::{Point3, Rotation3, Vector3},
    Pose, StationToStation,
};
use ts_geom::point_to_point;

const TRIALS: usize = 200;
const SAMPLE_POINTS: usize = 12;
const POINT_BOX_SIZE: f64 = 10.0;
const NOISE: f64 = 0.002;

fn random_vector(rng: &mut impl Rng, half_extent: f64) -> Vector3<f64> {
    Vector3::new(
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
    )
}

fn random_pose(rng: &mut impl Rng) -> StationToStation {
    StationToStation::from_parts(
        random_vector(rng, 20.0),
        Rotation3::new(random_vector(rng, 1.5)),
    )
}

fn random_points(rng: &mut impl Rng) -> Vec<Point3<f64>> {
    (0..SAMPLE_POINTS)
        .map(|_| Point3::from(random_vector(rng, 0.5 * POINT_BOX_SIZE)))
        .collect()
}

#[test]
fn exact_recovery() {
    let mut rng = Pcg64::seed_from_u64(0);
    for _ in 0..TRIALS {
        let pose = random_pose(&mut rng);
        let source = random_points(&mut rng);
        let target: Vec<_> = source.iter().map(|&p| pose.transform(p)).collect();
        let estimate = point_to_point(&source, &target).expect("registration failed");
        assert_relative_eq!(estimate.homogeneous(), pose.homogeneous(), epsilon = 1e-9);
    }
}

#[test]
fn noisy_recovery_is_close() {
    let mut rng = Pcg64::seed_from_u64(1);
    for _ in 0..TRIALS {
        let pose = random_pose(&mut rng);
        let source = random_points(&mut rng);
        let target: Vec<_> = source
            .iter()
            .map(|&p| pose.transform(p) + random_vector(&mut rng, NOISE))
            .collect();
        let estimate = point_to_point(&source, &target).expect("registration failed");
        for (&p, &q) in source.iter().zip(&target) {
            assert!((estimate.transform(p) - q).norm() < 10.0 * NOISE);
        }
    }
}

#[test]
fn reflected_targets_give_proper_rotations() {
    let mut rng = Pcg64::seed_from_u64(2);
    for _ in 0..TRIALS {
        let pose = random_pose(&mut rng);
        let source = random_points(&mut rng);
        let target: Vec<_> = source
            .iter()
            .map(|&p| {
                let q = pose.transform(p);
                Point3::new(-q.x, q.y, q.z)
            })
            .collect();
        let estimate = point_to_point(&source, &target).expect("registration failed");
        let rotation = estimate.isometry().rotation;
        assert_relative_eq!(rotation.matrix().determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            rotation.matrix().transpose() * rotation.matrix(),
            ts_core::nalgebra::Matrix3::identity(),
            epsilon = 1e-9
        );
    }
}
