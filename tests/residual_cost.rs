//! Public API tests for the residual cost model.

use std::sync::Arc;

use zenwebp_rdcost::{
    entropy_cost, get_cost_luma4, CoeffType, CostModel, ProbabilityModel, Residual,
    ResidualFixture, SharedCostModel,
};

const FIXTURE_V1: &[u8] = include_bytes!("fixtures/residual_v1.bin");

#[test]
fn entropy_cost_is_non_increasing() {
    let mut prev = u16::MAX;
    for p in 1..=255u8 {
        let cost = entropy_cost(p);
        assert!(cost <= prev, "cost({p}) = {cost} > {prev}");
        prev = cost;
    }
    assert_eq!(entropy_cost(255), 1);
    assert_eq!(entropy_cost(1), 2048);
}

#[test]
fn rebuild_twice_is_bit_identical() {
    let model = ProbabilityModel::default();
    let a = model.rebuild_cost_table();
    let b = model.rebuild_cost_table();
    assert!(a.same_as(&b));
}

#[test]
fn sample_block_last_and_cost() {
    let model = CostModel::default();
    let mut res = Residual::new(CoeffType::I4, &model);
    res.set_coeffs(&[110, 0, -2, 0, 0, 0, 0, 0, 0, -1, 0, 0, 0, 0, 0, 0]);
    assert_eq!(res.last(), 9);
    assert_eq!(res.residual_cost(0), 12181);
}

#[test]
fn regression_fixture_v1() {
    let fixture = ResidualFixture::from_bytes(FIXTURE_V1).unwrap();
    assert_eq!(fixture.coeff_type, CoeffType::I4);
    assert_eq!(fixture.first, 0);
    assert_eq!(fixture.ctx0, 0);
    assert_eq!(fixture.last, 12);
    assert_eq!(fixture.expected_cost, 26327);
    assert_eq!(fixture.evaluate(), fixture.expected_cost);

    // probabilities matter: the default table prices the same block differently
    let default_model = CostModel::default();
    let mut res = Residual::new(CoeffType::I4, &default_model);
    res.set_coeffs(&fixture.coeffs);
    assert_eq!(res.residual_cost(0), 25690);
}

#[test]
fn fixture_bytes_are_stable() {
    let fixture = ResidualFixture::from_bytes(FIXTURE_V1).unwrap();
    assert_eq!(fixture.to_bytes(), FIXTURE_V1);
}

#[test]
fn concurrent_readers_see_whole_snapshots() {
    let shared = Arc::new(SharedCostModel::default());
    let block = [3i16, -1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];

    let default_cost = get_cost_luma4(&block, false, false, &CostModel::default()).0;
    let next_probas =
        ProbabilityModel::default().with_probability(CoeffType::I4, 0, 0, 1, 250);
    let next_cost = get_cost_luma4(&block, false, false, &CostModel::new(next_probas.clone())).0;
    assert_ne!(default_cost, next_cost);

    std::thread::scope(|s| {
        for _ in 0..4 {
            let shared = Arc::clone(&shared);
            s.spawn(move || {
                for _ in 0..200 {
                    let (generation, model) = shared.load_with_generation();
                    let cost = get_cost_luma4(&block, false, false, &model).0;
                    let expected = if generation == 0 {
                        default_cost
                    } else {
                        next_cost
                    };
                    assert_eq!(cost, expected);
                }
            });
        }
        s.spawn(|| {
            shared.publish(next_probas.clone());
        });
    });

    assert_eq!(shared.generation(), 1);
    assert_eq!(
        get_cost_luma4(&block, false, false, &shared.load()).0,
        next_cost
    );
}
