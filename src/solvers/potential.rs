use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};

use crate::network::Network;

// All functions here expect a flow matrix already checked by `Network::validate_flow`.

/// Per-node, per-commodity height: demand, minus outgoing flow, plus incoming flow.
pub fn calculate_heights(network: &Network, flow: ArrayView2<f64>) -> Array2<f64> {
    let mut heights = network.demand().clone();
    for (edge, &(source, target)) in network.endpoints().iter().enumerate() {
        for (commodity, &value) in flow.row(edge).iter().enumerate() {
            heights[[source, commodity]] -= value;
            heights[[target, commodity]] += value;
        }
    }
    heights
}

/// Per-edge amount by which total flow exceeds capacity, clamped at zero.
pub fn calculate_congestion(network: &Network, flow: ArrayView2<f64>) -> Array1<f64> {
    let mut congestion = flow.sum_axis(Axis(1));
    for (edge, total) in congestion.iter_mut().enumerate() {
        *total = (*total - network.capacity(edge)).max(0.0);
    }
    congestion
}

/// Driving force on every (edge, commodity):
/// `height[source] - height[target] - congestion[edge]`.
pub fn calculate_potential_difference(network: &Network, flow: ArrayView2<f64>) -> Array2<f64> {
    let heights = calculate_heights(network, flow);
    let congestion = calculate_congestion(network, flow);
    let mut potential_difference = Array2::zeros(flow.raw_dim());
    for (edge, mut row) in potential_difference.axis_iter_mut(Axis(0)).enumerate() {
        let (source, target) = network.endpoints()[edge];
        Zip::from(&mut row)
            .and(heights.row(source))
            .and(heights.row(target))
            .for_each(|pd, &h_source, &h_target| {
                *pd = h_source - h_target - congestion[edge];
            });
    }
    potential_difference
}

/// Same as [`calculate_potential_difference`], with the per-edge work spread over rayon.
/// Heights are still accumulated sequentially since edges scatter into shared nodes.
pub fn par_calculate_potential_difference(
    network: &Network,
    flow: ArrayView2<f64>,
) -> Array2<f64> {
    let heights = calculate_heights(network, flow);
    let endpoints = network.endpoints();
    let mut potential_difference = Array2::zeros(flow.raw_dim());
    potential_difference
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(flow.axis_iter(Axis(0)).into_par_iter())
        .enumerate()
        .for_each(|(edge, (mut row, flow_row))| {
            let (source, target) = endpoints[edge];
            let congestion = (flow_row.sum() - network.capacity(edge)).max(0.0);
            for (commodity, pd) in row.iter_mut().enumerate() {
                *pd = heights[[source, commodity]] - heights[[target, commodity]] - congestion;
            }
        });
    potential_difference
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::random_instance;
    use crate::network::NetworkBuilder;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn single_edge(capacity: f64) -> Network {
        let mut builder = NetworkBuilder::new(["a"]).unwrap();
        builder.add_node("s", &[("a", 3.0)]).unwrap();
        builder.add_node("t", &[("a", -3.0)]).unwrap();
        builder.add_edge("s", "t", capacity).unwrap();
        builder.build()
    }

    fn random_flow(network: &Network, rng: &mut StdRng) -> Array2<f64> {
        Array2::from_shape_fn(
            (network.edge_count(), network.commodity_count()),
            |_| rng.gen_range(0.0..4.0),
        )
    }

    #[test]
    fn test_single_edge_values() {
        let network = single_edge(1.0);
        let flow = Array2::from_elem((1, 1), 2.0);

        let heights = calculate_heights(&network, flow.view());
        assert_relative_eq!(heights[[0, 0]], 1.0);
        assert_relative_eq!(heights[[1, 0]], -1.0);

        let congestion = calculate_congestion(&network, flow.view());
        assert_relative_eq!(congestion[0], 1.0);

        // 1 - (-1) - 1
        let pd = calculate_potential_difference(&network, flow.view());
        assert_relative_eq!(pd[[0, 0]], 1.0);
    }

    #[test]
    fn test_heights_sum_to_demand() {
        let mut rng = StdRng::seed_from_u64(7);
        for seed in 0..10 {
            let (network, _) = random_instance(12, 0.3, 3, seed).unwrap();
            let flow = random_flow(&network, &mut rng);
            let heights = calculate_heights(&network, flow.view());
            let height_sums = heights.sum_axis(Axis(0));
            let demand_sums = network.demand_balance();
            for (h, d) in height_sums.iter().zip(demand_sums.iter()) {
                assert_relative_eq!(*h, *d, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_congestion_is_nonnegative() {
        let mut rng = StdRng::seed_from_u64(11);
        let (network, _) = random_instance(15, 0.25, 2, 3).unwrap();
        for _ in 0..20 {
            let flow = random_flow(&network, &mut rng);
            let congestion = calculate_congestion(&network, flow.view());
            assert!(congestion.iter().all(|&c| c >= 0.0));
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(5);
        let (network, _) = random_instance(30, 0.1, 4, 9).unwrap();
        let flow = random_flow(&network, &mut rng);

        let sequential = calculate_potential_difference(&network, flow.view());
        let parallel = par_calculate_potential_difference(&network, flow.view());
        assert_eq!(sequential.dim(), parallel.dim());
        for (a, b) in sequential.iter().zip(parallel.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
