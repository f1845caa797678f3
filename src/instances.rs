use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::FlowError;
use crate::network::{FlowMatrix, Network, NetworkBuilder};

pub const RANDOM_DEMAND: f64 = 3.0;

/// Two commodities (`b`, `r`) routed through a four-layer network of capacity-2 edges.
///
/// Each source supplies 3 units to its matching sink, so every sink is fed
/// through two disjoint middle nodes.
pub fn two_commodity_example() -> Result<(Network, FlowMatrix), FlowError> {
    let mut builder = NetworkBuilder::new(["b", "r"])?;

    builder.add_node("s_b", &[("b", 3.0), ("r", 0.0)])?;
    builder.add_node("s_r", &[("b", 0.0), ("r", 3.0)])?;
    for middle in ["1", "3", "2", "4"] {
        builder.add_node(middle, &[])?;
    }
    builder.add_node("t_b", &[("b", -3.0), ("r", 0.0)])?;
    builder.add_node("t_r", &[("b", 0.0), ("r", -3.0)])?;

    let edges = [
        ("s_b", "1"),
        ("s_b", "3"),
        ("s_r", "1"),
        ("s_r", "3"),
        ("1", "2"),
        ("1", "4"),
        ("3", "2"),
        ("3", "4"),
        ("2", "t_b"),
        ("2", "t_r"),
        ("4", "t_b"),
        ("4", "t_r"),
    ];
    for (source, target) in edges {
        builder.add_edge(source, target, 2.0)?;
    }

    let network = builder.build();
    let flow = network.zero_flow();
    Ok((network, flow))
}

/// Random directed G(n, p) instance.
///
/// Every ordered pair of distinct nodes gets an edge with probability
/// `edge_probability` and an integer capacity drawn from `1..=5`. Each
/// commodity `c{i}` gets +3 at a random source and -3 at a different random sink.
pub fn random_instance(
    num_nodes: usize,
    edge_probability: f64,
    num_commodities: usize,
    seed: u64,
) -> Result<(Network, FlowMatrix), FlowError> {
    if num_nodes < 2 {
        return Err(FlowError::InvalidConfig(format!(
            "random instances need at least two nodes, got {}",
            num_nodes
        )));
    }
    if !(0.0..=1.0).contains(&edge_probability) {
        return Err(FlowError::InvalidConfig(format!(
            "edge probability must lie in [0, 1], got {}",
            edge_probability
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let commodities: Vec<String> = (0..num_commodities).map(|i| format!("c{}", i)).collect();
    let mut builder = NetworkBuilder::new(commodities.iter().cloned())?;

    let names: Vec<String> = (0..num_nodes).map(|i| i.to_string()).collect();
    for name in &names {
        builder.add_node(name, &[])?;
    }

    for source in 0..num_nodes {
        for target in 0..num_nodes {
            if source != target && rng.gen_bool(edge_probability) {
                let capacity = rng.gen_range(1..=5) as f64;
                builder.add_edge(&names[source], &names[target], capacity)?;
            }
        }
    }

    for commodity in &commodities {
        let source = rng.gen_range(0..num_nodes);
        let mut sink = rng.gen_range(0..num_nodes - 1);
        if sink >= source {
            sink += 1;
        }
        builder.add_demand(&names[source], commodity, RANDOM_DEMAND)?;
        builder.add_demand(&names[sink], commodity, -RANDOM_DEMAND)?;
    }

    let network = builder.build();
    let flow = network.zero_flow();
    Ok((network, flow))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_commodity_example_shape() {
        let (network, flow) = two_commodity_example().unwrap();
        assert_eq!(network.node_count(), 8);
        assert_eq!(network.edge_count(), 12);
        assert_eq!(network.commodities(), &["b".to_string(), "r".to_string()]);
        assert_eq!(flow.dim(), (12, 2));
        assert!(network.demand_balance().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_random_instance_is_balanced_and_loop_free() {
        for seed in 0..20 {
            let (network, flow) = random_instance(10, 0.3, 3, seed).unwrap();
            assert_eq!(network.node_count(), 10);
            assert_eq!(flow.dim(), (network.edge_count(), 3));
            assert!(network.endpoints().iter().all(|(s, t)| s != t));
            assert!(network.demand_balance().iter().all(|&b| b == 0.0));
            for edge in 0..network.edge_count() {
                let capacity = network.capacity(edge);
                assert!((1.0..=5.0).contains(&capacity));
            }
        }
    }

    #[test]
    fn test_random_instance_is_reproducible() {
        let (a, _) = random_instance(20, 0.2, 2, 99).unwrap();
        let (b, _) = random_instance(20, 0.2, 2, 99).unwrap();
        assert_eq!(a.endpoints(), b.endpoints());
        assert_eq!(a.demand(), b.demand());
    }

    #[test]
    fn test_random_instance_rejects_degenerate_sizes() {
        assert!(random_instance(1, 0.5, 1, 0).is_err());
        assert!(random_instance(5, 1.5, 1, 0).is_err());
    }
}
