use ndarray::Array2;
use serde::Serialize;

use crate::network::{FlowMatrix, Network};
use crate::solvers::potential::calculate_congestion;

/// Flow rounded to two decimals, for display.
pub fn rounded_flow(flow: &FlowMatrix) -> Array2<f64> {
    flow.mapv(|value| (value * 100.0).round() / 100.0)
}

pub fn total_flow(flow: &FlowMatrix) -> f64 {
    flow.sum()
}

/// Largest ratio of total edge flow to capacity. Infinite if a zero-capacity edge carries flow.
pub fn max_congestion_ratio(network: &Network, flow: &FlowMatrix) -> f64 {
    let mut max_congestion = 0.0f64;
    for (edge, row) in flow.rows().into_iter().enumerate() {
        let edge_flow = row.sum();
        let capacity = network.capacity(edge);
        if capacity > 1e-9 {
            max_congestion = max_congestion.max(edge_flow / capacity);
        } else if edge_flow > 1e-9 {
            return f64::INFINITY;
        }
    }
    max_congestion
}

#[derive(Debug, Clone, Serialize)]
pub struct CommodityFlow {
    pub commodity: String,
    pub flow: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeFlowRecord {
    pub source: String,
    pub target: String,
    pub capacity: f64,
    pub congestion: f64,
    pub flows: Vec<CommodityFlow>,
}

/// Per-edge view of a flow snapshot with rounded values, for consumers that label edges.
pub fn edge_flow_records(network: &Network, flow: &FlowMatrix) -> Vec<EdgeFlowRecord> {
    let rounded = rounded_flow(flow);
    let congestion = calculate_congestion(network, flow.view());
    network
        .endpoints()
        .iter()
        .enumerate()
        .map(|(edge, &(source, target))| EdgeFlowRecord {
            source: network.node_name(source).to_string(),
            target: network.node_name(target).to_string(),
            capacity: network.capacity(edge),
            congestion: congestion[edge],
            flows: network
                .commodities()
                .iter()
                .zip(rounded.row(edge).iter())
                .map(|(commodity, &flow)| CommodityFlow {
                    commodity: commodity.clone(),
                    flow,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;
    use approx::assert_relative_eq;

    fn network() -> Network {
        let mut builder = NetworkBuilder::new(["x", "y"]).unwrap();
        builder.add_node("u", &[]).unwrap();
        builder.add_node("v", &[]).unwrap();
        builder.add_edge("u", "v", 2.0).unwrap();
        builder.add_edge("v", "u", 0.0).unwrap();
        builder.build()
    }

    #[test]
    fn test_rounding_and_totals() {
        let flow = Array2::from_shape_vec((2, 2), vec![1.234, 0.456, 0.0, 0.0]).unwrap();
        let rounded = rounded_flow(&flow);
        assert_relative_eq!(rounded[[0, 0]], 1.23);
        assert_relative_eq!(rounded[[0, 1]], 0.46);
        assert_relative_eq!(total_flow(&flow), 1.69, epsilon = 1e-12);
    }

    #[test]
    fn test_max_congestion_ratio() {
        let network = network();
        let flow = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(max_congestion_ratio(&network, &flow), 1.5);

        let blocked = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 0.5, 0.0]).unwrap();
        assert!(max_congestion_ratio(&network, &blocked).is_infinite());
    }

    #[test]
    fn test_edge_flow_records() {
        let network = network();
        let flow = Array2::from_shape_vec((2, 2), vec![2.0, 1.004, 0.0, 0.0]).unwrap();
        let records = edge_flow_records(&network, &flow);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, "u");
        assert_eq!(records[0].target, "v");
        assert_relative_eq!(records[0].congestion, 1.004, epsilon = 1e-12);
        assert_eq!(records[0].flows[1].commodity, "y");
        assert_relative_eq!(records[0].flows[1].flow, 1.0);
    }
}
