use gxhash::HashMap;
use gxhash::HashMapExt;
use ndarray::{Array1, Array2, Axis};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::warn;

use crate::error::FlowError;

pub type GraphType = DiGraph<String, f64>;

/// Flow values indexed by `[edge, commodity]`.
pub type FlowMatrix = Array2<f64>;

const BALANCE_TOLERANCE: f64 = 1e-9;

/// Directed network with per-edge capacities shared by a fixed set of commodities.
///
/// Node weights are node names, edge weights are capacities. Demand is stored
/// as a dense `[node, commodity]` matrix: positive entries are supplies,
/// negative entries are sinks and transshipment nodes carry zero rows.
#[derive(Debug, Clone)]
pub struct Network {
    graph: GraphType,
    commodities: Vec<String>,
    demand: Array2<f64>,
    endpoints: Vec<(usize, usize)>,
    node_ids: HashMap<String, NodeIndex>,
}

impl Network {
    pub fn graph(&self) -> &GraphType {
        &self.graph
    }

    pub fn commodities(&self) -> &[String] {
        &self.commodities
    }

    pub fn demand(&self) -> &Array2<f64> {
        &self.demand
    }

    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn commodity_count(&self) -> usize {
        self.commodities.len()
    }

    pub fn capacity(&self, edge: usize) -> f64 {
        self.graph[EdgeIndex::new(edge)]
    }

    pub fn node_name(&self, node: usize) -> &str {
        &self.graph[NodeIndex::new(node)]
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.node_ids.get(name).map(|idx| idx.index())
    }

    pub fn edge_index(&self, source: &str, target: &str) -> Option<usize> {
        let source = NodeIndex::new(self.node_index(source)?);
        let target = NodeIndex::new(self.node_index(target)?);
        self.graph.find_edge(source, target).map(|e| e.index())
    }

    pub fn commodity_index(&self, name: &str) -> Option<usize> {
        self.commodities.iter().position(|c| c == name)
    }

    pub fn zero_flow(&self) -> FlowMatrix {
        Array2::zeros((self.edge_count(), self.commodity_count()))
    }

    /// Sum of demand over all nodes, per commodity. Zero for a meaningful instance.
    pub fn demand_balance(&self) -> Array1<f64> {
        self.demand.sum_axis(Axis(0))
    }

    pub fn validate_flow(&self, flow: &FlowMatrix) -> Result<(), FlowError> {
        let expected = (self.edge_count(), self.commodity_count());
        if flow.dim() != expected {
            return Err(FlowError::FlowShape {
                expected,
                found: flow.dim(),
            });
        }
        for ((edge, commodity), &value) in flow.indexed_iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(FlowError::InvalidFlow {
                    edge,
                    commodity,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Incrementally assembles a [`Network`], validating every node, edge and demand entry.
#[derive(Debug)]
pub struct NetworkBuilder {
    graph: GraphType,
    commodities: Vec<String>,
    commodity_ids: HashMap<String, usize>,
    node_ids: HashMap<String, NodeIndex>,
    demand_rows: Vec<Vec<f64>>,
}

impl NetworkBuilder {
    pub fn new<I, S>(commodities: I) -> Result<Self, FlowError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut commodity_ids = HashMap::new();
        for commodity in commodities {
            let commodity = commodity.into();
            if commodity_ids.contains_key(&commodity) {
                return Err(FlowError::DuplicateCommodity(commodity));
            }
            commodity_ids.insert(commodity.clone(), names.len());
            names.push(commodity);
        }
        Ok(Self {
            graph: GraphType::new(),
            commodities: names,
            commodity_ids,
            node_ids: HashMap::new(),
            demand_rows: Vec::new(),
        })
    }

    /// Adds a node with optional demand entries. Repeated commodities accumulate.
    pub fn add_node(&mut self, name: &str, demand: &[(&str, f64)]) -> Result<usize, FlowError> {
        if self.node_ids.contains_key(name) {
            return Err(FlowError::DuplicateNode(name.to_string()));
        }
        let node = self.graph.add_node(name.to_string());
        self.node_ids.insert(name.to_string(), node);
        self.demand_rows.push(vec![0.0; self.commodities.len()]);
        for &(commodity, value) in demand {
            self.add_demand(name, commodity, value)?;
        }
        Ok(node.index())
    }

    pub fn add_demand(&mut self, node: &str, commodity: &str, value: f64) -> Result<(), FlowError> {
        let node_idx = *self
            .node_ids
            .get(node)
            .ok_or_else(|| FlowError::UnknownNode(node.to_string()))?;
        let commodity_idx =
            *self
                .commodity_ids
                .get(commodity)
                .ok_or_else(|| FlowError::UnknownCommodity {
                    node: node.to_string(),
                    commodity: commodity.to_string(),
                })?;
        if !value.is_finite() {
            return Err(FlowError::InvalidDemand {
                node: node.to_string(),
                commodity: commodity.to_string(),
                value,
            });
        }
        self.demand_rows[node_idx.index()][commodity_idx] += value;
        Ok(())
    }

    pub fn add_edge(&mut self, source: &str, target: &str, capacity: f64) -> Result<usize, FlowError> {
        let source_idx = *self
            .node_ids
            .get(source)
            .ok_or_else(|| FlowError::UnknownNode(source.to_string()))?;
        let target_idx = *self
            .node_ids
            .get(target)
            .ok_or_else(|| FlowError::UnknownNode(target.to_string()))?;
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(FlowError::InvalidCapacity {
                from: source.to_string(),
                to: target.to_string(),
                capacity,
            });
        }
        if self.graph.find_edge(source_idx, target_idx).is_some() {
            return Err(FlowError::ParallelEdge {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        Ok(self.graph.add_edge(source_idx, target_idx, capacity).index())
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.node_ids.contains_key(name)
    }

    pub fn build(self) -> Network {
        let node_count = self.graph.node_count();
        let commodity_count = self.commodities.len();
        let mut demand = Array2::zeros((node_count, commodity_count));
        for (node, row) in self.demand_rows.iter().enumerate() {
            for (commodity, &value) in row.iter().enumerate() {
                demand[[node, commodity]] = value;
            }
        }

        let endpoints = self
            .graph
            .edge_references()
            .map(|edge_ref| (edge_ref.source().index(), edge_ref.target().index()))
            .collect();

        let network = Network {
            graph: self.graph,
            commodities: self.commodities,
            demand,
            endpoints,
            node_ids: self.node_ids,
        };

        for (commodity, balance) in network.demand_balance().iter().enumerate() {
            if balance.abs() > BALANCE_TOLERANCE {
                warn!(
                    commodity = %network.commodities[commodity],
                    balance,
                    "commodity demand does not sum to zero"
                );
            }
        }
        network
    }
}
