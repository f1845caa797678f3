use anyhow::{Context, Result, anyhow};
use gxhash::HashMap;
use gxhash::HashMapExt;
use ndarray::Array1;
use quick_xml::de::from_reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::xml_models::SndlibNetwork;
use crate::network::{FlowMatrix, Network, NetworkBuilder};

pub fn resolve_sndlib_base_path() -> PathBuf {
    let mut base_path = PathBuf::from("./sndlib_xml/");
    if !base_path.exists() {
        base_path = PathBuf::from(".");
        warn!("Default SNDlib path not found, using current directory");
    }
    base_path
}

/// Looks for `<base>/<name>/<name>.xml`, then `<base>/<name>.xml`.
pub fn resolve_dataset_path(base_path: &Path, dataset_name: &str) -> Option<PathBuf> {
    let nested = base_path
        .join(dataset_name)
        .join(format!("{}.xml", dataset_name));
    if nested.exists() {
        return Some(nested);
    }
    let flat = base_path.join(format!("{}.xml", dataset_name));
    flat.exists().then_some(flat)
}

fn normalize_demand(demand_values: &mut Array1<f64>) {
    let max_val = demand_values.iter().copied().fold(0.0, f64::max);

    if max_val > 0.0 {
        *demand_values /= max_val;
    }
}

/// Builds a network from SNDlib XML.
///
/// Every undirected link becomes two directed edges; links joining the same
/// pair of nodes are merged by summing their capacities. Every demand becomes
/// its own commodity, supplied at its source and consumed at its target.
pub fn parse_sndlib<R: BufRead>(reader: R, normalize: bool) -> Result<Network> {
    let xml: SndlibNetwork = from_reader(reader).context("Failed to parse SNDlib XML")?;
    let structure = xml.network_structure;
    let demands: Vec<_> = xml
        .demands
        .demand_list
        .into_iter()
        .filter(|demand| {
            if demand.source == demand.target {
                warn!(demand = %demand.id, "Skipping demand whose source equals its target");
                false
            } else {
                true
            }
        })
        .collect();

    let mut builder = NetworkBuilder::new(demands.iter().map(|d| d.id.clone()))?;

    // Nodes

    for node in &structure.nodes.node_list {
        builder.add_node(&node.id, &[])?;
    }

    // Edges

    let mut edge_order: Vec<(String, String)> = Vec::new();
    let mut capacities: HashMap<(String, String), f64> = HashMap::new();
    for link in &structure.links.link_list {
        for (source, target) in [(&link.source, &link.target), (&link.target, &link.source)] {
            for endpoint in [source, target] {
                if !builder.contains_node(endpoint) {
                    return Err(anyhow!("Link {} references unknown node {}", link.id, endpoint));
                }
            }
            let key = (source.clone(), target.clone());
            if !capacities.contains_key(&key) {
                edge_order.push(key.clone());
            }
            *capacities.entry(key).or_insert(0.0) += link.capacity();
        }
    }
    for key in &edge_order {
        builder.add_edge(&key.0, &key.1, capacities[key])?;
    }

    // Demands

    let mut demand_values: Array1<f64> = demands.iter().map(|d| d.demand_value).collect();
    if normalize {
        normalize_demand(&mut demand_values);
    }
    for (demand, &value) in demands.iter().zip(demand_values.iter()) {
        builder
            .add_demand(&demand.source, &demand.id, value)
            .with_context(|| format!("Demand {} has an unknown source", demand.id))?;
        builder
            .add_demand(&demand.target, &demand.id, -value)
            .with_context(|| format!("Demand {} has an unknown target", demand.id))?;
    }

    let network = builder.build();
    debug!(
        version = xml.version.as_deref().unwrap_or("unknown"),
        nodes = network.node_count(),
        edges = network.edge_count(),
        commodities = network.commodity_count(),
        "Loaded SNDlib network"
    );
    Ok(network)
}

pub fn load_sndlib_network<P: AsRef<Path>>(
    file_path: P,
    normalize: bool,
) -> Result<(Network, FlowMatrix)> {
    let file_path = file_path.as_ref();
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open {}", file_path.display()))?;
    let network = parse_sndlib(BufReader::new(file), normalize)?;
    let flow = network.zero_flow();
    Ok((network, flow))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_NETWORK: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<network xmlns="http://sndlib.zib.de/network" version="1.0">
  <networkStructure>
    <nodes coordinatesType="geographical">
      <node id="A"><coordinates><x>0.0</x><y>0.0</y></coordinates></node>
      <node id="B"><coordinates><x>1.0</x><y>0.0</y></coordinates></node>
      <node id="C"><coordinates><x>2.0</x><y>0.0</y></coordinates></node>
    </nodes>
    <links>
      <link id="L1">
        <source>A</source>
        <target>B</target>
        <preInstalledModule><capacity>4.0</capacity><cost>1.0</cost></preInstalledModule>
      </link>
      <link id="L2">
        <source>B</source>
        <target>C</target>
        <additionalModules>
          <addModule><capacity>2.5</capacity><cost>3.0</cost></addModule>
        </additionalModules>
      </link>
      <link id="L3">
        <source>B</source>
        <target>A</target>
      </link>
    </links>
  </networkStructure>
  <demands>
    <demand id="D1">
      <source>A</source>
      <target>C</target>
      <demandUnit>1</demandUnit>
      <demandValue>8.0</demandValue>
    </demand>
    <demand id="D2">
      <source>C</source>
      <target>B</target>
      <demandUnit>1</demandUnit>
      <demandValue>2.0</demandValue>
    </demand>
  </demands>
</network>
"#;

    #[test]
    fn test_parse_links_and_demands() {
        let network = parse_sndlib(SMALL_NETWORK.as_bytes(), false).unwrap();

        assert_eq!(network.node_count(), 3);
        // A<->B merged from L1 and L3, B<->C from L2
        assert_eq!(network.edge_count(), 4);
        let ab = network.edge_index("A", "B").unwrap();
        let ba = network.edge_index("B", "A").unwrap();
        let bc = network.edge_index("B", "C").unwrap();
        assert_eq!(network.capacity(ab), 5.0);
        assert_eq!(network.capacity(ba), 5.0);
        assert_eq!(network.capacity(bc), 2.5);

        let d1 = network.commodity_index("D1").unwrap();
        let a = network.node_index("A").unwrap();
        let c = network.node_index("C").unwrap();
        assert_eq!(network.demand()[[a, d1]], 8.0);
        assert_eq!(network.demand()[[c, d1]], -8.0);
        assert!(network.demand_balance().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_normalized_demand() {
        let network = parse_sndlib(SMALL_NETWORK.as_bytes(), true).unwrap();
        let d2 = network.commodity_index("D2").unwrap();
        let c = network.node_index("C").unwrap();
        assert_eq!(network.demand()[[c, d2]], 0.25);
    }

    #[test]
    fn test_unknown_link_endpoint() {
        let xml = SMALL_NETWORK.replace("<target>C</target>\n        <additionalModules>", "<target>Z</target>\n        <additionalModules>");
        assert!(parse_sndlib(xml.as_bytes(), false).is_err());
    }
}
