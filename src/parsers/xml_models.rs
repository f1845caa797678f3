use serde::Deserialize;

// Subset of the SNDlib native XML format: topology, link capacities and demands.

#[derive(Debug, Deserialize)]
#[serde(rename = "network")]
pub struct SndlibNetwork {
    #[serde(rename = "@version", default)]
    pub version: Option<String>,
    #[serde(rename = "networkStructure")]
    pub network_structure: NetworkStructure,
    #[serde(default)]
    pub demands: Demands,
}

#[derive(Debug, Deserialize)]
pub struct NetworkStructure {
    pub nodes: Nodes,
    pub links: Links,
}

#[derive(Debug, Deserialize)]
pub struct Nodes {
    #[serde(rename = "node", default)]
    pub node_list: Vec<Node>,
}

#[derive(Debug, Deserialize)]
pub struct Node {
    #[serde(rename = "@id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Links {
    #[serde(rename = "link", default)]
    pub link_list: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    #[serde(rename = "@id")]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "preInstalledModule")]
    pub pre_installed_module: Option<Module>,
    #[serde(rename = "additionalModules", default)]
    pub additional_modules: AdditionalModules,
}

impl Link {
    /// Pre-installed capacity, else the first additional module, else 1.
    pub fn capacity(&self) -> f64 {
        if let Some(module) = &self.pre_installed_module {
            module.capacity
        } else if let Some(module) = self.additional_modules.add_module_list.first() {
            module.capacity
        } else {
            1.0
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Module {
    pub capacity: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdditionalModules {
    #[serde(rename = "addModule", default)]
    pub add_module_list: Vec<Module>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Demands {
    #[serde(rename = "demand", default)]
    pub demand_list: Vec<Demand>,
}

#[derive(Debug, Deserialize)]
pub struct Demand {
    #[serde(rename = "@id")]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "demandValue")]
    pub demand_value: f64,
}
