use serde::{Deserialize, Serialize};

/// Hard caps enforced by the backing graph store.
pub const MAX_ENTITY_TYPES: usize = 10;
pub const MAX_EDGE_TYPES: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 100;

/// Entity types that are always present after normalization, appended last in this order.
pub const FALLBACK_ENTITY_TYPES: [&str; 2] = ["Person", "Organization"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypePair {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeType {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    pub type_pairs: Vec<TypePair>,
}

/// Records an attribute name the normalizer rewrote to avoid colliding with a
/// reserved identifier of the graph backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeRemap {
    pub entity_or_edge_type: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Ontology {
    pub entity_types: Vec<EntityType>,
    pub edge_types: Vec<EdgeType>,
    /// Preserves the original intended attribute name for every attribute the
    /// normalizer rewrote.
    #[serde(default)]
    pub attribute_remap: Vec<AttributeRemap>,
}

impl Ontology {
    pub fn new(entity_types: Vec<EntityType>, edge_types: Vec<EdgeType>) -> Self {
        Self {
            entity_types,
            edge_types,
            attribute_remap: Vec::new(),
        }
    }

    pub fn entity_type_names(&self) -> Vec<&str> {
        self.entity_types.iter().map(|e| e.name.as_str()).collect()
    }
}
