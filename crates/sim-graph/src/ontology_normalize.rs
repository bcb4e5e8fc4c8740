//! Post-processing applied to whatever an [`sim_providers::OntologyService`] returns:
//! caps, fallback types, and reserved-name remapping.

use sim_types::domain::ontology::{
    AttributeDescriptor, AttributeRemap, EdgeType, EntityType, Ontology, FALLBACK_ENTITY_TYPES,
    MAX_DESCRIPTION_LEN, MAX_EDGE_TYPES, MAX_ENTITY_TYPES,
};

/// Attribute names the graph backend reserves for its own bookkeeping; colliding
/// attribute names are rewritten to `entity_{name}`.
const RESERVED_NAMES: &[&str] = &["uuid", "name", "group_id", "name_embedding", "summary", "created_at"];

/// Validates and normalizes a raw ontology:
/// - cap descriptions at [`MAX_DESCRIPTION_LEN`] characters
/// - ensure the two fallback entity types are present, appended last, evicting from the
///   end of the list if needed to respect the cap
/// - cap edge types at [`MAX_EDGE_TYPES`]
/// - rewrite any attribute name colliding with [`RESERVED_NAMES`], recording the
///   original name in `attribute_remap`
pub fn normalize(mut ontology: Ontology) -> Ontology {
    for entity_type in &mut ontology.entity_types {
        truncate_description(&mut entity_type.description);
    }
    for edge_type in &mut ontology.edge_types {
        truncate_description(&mut edge_type.description);
    }

    ontology.entity_types.retain(|e| !is_fallback(&e.name));
    while ontology.entity_types.len() + FALLBACK_ENTITY_TYPES.len() > MAX_ENTITY_TYPES {
        ontology.entity_types.pop();
    }
    for name in FALLBACK_ENTITY_TYPES {
        ontology.entity_types.push(EntityType {
            name: name.to_string(),
            description: format!("Fallback entity type: {name}."),
            attributes: Vec::new(),
        });
    }

    ontology.edge_types.truncate(MAX_EDGE_TYPES);

    let mut remap = Vec::new();
    for entity_type in &mut ontology.entity_types {
        remap_attributes(&entity_type.name, &mut entity_type.attributes, &mut remap);
    }
    for edge_type in &mut ontology.edge_types {
        remap_attributes(&edge_type.name, &mut edge_type.attributes, &mut remap);
    }
    ontology.attribute_remap = remap;

    ontology
}

fn is_fallback(name: &str) -> bool {
    FALLBACK_ENTITY_TYPES.iter().any(|f| f.eq_ignore_ascii_case(name))
}

fn truncate_description(description: &mut String) {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        *description = description.chars().take(MAX_DESCRIPTION_LEN).collect();
    }
}

fn remap_attributes(
    owner_type: &str,
    attributes: &mut [AttributeDescriptor],
    remap: &mut Vec<AttributeRemap>,
) {
    for attr in attributes.iter_mut() {
        if RESERVED_NAMES.contains(&attr.name.to_lowercase().as_str()) {
            let original = attr.name.clone();
            attr.name = format!("entity_{original}");
            remap.push(AttributeRemap {
                entity_or_edge_type: owner_type.to_string(),
                from: original,
                to: attr.name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_types::domain::ontology::TypePair;

    fn entity(name: &str) -> EntityType {
        EntityType {
            name: name.to_string(),
            description: "d".to_string(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn fallback_types_always_appended_last() {
        let ontology = Ontology::new(vec![entity("Event"), entity("Topic")], Vec::new());
        let normalized = normalize(ontology);
        let names = normalized.entity_type_names();
        assert_eq!(names[names.len() - 2..], ["Person", "Organization"]);
    }

    #[test]
    fn caps_entity_types_at_ten_evicting_from_the_end() {
        let many: Vec<EntityType> = (0..12).map(|i| entity(&format!("Type{i}"))).collect();
        let ontology = Ontology::new(many, Vec::new());
        let normalized = normalize(ontology);
        assert_eq!(normalized.entity_types.len(), MAX_ENTITY_TYPES);
        assert_eq!(
            normalized.entity_type_names()[normalized.entity_types.len() - 2..],
            ["Person", "Organization"]
        );
    }

    #[test]
    fn truncates_long_descriptions() {
        let mut e = entity("Widget");
        e.description = "x".repeat(200);
        let ontology = Ontology::new(vec![e], Vec::new());
        let normalized = normalize(ontology);
        assert!(normalized.entity_types[0].description.chars().count() <= MAX_DESCRIPTION_LEN);
    }

    #[test]
    fn rewrites_reserved_attribute_names_and_records_remap() {
        let mut e = entity("Widget");
        e.attributes.push(AttributeDescriptor {
            name: "name".to_string(),
            description: "the name".to_string(),
        });
        let ontology = Ontology::new(vec![e], Vec::new());
        let normalized = normalize(ontology);
        let widget = normalized
            .entity_types
            .iter()
            .find(|e| e.name == "Widget")
            .unwrap();
        assert_eq!(widget.attributes[0].name, "entity_name");
        assert_eq!(normalized.attribute_remap.len(), 1);
        assert_eq!(normalized.attribute_remap[0].from, "name");
        assert_eq!(normalized.attribute_remap[0].to, "entity_name");
    }

    #[test]
    fn caps_edge_types_at_ten() {
        let edges: Vec<EdgeType> = (0..15)
            .map(|i| EdgeType {
                name: format!("Edge{i}"),
                description: "d".to_string(),
                attributes: Vec::new(),
                type_pairs: vec![TypePair {
                    source: "Person".to_string(),
                    target: "Organization".to_string(),
                }],
            })
            .collect();
        let ontology = Ontology::new(Vec::new(), edges);
        let normalized = normalize(ontology);
        assert_eq!(normalized.edge_types.len(), MAX_EDGE_TYPES);
    }
}
