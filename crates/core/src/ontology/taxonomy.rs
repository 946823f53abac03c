//! Nested JSON taxonomies: `{id, label, aliases, children}` trees.

use super::ConceptIndexBuilder;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Option<Vec<String>>,
    #[serde(default)]
    pub children: Vec<TaxonomyNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Taxonomy {
    Many(Vec<TaxonomyNode>),
    One(TaxonomyNode),
}

impl Taxonomy {
    pub fn roots(&self) -> &[TaxonomyNode] {
        match self {
            Taxonomy::Many(nodes) => nodes,
            Taxonomy::One(node) => std::slice::from_ref(node),
        }
    }
}

impl TaxonomyNode {
    /// `id`, or the label with spaces replaced by underscores.
    pub fn normalized_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self.label.as_deref().unwrap_or_default().replace(' ', "_"),
        }
    }

    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

/// Adds every node under `urn:<name>:<id>`; nesting gives broader/narrower links
/// and every node belongs to the scheme `urn:<name>`.
pub fn add_taxonomy(builder: &mut ConceptIndexBuilder, name: &str, taxonomy: &Taxonomy) {
    let scheme = format!("urn:{name}");
    builder.scheme_mut(&scheme).label.get_or_insert_with(|| name.to_string());
    for root in taxonomy.roots() {
        add_node(builder, name, &scheme, root, None);
    }
}

fn add_node(
    builder: &mut ConceptIndexBuilder,
    name: &str,
    scheme: &str,
    node: &TaxonomyNode,
    parent: Option<&str>,
) {
    let uri = format!("urn:{name}:{}", node.normalized_id());

    let concept = builder.concept_mut(&uri);
    concept.label = node.display_label().to_string();
    if let Some(aliases) = &node.aliases {
        concept.aliases = aliases.clone();
    }
    concept.scheme.get_or_insert_with(|| scheme.to_string());
    builder.add_scheme_member(scheme, &uri);

    if let Some(parent) = parent {
        builder.link(parent, &uri);
    }

    for child in &node.children {
        add_node(builder, name, scheme, child, Some(&uri));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_fall_back_to_label() -> Result<(), serde_json::Error> {
        let node: TaxonomyNode = serde_json::from_str(r#"{"label": "Annual Report"}"#)?;
        assert_eq!(node.normalized_id(), "Annual_Report");
        let named: TaxonomyNode = serde_json::from_str(r#"{"id": "memo", "name": "Memo"}"#)?;
        assert_eq!(named.normalized_id(), "memo");
        assert_eq!(named.display_label(), "Memo");
        Ok(())
    }

    #[test]
    fn root_may_be_a_list() -> Result<(), serde_json::Error> {
        let taxonomy: Taxonomy = serde_json::from_str(r#"[{"id": "a"}, {"id": "b"}]"#)?;
        assert_eq!(taxonomy.roots().len(), 2);
        let single: Taxonomy = serde_json::from_str(r#"{"id": "a", "children": [{"id": "b"}]}"#)?;
        assert_eq!(single.roots().len(), 1);
        assert_eq!(single.roots()[0].children.len(), 1);
        Ok(())
    }
}
