use std::collections::HashSet;
use std::fmt::Write as _;

use serde_json::json;

use crate::application::error::ServiceError;
use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::relationship::Relationship;
use crate::domain::ports::store::{EntityStore, RelationshipStore};

/// Supported graph serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Gexf,
    Graphml,
}

impl ExportFormat {
    pub const ALL: [Self; 3] = [Self::Json, Self::Gexf, Self::Graphml];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Gexf => "gexf",
            Self::Graphml => "graphml",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == s)
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes a snapshot of the graph for external tooling.
///
/// The optional type allowlist filters nodes; an edge survives only when
/// both of its endpoints do.
pub struct ExportService<'a> {
    entity_store: &'a dyn EntityStore,
    relationship_store: &'a dyn RelationshipStore,
}

impl<'a> ExportService<'a> {
    #[must_use]
    pub const fn new(
        entity_store: &'a dyn EntityStore,
        relationship_store: &'a dyn RelationshipStore,
    ) -> Self {
        Self {
            entity_store,
            relationship_store,
        }
    }

    /// Serialize the (filtered) graph into `format`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if reads fail or serialization fails.
    pub fn export(
        &self,
        format: ExportFormat,
        types: Option<&[EntityType]>,
    ) -> Result<String, ServiceError> {
        let entities = self.entity_store.list_entities(types)?;
        let included: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        let edges: Vec<Relationship> = self
            .relationship_store
            .list_relationships()?
            .into_iter()
            .filter(|r| {
                included.contains(r.source_id.as_str()) && included.contains(r.target_id.as_str())
            })
            .collect();

        tracing::debug!(
            "Exporting {} node(s) and {} edge(s) as {format}",
            entities.len(),
            edges.len()
        );

        match format {
            ExportFormat::Json => node_link_json(&entities, &edges),
            ExportFormat::Gexf => Ok(gexf(&entities, &edges)),
            ExportFormat::Graphml => Ok(graphml(&entities, &edges)),
        }
    }
}

fn node_link_json(entities: &[Entity], edges: &[Relationship]) -> Result<String, ServiceError> {
    let nodes: Vec<_> = entities
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "entity_type": e.entity_type,
                "value": e.canonical_value,
                "confidence": e.confidence,
                "first_seen": e.first_seen,
                "last_seen": e.last_seen,
            })
        })
        .collect();
    let links: Vec<_> = edges
        .iter()
        .map(|r| {
            json!({
                "source": r.source_id,
                "target": r.target_id,
                "rel_type": r.rel_type,
                "confidence": r.confidence,
                "evidence_count": r.evidence.len(),
            })
        })
        .collect();

    let document = json!({
        "directed": true,
        "nodes": nodes,
        "links": links,
    });
    serde_json::to_string_pretty(&document).map_err(|e| ServiceError::Export(e.to_string()))
}

fn gexf(entities: &[Entity], edges: &[Relationship]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str(r#"<gexf xmlns="http://gexf.net/1.3" version="1.3">"#);
    out.push('\n');
    out.push_str(r#"  <graph defaultedgetype="directed">"#);
    out.push('\n');
    out.push_str("    <attributes class=\"node\">\n");
    out.push_str("      <attribute id=\"0\" title=\"entity_type\" type=\"string\"/>\n");
    out.push_str("      <attribute id=\"1\" title=\"confidence\" type=\"double\"/>\n");
    out.push_str("    </attributes>\n");

    out.push_str("    <nodes>\n");
    for entity in entities {
        let _ = writeln!(
            out,
            r#"      <node id="{}" label="{}">"#,
            xml_escape(&entity.id),
            xml_escape(&entity.canonical_value)
        );
        out.push_str("        <attvalues>\n");
        let _ = writeln!(
            out,
            r#"          <attvalue for="0" value="{}"/>"#,
            entity.entity_type
        );
        let _ = writeln!(
            out,
            r#"          <attvalue for="1" value="{}"/>"#,
            entity.confidence.value()
        );
        out.push_str("        </attvalues>\n");
        out.push_str("      </node>\n");
    }
    out.push_str("    </nodes>\n");

    out.push_str("    <edges>\n");
    for (index, edge) in edges.iter().enumerate() {
        let _ = writeln!(
            out,
            r#"      <edge id="{index}" source="{}" target="{}" label="{}" weight="{}"/>"#,
            xml_escape(&edge.source_id),
            xml_escape(&edge.target_id),
            edge.rel_type,
            edge.confidence.value()
        );
    }
    out.push_str("    </edges>\n");

    out.push_str("  </graph>\n</gexf>\n");
    out
}

fn graphml(entities: &[Entity], edges: &[Relationship]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str(r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#);
    out.push('\n');
    out.push_str(
        "  <key id=\"d0\" for=\"node\" attr.name=\"entity_type\" attr.type=\"string\"/>\n",
    );
    out.push_str("  <key id=\"d1\" for=\"node\" attr.name=\"value\" attr.type=\"string\"/>\n");
    out.push_str(
        "  <key id=\"d2\" for=\"node\" attr.name=\"confidence\" attr.type=\"double\"/>\n",
    );
    out.push_str("  <key id=\"d3\" for=\"edge\" attr.name=\"rel_type\" attr.type=\"string\"/>\n");
    out.push_str(
        "  <key id=\"d4\" for=\"edge\" attr.name=\"confidence\" attr.type=\"double\"/>\n",
    );
    out.push_str("  <graph id=\"G\" edgedefault=\"directed\">\n");

    for entity in entities {
        let _ = writeln!(out, r#"    <node id="{}">"#, xml_escape(&entity.id));
        let _ = writeln!(out, "      <data key=\"d0\">{}</data>", entity.entity_type);
        let _ = writeln!(
            out,
            "      <data key=\"d1\">{}</data>",
            xml_escape(&entity.canonical_value)
        );
        let _ = writeln!(
            out,
            "      <data key=\"d2\">{}</data>",
            entity.confidence.value()
        );
        out.push_str("    </node>\n");
    }

    for edge in edges {
        let _ = writeln!(
            out,
            r#"    <edge source="{}" target="{}">"#,
            xml_escape(&edge.source_id),
            xml_escape(&edge.target_id)
        );
        let _ = writeln!(out, "      <data key=\"d3\">{}</data>", edge.rel_type);
        let _ = writeln!(
            out,
            "      <data key=\"d4\">{}</data>",
            edge.confidence.value()
        );
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
