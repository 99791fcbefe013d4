use serde::{Deserialize, Serialize};

/// A point in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(&self, other: &Point) -> f64 {
		let (dx, dy) = (self.x - other.x, self.y - other.y);
		(dx * dx + dy * dy).sqrt()
	}
}

/// What a node stands for. Motions link to the people who filed or backed them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	#[serde(alias = "antrag")]
	Motion,
	#[serde(alias = "applicant")]
	Supporter,
	Amendment,
	Person,
}

impl NodeKind {
	pub const ALL: [NodeKind; 4] = [
		NodeKind::Motion,
		NodeKind::Supporter,
		NodeKind::Amendment,
		NodeKind::Person,
	];
}

/// Per-node centrality scores, always written together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCentrality {
	pub degree: usize,
	pub closeness: f64,
	pub betweenness: f64,
}

/// Canonical node record as handed over by the ingestion step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sublabel: Option<String>,
	pub kind: NodeKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub color: Option<String>,
	/// Sum of incident link weights. Computed from the links when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub link_count: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}

impl GraphNode {
	pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
		Self {
			id: id.into(),
			label: label.into(),
			sublabel: None,
			kind,
			color: None,
			link_count: None,
			url: None,
		}
	}

	pub fn with_sublabel(mut self, sublabel: impl Into<String>) -> Self {
		self.sublabel = Some(sublabel.into());
		self
	}

	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
	pub source: String,
	pub target: String,
	#[serde(default = "default_weight")]
	pub weight: f64,
}

fn default_weight() -> f64 {
	1.0
}

impl GraphLink {
	pub fn new(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
		Self {
			source: source.into(),
			target: target.into(),
			weight,
		}
	}
}

/// The normalized `{nodes, links}` pair the engine consumes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
	#[serde(default)]
	pub nodes: Vec<GraphNode>,
	#[serde(default)]
	pub links: Vec<GraphLink>,
}

impl GraphData {
	pub fn from_json(json: &str) -> Result<Self, crate::components::force_graph::EngineError> {
		Ok(serde_json::from_str(json)?)
	}
}

/// A node as owned by the model: ingestion record plus layout and metric state.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	id: String,
	pub label: String,
	pub sublabel: Option<String>,
	pub kind: NodeKind,
	pub color: String,
	pub link_count: f64,
	pub url: Option<String>,
	pub position: Option<Point>,
	pub velocity: Option<Point>,
	pub size: Option<f64>,
	pub centrality: Option<NodeCentrality>,
}

impl Node {
	pub(crate) fn from_record(record: GraphNode, color: String, link_count: f64) -> Self {
		Self {
			id: record.id,
			label: record.label,
			sublabel: record.sublabel.filter(|s| !s.is_empty()),
			kind: record.kind,
			color,
			link_count,
			url: record.url,
			position: None,
			velocity: None,
			size: None,
			centrality: None,
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Radius before the size multiplier: the precomputed size if any,
	/// else `1.5·√linkCount + 0.25`.
	pub fn base_radius(&self) -> f64 {
		self.size
			.unwrap_or_else(|| radius_for_link_count(self.link_count))
	}
}

pub fn radius_for_link_count(link_count: f64) -> f64 {
	link_count.max(0.0).sqrt() * 1.5 + 0.25
}

/// A link as owned by the model; endpoints are indices into the node arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
	pub source: usize,
	pub target: usize,
	pub weight: f64,
}

impl Link {
	pub fn is_self_loop(&self) -> bool {
		self.source == self.target
	}

	pub fn touches(&self, idx: usize) -> bool {
		self.source == idx || self.target == idx
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_accepts_source_aliases() {
		let kinds: Vec<NodeKind> =
			serde_json::from_str(r#"["antrag", "motion", "applicant", "supporter", "person"]"#)
				.unwrap();
		assert_eq!(
			kinds,
			vec![
				NodeKind::Motion,
				NodeKind::Motion,
				NodeKind::Supporter,
				NodeKind::Supporter,
				NodeKind::Person
			]
		);
	}

	#[test]
	fn link_weight_defaults_to_one() {
		let link: GraphLink = serde_json::from_str(r#"{"source": "a", "target": "b"}"#).unwrap();
		assert_eq!(link.weight, 1.0);
	}

	#[test]
	fn radius_grows_with_link_count() {
		assert_eq!(radius_for_link_count(0.0), 0.25);
		assert_eq!(radius_for_link_count(4.0), 3.25);
		assert!(radius_for_link_count(100.0) > radius_for_link_count(10.0));
	}
}
