//! The in-memory graph: a node arena indexed by id, links stored as arena
//! indices, and a lazily built undirected adjacency index.

use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};

use super::config::Palette;
use super::error::DataIssue;
use super::types::{GraphData, Link, Node, NodeCentrality, Point};
use super::viewport::BoundingBox;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Symmetric neighbor sets, one per node index. Self-loops are not neighbors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Adjacency {
	neighbors: Vec<BTreeSet<usize>>,
}

impl Adjacency {
	fn build(node_count: usize, links: &[Link]) -> Self {
		let mut neighbors = vec![BTreeSet::new(); node_count];
		for link in links.iter().filter(|l| !l.is_self_loop()) {
			neighbors[link.source].insert(link.target);
			neighbors[link.target].insert(link.source);
		}
		Self { neighbors }
	}

	pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
		self.neighbors.get(idx).into_iter().flatten().copied()
	}

	pub fn degree(&self, idx: usize) -> usize {
		self.neighbors.get(idx).map_or(0, BTreeSet::len)
	}

	pub fn are_neighbors(&self, a: usize, b: usize) -> bool {
		self.neighbors.get(a).is_some_and(|set| set.contains(&b))
	}

	pub fn len(&self) -> usize {
		self.neighbors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.neighbors.is_empty()
	}

	/// Plain index lists, the shape the centrality passes iterate over.
	pub fn to_lists(&self) -> Vec<Vec<usize>> {
		self.neighbors
			.iter()
			.map(|set| set.iter().copied().collect())
			.collect()
	}
}

pub struct GraphModel {
	generation: u64,
	nodes: Vec<Node>,
	links: Vec<Link>,
	index: HashMap<String, usize>,
	adjacency: OnceCell<Adjacency>,
	issues: Vec<DataIssue>,
}

impl GraphModel {
	/// Builds the model from normalized records. Bad records are dropped and
	/// recorded as issues rather than failing the build.
	pub fn build(data: GraphData, palette: &Palette) -> Self {
		let mut issues = Vec::new();
		let mut index = HashMap::with_capacity(data.nodes.len());
		let mut records = Vec::with_capacity(data.nodes.len());

		for record in data.nodes {
			if index.contains_key(&record.id) {
				issues.push(DataIssue::DuplicateNode(record.id));
				continue;
			}
			index.insert(record.id.clone(), records.len());
			records.push(record);
		}

		let mut links = Vec::with_capacity(data.links.len());
		let mut weight_sums = vec![0.0; records.len()];
		for link in data.links {
			let (source, target) = match (index.get(&link.source), index.get(&link.target)) {
				(Some(&s), Some(&t)) => (s, t),
				(s, _) => {
					let missing = if s.is_none() {
						link.source.clone()
					} else {
						link.target.clone()
					};
					issues.push(DataIssue::DanglingLink {
						from: link.source,
						to: link.target,
						missing,
					});
					continue;
				}
			};
			let weight = if link.weight >= 1.0 {
				link.weight
			} else {
				issues.push(DataIssue::WeightClamped {
					from: link.source,
					to: link.target,
					weight: link.weight,
				});
				1.0
			};
			weight_sums[source] += weight;
			if source != target {
				weight_sums[target] += weight;
			}
			links.push(Link {
				source,
				target,
				weight,
			});
		}

		let nodes: Vec<Node> = records
			.into_iter()
			.zip(weight_sums)
			.map(|(record, computed)| {
				let color = record
					.color
					.clone()
					.unwrap_or_else(|| palette.kind_color(record.kind).to_string());
				let link_count = record.link_count.unwrap_or(computed).max(0.0);
				Node::from_record(record, color, link_count)
			})
			.collect();

		for issue in &issues {
			warn!("graph data: {issue}");
		}
		info!(
			"graph model built: {} nodes, {} links, {} issues",
			nodes.len(),
			links.len(),
			issues.len()
		);

		Self {
			generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
			nodes,
			links,
			index,
			adjacency: OnceCell::new(),
			issues,
		}
	}

	/// Identity of this build; results computed against another build are rejected.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	pub fn links(&self) -> &[Link] {
		&self.links
	}

	pub fn node(&self, idx: usize) -> Option<&Node> {
		self.nodes.get(idx)
	}

	pub fn index_of(&self, id: &str) -> Option<usize> {
		self.index.get(id).copied()
	}

	pub fn node_by_id(&self, id: &str) -> Option<&Node> {
		self.index_of(id).and_then(|idx| self.nodes.get(idx))
	}

	pub fn contains(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn issues(&self) -> &[DataIssue] {
		&self.issues
	}

	pub fn adjacency(&self) -> &Adjacency {
		self.adjacency
			.get_or_init(|| Adjacency::build(self.nodes.len(), &self.links))
	}

	pub fn position(&self, idx: usize) -> Option<Point> {
		self.nodes.get(idx).and_then(|n| n.position)
	}

	/// Node subset matching `keep`, plus the links whose endpoints both survive.
	pub fn filter(&self, keep: impl Fn(&Node) -> bool) -> GraphView {
		GraphView::from_mask(self, self.nodes.iter().map(keep).collect())
	}

	/// Case-insensitive substring search over labels and sublabels.
	pub fn search(&self, query: &str, limit: usize) -> Vec<usize> {
		let query = query.trim().to_lowercase();
		if query.is_empty() {
			return Vec::new();
		}
		self.nodes
			.iter()
			.enumerate()
			.filter(|(_, node)| {
				node.label.to_lowercase().contains(&query)
					|| node
						.sublabel
						.as_ref()
						.is_some_and(|s| s.to_lowercase().contains(&query))
			})
			.map(|(idx, _)| idx)
			.take(limit)
			.collect()
	}

	/// Extent of positioned nodes among `indices`.
	pub fn bounds_of(&self, indices: impl IntoIterator<Item = usize>) -> Option<BoundingBox> {
		BoundingBox::from_points(indices.into_iter().filter_map(|idx| self.position(idx)))
	}

	pub(crate) fn node_mut(&mut self, idx: usize) -> Option<&mut Node> {
		self.nodes.get_mut(idx)
	}

	/// Writes one completed layout step. Only the layout pipeline calls this.
	pub(crate) fn commit_positions(&mut self, positions: &[(usize, Point, Point)]) {
		for &(idx, position, velocity) in positions {
			if let Some(node) = self.nodes.get_mut(idx) {
				node.position = Some(position);
				node.velocity = Some(velocity);
			}
		}
	}

	/// Replaces every node's centrality at once. Returns false, changing nothing,
	/// if the scores were computed for a different build.
	pub(crate) fn merge_centrality(&mut self, generation: u64, scores: &[NodeCentrality]) -> bool {
		if generation != self.generation || scores.len() != self.nodes.len() {
			return false;
		}
		for (node, score) in self.nodes.iter_mut().zip(scores) {
			node.centrality = Some(*score);
		}
		true
	}
}

/// A derived, read-only subset of the model.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphView {
	nodes: Vec<usize>,
	links: Vec<usize>,
	mask: Vec<bool>,
}

impl GraphView {
	pub fn all(model: &GraphModel) -> Self {
		Self::from_mask(model, vec![true; model.len()])
	}

	fn from_mask(model: &GraphModel, mask: Vec<bool>) -> Self {
		let nodes = mask
			.iter()
			.enumerate()
			.filter_map(|(idx, &keep)| keep.then_some(idx))
			.collect();
		let links = model
			.links()
			.iter()
			.enumerate()
			.filter(|(_, l)| mask[l.source] && mask[l.target])
			.map(|(idx, _)| idx)
			.collect();
		Self { nodes, links, mask }
	}

	pub fn node_indices(&self) -> &[usize] {
		&self.nodes
	}

	pub fn link_indices(&self) -> &[usize] {
		&self.links
	}

	pub fn contains(&self, idx: usize) -> bool {
		self.mask.get(idx).copied().unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::components::force_graph::types::{GraphLink, GraphNode, NodeKind};

	fn sample() -> GraphData {
		GraphData {
			nodes: vec![
				GraphNode::new("m1", "Climate Act", NodeKind::Motion),
				GraphNode::new("m2", "Housing Reform", NodeKind::Motion),
				GraphNode::new("s1", "Ada Berg", NodeKind::Supporter).with_sublabel("KV Nord"),
				GraphNode::new("s2", "Jon Falk", NodeKind::Supporter),
			],
			links: vec![
				GraphLink::new("m1", "s1", 5.0),
				GraphLink::new("m1", "s2", 1.0),
				GraphLink::new("m2", "s2", 1.0),
			],
		}
	}

	#[test]
	fn link_count_is_sum_of_incident_weights() {
		let model = GraphModel::build(sample(), &Palette::default());
		let count = |id: &str| model.node_by_id(id).unwrap().link_count;
		assert_eq!(count("m1"), 6.0);
		assert_eq!(count("s1"), 5.0);
		assert_eq!(count("s2"), 2.0);
		assert!(model.issues().is_empty());
	}

	#[test]
	fn intrinsic_color_comes_from_kind() {
		let palette = Palette::default();
		let model = GraphModel::build(sample(), &palette);
		assert_eq!(model.node_by_id("m1").unwrap().color, palette.motion);
		assert_eq!(model.node_by_id("s1").unwrap().color, palette.supporter);
	}

	#[test]
	fn dangling_links_and_duplicates_are_dropped_with_issues() {
		let mut data = sample();
		data.nodes.push(GraphNode::new("m1", "Again", NodeKind::Motion));
		data.links.push(GraphLink::new("m2", "ghost", 1.0));
		data.links.push(GraphLink::new("m2", "s1", 0.0));
		let model = GraphModel::build(data, &Palette::default());

		assert_eq!(model.len(), 4);
		assert_eq!(model.node_by_id("m1").unwrap().label, "Climate Act");
		assert_eq!(model.links().len(), 4);
		assert_eq!(
			model.issues(),
			&[
				DataIssue::DuplicateNode("m1".into()),
				DataIssue::DanglingLink {
					from: "m2".into(),
					to: "ghost".into(),
					missing: "ghost".into()
				},
				DataIssue::WeightClamped {
					from: "m2".into(),
					to: "s1".into(),
					weight: 0.0
				},
			]
		);
	}

	#[test]
	fn adjacency_is_symmetric_and_ignores_self_loops() {
		let mut data = sample();
		data.links.push(GraphLink::new("s1", "s1", 1.0));
		let model = GraphModel::build(data, &Palette::default());
		let adj = model.adjacency();
		let (m1, s1, s2) = (
			model.index_of("m1").unwrap(),
			model.index_of("s1").unwrap(),
			model.index_of("s2").unwrap(),
		);
		assert!(adj.are_neighbors(m1, s1) && adj.are_neighbors(s1, m1));
		assert!(!adj.are_neighbors(s1, s1));
		assert_eq!(adj.degree(s2), 2);
		assert_eq!(adj.degree(s1), 1);
	}

	#[test]
	fn filter_induces_links_and_leaves_model_alone() {
		let model = GraphModel::build(sample(), &Palette::default());
		let view = model.filter(|n| n.id() != "m2");
		assert_eq!(view.node_indices().len(), 3);
		assert_eq!(view.link_indices().len(), 2);
		assert!(!view.contains(model.index_of("m2").unwrap()));
		assert_eq!(model.len(), 4);
		assert_eq!(GraphView::all(&model).link_indices().len(), 3);
	}

	#[test]
	fn search_matches_label_and_sublabel() {
		let model = GraphModel::build(sample(), &Palette::default());
		let hits = |q: &str| {
			model
				.search(q, 10)
				.into_iter()
				.map(|idx| model.nodes()[idx].id().to_string())
				.collect::<Vec<_>>()
		};
		assert_eq!(hits("reform"), vec!["m2"]);
		assert_eq!(hits("kv nord"), vec!["s1"]);
		assert!(hits("   ").is_empty());
		assert_eq!(model.search("a", 1).len(), 1);
	}

	#[test]
	fn stale_centrality_is_rejected() {
		let mut model = GraphModel::build(sample(), &Palette::default());
		let scores = vec![NodeCentrality::default(); model.len()];
		assert!(!model.merge_centrality(model.generation() + 1, &scores));
		assert!(!model.merge_centrality(model.generation(), &scores[..2]));
		assert!(model.nodes().iter().all(|n| n.centrality.is_none()));
		assert!(model.merge_centrality(model.generation(), &scores));
		assert!(model.nodes().iter().all(|n| n.centrality.is_some()));
	}
}
