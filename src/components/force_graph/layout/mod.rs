//! Node placement. The simulation and precomputed files are the only writers
//! of node positions.

mod precomputed;
mod quadtree;
mod seed;
mod simulation;

use std::collections::HashMap;

pub use precomputed::{PositionRecord, PrecomputedLayout};
pub use seed::SeedStrategy;
pub use simulation::{ForceSimulation, SimulationParameters};

use super::model::GraphModel;
use super::types::Point;

/// Node id to world position.
pub type Positions = HashMap<String, Point>;

pub trait LayoutProvider {
	fn positions(&self) -> Positions;

	/// Whether the positions are final.
	fn is_settled(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayoutStatus {
	Running { step: usize, max_steps: usize },
	Finished,
	Cancelled,
}

/// Every positioned node as a position record, including its current size and link count.
pub fn export_positions(model: &GraphModel) -> Vec<PositionRecord> {
	model
		.nodes()
		.iter()
		.filter_map(|node| {
			let p = node.position?;
			Some(PositionRecord {
				id: node.id().to_string(),
				x: p.x,
				y: p.y,
				vx: node.velocity.map(|v| v.x),
				vy: node.velocity.map(|v| v.y),
				size: node.size,
				link_count: Some(node.link_count),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::config::Palette;
	use crate::components::force_graph::types::{GraphData, GraphLink, GraphNode, NodeKind};

	#[test]
	fn exported_positions_reload_into_the_same_layout() {
		let data = GraphData {
			nodes: vec![
				GraphNode::new("a", "A", NodeKind::Motion),
				GraphNode::new("b", "B", NodeKind::Supporter),
			],
			links: vec![GraphLink::new("a", "b", 2.0)],
		};
		let mut model = GraphModel::build(data.clone(), &Palette::default());
		let mut sim = ForceSimulation::new(
			&model,
			SimulationParameters::default(),
			&SeedStrategy::Spiral,
			Point::default(),
		);
		sim.run();
		model.commit_positions(&sim.committed());

		let exported = export_positions(&model);
		assert_eq!(exported.len(), 2);
		let json = serde_json::to_string(&exported).unwrap();

		let mut reloaded = GraphModel::build(data, &Palette::default());
		PrecomputedLayout::from_json(&json).unwrap().apply(&mut reloaded);
		for node in model.nodes() {
			let (before, after) = (
				node.position.unwrap(),
				reloaded.node_by_id(node.id()).unwrap().position.unwrap(),
			);
			assert!(before.distance(&after) < 1e-9);
		}
	}
}
