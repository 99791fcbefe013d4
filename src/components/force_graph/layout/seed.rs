use std::f64::consts::PI;

use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters as RelaxParameters};
use serde::Deserialize;

use crate::components::force_graph::model::GraphModel;
use crate::components::force_graph::types::Point;

const SPIRAL_RADIUS: f64 = 10.0;

/// Where unpositioned nodes start before the weighted simulation takes over.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedStrategy {
	/// Phyllotaxis spiral around the center.
	#[default]
	Spiral,
	/// Circle around the center, relaxed by an unweighted spring pass first.
	Relaxed { ticks: usize },
}

/// Starting position for every node index, positioned or not.
pub(crate) fn seed_positions(
	model: &GraphModel,
	strategy: &SeedStrategy,
	center: Point,
) -> Vec<Point> {
	match strategy {
		SeedStrategy::Spiral => spiral(model.len(), center),
		SeedStrategy::Relaxed { ticks } => relaxed(model, center, *ticks),
	}
}

fn spiral(count: usize, center: Point) -> Vec<Point> {
	let angle = PI * (3.0 - 5f64.sqrt());
	(0..count)
		.map(|i| {
			let r = SPIRAL_RADIUS * (0.5 + i as f64).sqrt();
			let a = i as f64 * angle;
			Point::new(center.x + r * a.cos(), center.y + r * a.sin())
		})
		.collect()
}

fn relaxed(model: &GraphModel, center: Point, ticks: usize) -> Vec<Point> {
	let count = model.len();
	if count == 0 {
		return Vec::new();
	}

	let mut graph: ForceGraph<usize, ()> = ForceGraph::new(RelaxParameters {
		force_charge: 150.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	});

	let radius = 100.0 * (count as f64 / 10.0).sqrt().max(1.0);
	let handles: Vec<_> = (0..count)
		.map(|i| {
			let angle = i as f64 * 2.0 * PI / count as f64;
			graph.add_node(NodeData {
				x: (center.x + radius * angle.cos()) as f32,
				y: (center.y + radius * angle.sin()) as f32,
				mass: 10.0,
				is_anchor: false,
				user_data: i,
			})
		})
		.collect();

	for link in model.links().iter().filter(|l| !l.is_self_loop()) {
		graph.add_edge(handles[link.source], handles[link.target], EdgeData::default());
	}

	for _ in 0..ticks {
		graph.update(0.016);
	}

	let mut positions = spiral(count, center);
	graph.visit_nodes(|node| {
		let (x, y) = (node.x() as f64, node.y() as f64);
		if x.is_finite() && y.is_finite() {
			positions[node.data.user_data] = Point::new(x, y);
		}
	});
	positions
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::config::Palette;
	use crate::components::force_graph::types::{GraphData, GraphLink, GraphNode, NodeKind};

	#[test]
	fn spiral_points_are_distinct_and_centered() {
		let points = spiral(50, Point::new(100.0, 100.0));
		for (i, a) in points.iter().enumerate() {
			for b in &points[i + 1..] {
				assert!(a.distance(b) > 1.0);
			}
		}
		assert!(points[0].distance(&Point::new(100.0, 100.0)) < SPIRAL_RADIUS);
	}

	#[test]
	fn relaxed_seed_covers_every_node() {
		let data = GraphData {
			nodes: (0..6)
				.map(|i| GraphNode::new(format!("n{i}"), format!("N{i}"), NodeKind::Person))
				.collect(),
			links: vec![GraphLink::new("n0", "n1", 1.0), GraphLink::new("n1", "n2", 3.0)],
		};
		let model = GraphModel::build(data, &Palette::default());
		let seeded = seed_positions(&model, &SeedStrategy::Relaxed { ticks: 30 }, Point::default());
		assert_eq!(seeded.len(), 6);
		assert!(seeded.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
	}

	#[test]
	fn strategy_wire_shape() {
		let s: SeedStrategy = serde_json::from_str(r#"{"kind": "relaxed", "ticks": 40}"#).unwrap();
		assert_eq!(s, SeedStrategy::Relaxed { ticks: 40 });
	}
}
