use std::collections::HashMap;

use serde::Deserialize;

use super::quadtree::{ChargeField, QuadTree, pair_offset};
use super::seed::{SeedStrategy, seed_positions};
use super::{LayoutProvider, LayoutStatus, Positions};
use crate::components::force_graph::model::GraphModel;
use crate::components::force_graph::types::{Point, radius_for_link_count};

/// Force parameters. Defaults reproduce the layouts the position files were made with.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
	/// Spring strength per unit of link weight.
	pub link_strength: f64,
	pub max_link_strength: f64,
	/// Rest length of a weight-1 link; heavier links rest at `link_distance / sqrt(weight)`.
	pub link_distance: f64,
	/// Negative values repel.
	pub force_charge: f64,
	/// Pairs closer than this are treated as this far apart by the charge force.
	pub charge_min_distance: f64,
	/// Barnes-Hut opening ratio. A quad acts through its centroid once its
	/// width is below `theta` times its distance.
	pub theta: f64,
	/// Up to this many nodes the charge force is summed pair by pair.
	pub exact_charge_limit: usize,
	/// Collision radius as a multiple of the rendered radius.
	pub collision_scale: f64,
	pub collision_strength: f64,
	pub collision_iterations: usize,
	pub center_strength: f64,
	pub velocity_decay: f64,
	pub alpha_decay: f64,
	pub max_steps: usize,
	/// Stop once mean kinetic energy, scaled by alpha, drops below this.
	pub energy_threshold: f64,
}

impl Default for SimulationParameters {
	fn default() -> Self {
		Self {
			link_strength: 0.1,
			max_link_strength: 1.0,
			link_distance: 160.0,
			force_charge: -200.0,
			charge_min_distance: 15.0,
			theta: 0.9,
			exact_charge_limit: 512,
			collision_scale: 1.2,
			collision_strength: 4.0,
			collision_iterations: 20,
			center_strength: 0.001,
			velocity_decay: 0.2,
			alpha_decay: 0.02,
			max_steps: 500,
			energy_threshold: 1e-6,
		}
	}
}

impl SimulationParameters {
	pub fn alpha_min(&self) -> f64 {
		(1.0 - self.alpha_decay).powi(self.max_steps as i32)
	}
}

#[derive(Clone, Copy, Debug)]
struct Spring {
	source: usize,
	target: usize,
	strength: f64,
	distance: f64,
	bias: f64,
}

#[derive(Clone, Copy, Debug)]
struct Body {
	node: usize,
	pos: Point,
	vel: Point,
	radius: f64,
}

/// Deterministic stand-in for random jitter on coincident points.
pub(crate) fn jiggle(seed: usize) -> f64 {
	let s = (seed as u64).wrapping_mul(1_664_525).wrapping_add(1_013_904_223) % 4_294_967_296;
	(s as f64 / 4_294_967_296.0 - 0.5) * 1e-6
}

/// Iterative force layout over a snapshot of the model. Positions are only
/// handed back through [`ForceSimulation::committed`] after a whole step.
#[derive(Clone, Debug)]
pub struct ForceSimulation {
	params: SimulationParameters,
	generation: u64,
	ids: Vec<String>,
	bodies: Vec<Body>,
	springs: Vec<Spring>,
	center: Point,
	alpha: f64,
	steps: usize,
	energy: f64,
	cancelled: bool,
	finished: bool,
}

impl ForceSimulation {
	pub fn new(
		model: &GraphModel,
		params: SimulationParameters,
		seed: &SeedStrategy,
		center: Point,
	) -> Self {
		let seeded = seed_positions(model, seed, center);
		let bodies: Vec<Body> = model
			.nodes()
			.iter()
			.enumerate()
			.map(|(idx, node)| Body {
				node: idx,
				pos: node.position.unwrap_or(seeded[idx]),
				vel: node.velocity.unwrap_or_default(),
				radius: params.collision_scale * radius_for_link_count(node.link_count),
			})
			.collect();

		let mut link_counts = vec![0usize; bodies.len()];
		for link in model.links() {
			link_counts[link.source] += 1;
			link_counts[link.target] += 1;
		}
		let springs = model
			.links()
			.iter()
			.filter(|l| !l.is_self_loop())
			.map(|l| {
				let (cs, ct) = (link_counts[l.source] as f64, link_counts[l.target] as f64);
				Spring {
					source: l.source,
					target: l.target,
					strength: (params.link_strength * l.weight).min(params.max_link_strength),
					distance: params.link_distance / l.weight.sqrt(),
					bias: cs / (cs + ct),
				}
			})
			.collect();

		Self {
			params,
			generation: model.generation(),
			ids: model.nodes().iter().map(|n| n.id().to_string()).collect(),
			bodies,
			springs,
			center,
			alpha: 1.0,
			steps: 0,
			energy: f64::MAX,
			cancelled: false,
			finished: false,
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn energy(&self) -> f64 {
		self.energy
	}

	pub fn steps(&self) -> usize {
		self.steps
	}

	pub fn progress(&self) -> f64 {
		if self.finished {
			1.0
		} else {
			self.steps as f64 / self.params.max_steps.max(1) as f64
		}
	}

	pub fn cancel(&mut self) {
		self.cancelled = true;
	}

	pub fn status(&self) -> LayoutStatus {
		if self.cancelled {
			LayoutStatus::Cancelled
		} else if self.finished {
			LayoutStatus::Finished
		} else {
			LayoutStatus::Running {
				step: self.steps,
				max_steps: self.params.max_steps,
			}
		}
	}

	/// Advances one whole step unless already stopped.
	pub fn step(&mut self) -> LayoutStatus {
		if self.cancelled || self.finished {
			return self.status();
		}
		if self.bodies.is_empty() {
			self.finished = true;
			return self.status();
		}

		self.alpha += -self.alpha * self.params.alpha_decay;
		self.apply_springs();
		self.apply_charge();
		for _ in 0..self.params.collision_iterations {
			self.apply_collision();
		}
		self.apply_centering();

		let keep = 1.0 - self.params.velocity_decay;
		let mut kinetic = 0.0;
		for body in &mut self.bodies {
			body.vel.x *= keep;
			body.vel.y *= keep;
			body.pos.x += body.vel.x;
			body.pos.y += body.vel.y;
			kinetic += body.vel.x * body.vel.x + body.vel.y * body.vel.y;
		}
		self.energy = kinetic / self.bodies.len() as f64 * self.alpha;
		self.steps += 1;

		if self.steps >= self.params.max_steps
			|| self.alpha < self.params.alpha_min()
			|| self.energy < self.params.energy_threshold
		{
			self.finished = true;
		}
		self.status()
	}

	/// Runs to completion in a tight loop, for hosts without frame timing.
	pub fn run(&mut self) -> LayoutStatus {
		while let LayoutStatus::Running { .. } = self.step() {}
		self.status()
	}

	/// `(node index, position, velocity)` for every node, as of the last full step.
	pub fn committed(&self) -> Vec<(usize, Point, Point)> {
		self.bodies.iter().map(|b| (b.node, b.pos, b.vel)).collect()
	}

	fn apply_springs(&mut self) {
		let alpha = self.alpha;
		for (i, spring) in self.springs.iter().enumerate() {
			let (s, t) = (self.bodies[spring.source], self.bodies[spring.target]);
			let mut dx = t.pos.x + t.vel.x - s.pos.x - s.vel.x;
			let mut dy = t.pos.y + t.vel.y - s.pos.y - s.vel.y;
			if dx == 0.0 {
				dx = jiggle(i);
			}
			if dy == 0.0 {
				dy = jiggle(i + 1);
			}
			let len = (dx * dx + dy * dy).sqrt();
			let l = (len - spring.distance) / len * alpha * spring.strength;
			let (fx, fy) = (dx * l, dy * l);
			let target = &mut self.bodies[spring.target];
			target.vel.x -= fx * spring.bias;
			target.vel.y -= fy * spring.bias;
			let source = &mut self.bodies[spring.source];
			source.vel.x += fx * (1.0 - spring.bias);
			source.vel.y += fy * (1.0 - spring.bias);
		}
	}

	fn apply_charge(&mut self) {
		let field = ChargeField {
			strength: self.params.force_charge * self.alpha,
			min_distance2: self.params.charge_min_distance * self.params.charge_min_distance,
			theta2: self.params.theta * self.params.theta,
		};
		let points: Vec<Point> = self.bodies.iter().map(|b| b.pos).collect();
		let n = points.len();
		let deltas = if n <= self.params.exact_charge_limit {
			let mut deltas = vec![Point::default(); n];
			for i in 0..n {
				for j in (i + 1)..n {
					let (dx, dy) = pair_offset(i, j, &points);
					let mut l2 = dx * dx + dy * dy;
					if l2 < field.min_distance2 {
						l2 = (field.min_distance2 * l2).sqrt();
					}
					let (fx, fy) = (dx * field.strength / l2, dy * field.strength / l2);
					deltas[i].x += fx;
					deltas[i].y += fy;
					deltas[j].x -= fx;
					deltas[j].y -= fy;
				}
			}
			deltas
		} else {
			let tree = QuadTree::build(&points);
			(0..n).map(|i| tree.charge_on(i, &points, &field)).collect()
		};
		for (body, d) in self.bodies.iter_mut().zip(deltas) {
			body.vel.x += d.x;
			body.vel.y += d.y;
		}
	}

	/// One collision pass. Bodies are bucketed by predicted position into
	/// cells as wide as the largest possible overlap, so only the 3x3
	/// neighborhood of each cell is searched.
	fn apply_collision(&mut self) {
		let strength = self.params.collision_strength;
		let max_radius = self.bodies.iter().fold(0.0f64, |m, b| m.max(b.radius));
		if max_radius <= 0.0 {
			return;
		}
		let cell = 2.0 * max_radius;
		let key = |b: &Body| {
			(
				((b.pos.x + b.vel.x) / cell).floor() as i64,
				((b.pos.y + b.vel.y) / cell).floor() as i64,
			)
		};
		let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
		for (i, body) in self.bodies.iter().enumerate() {
			buckets.entry(key(body)).or_default().push(i);
		}

		for i in 0..self.bodies.len() {
			let (cx, cy) = key(&self.bodies[i]);
			for gx in cx - 1..=cx + 1 {
				for gy in cy - 1..=cy + 1 {
					let Some(cell_members) = buckets.get(&(gx, gy)) else {
						continue;
					};
					for &j in cell_members.iter().filter(|&&j| j > i) {
						self.collide(i, j, strength);
					}
				}
			}
		}
	}

	fn collide(&mut self, i: usize, j: usize, strength: f64) {
		let (a, b) = (self.bodies[i], self.bodies[j]);
		let r = a.radius + b.radius;
		let mut dx = a.pos.x + a.vel.x - b.pos.x - b.vel.x;
		let mut dy = a.pos.y + a.vel.y - b.pos.y - b.vel.y;
		let mut l2 = dx * dx + dy * dy;
		if l2 >= r * r {
			return;
		}
		if l2 == 0.0 {
			dx = jiggle(i + j);
			dy = jiggle(i * j + 1);
			l2 = dx * dx + dy * dy;
		}
		let len = l2.sqrt();
		let l = (r - len) / len * strength;
		let (ri2, rj2) = (a.radius * a.radius, b.radius * b.radius);
		let w = if ri2 + rj2 > 0.0 { rj2 / (ri2 + rj2) } else { 0.5 };
		self.bodies[i].vel.x += dx * l * w;
		self.bodies[i].vel.y += dy * l * w;
		self.bodies[j].vel.x -= dx * l * (1.0 - w);
		self.bodies[j].vel.y -= dy * l * (1.0 - w);
	}

	fn apply_centering(&mut self) {
		let n = self.bodies.len() as f64;
		let (sx, sy) = self
			.bodies
			.iter()
			.fold((0.0, 0.0), |(x, y), b| (x + b.pos.x, y + b.pos.y));
		let shift_x = (sx / n - self.center.x) * self.params.center_strength;
		let shift_y = (sy / n - self.center.y) * self.params.center_strength;
		for body in &mut self.bodies {
			body.pos.x -= shift_x;
			body.pos.y -= shift_y;
		}
	}
}

impl LayoutProvider for ForceSimulation {
	fn positions(&self) -> Positions {
		self.bodies
			.iter()
			.map(|b| (self.ids[b.node].clone(), b.pos))
			.collect::<HashMap<_, _>>()
	}

	fn is_settled(&self) -> bool {
		self.finished
	}
}
