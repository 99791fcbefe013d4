//! Barnes-Hut quadtree over body positions, for the many-body charge force.

use crate::components::force_graph::types::Point;

const MAX_DEPTH: usize = 24;

#[derive(Clone, Debug)]
struct Quad {
	x0: f64,
	y0: f64,
	size: f64,
	/// Number of bodies below this quad; every body carries the same charge.
	count: f64,
	centroid: Point,
	children: [Option<usize>; 4],
	/// Bodies held directly, for leaves only.
	bodies: Vec<usize>,
}

impl Quad {
	fn contains(&self, p: Point) -> bool {
		p.x >= self.x0 && p.x <= self.x0 + self.size && p.y >= self.y0 && p.y <= self.y0 + self.size
	}

	fn is_leaf(&self) -> bool {
		self.children.iter().all(Option::is_none)
	}
}

/// Charge field settings for one step.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChargeField {
	/// Charge per body, already scaled by alpha. Negative repels.
	pub strength: f64,
	pub min_distance2: f64,
	pub theta2: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct QuadTree {
	quads: Vec<Quad>,
}

impl QuadTree {
	pub(crate) fn build(points: &[Point]) -> Self {
		let mut tree = Self { quads: Vec::new() };
		if points.is_empty() {
			return tree;
		}
		let (mut x0, mut y0, mut x1, mut y1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
		for p in points {
			x0 = x0.min(p.x);
			y0 = y0.min(p.y);
			x1 = x1.max(p.x);
			y1 = y1.max(p.y);
		}
		let size = (x1 - x0).max(y1 - y0).max(1.0);
		tree.split(points, (0..points.len()).collect(), x0, y0, size, 0);
		tree
	}

	fn split(
		&mut self,
		points: &[Point],
		members: Vec<usize>,
		x0: f64,
		y0: f64,
		size: f64,
		depth: usize,
	) -> usize {
		let count = members.len() as f64;
		let (sx, sy) = members
			.iter()
			.fold((0.0, 0.0), |(x, y), &i| (x + points[i].x, y + points[i].y));
		let id = self.quads.len();
		self.quads.push(Quad {
			x0,
			y0,
			size,
			count,
			centroid: Point::new(sx / count, sy / count),
			children: [None; 4],
			bodies: Vec::new(),
		});
		if members.len() <= 1 || depth >= MAX_DEPTH {
			self.quads[id].bodies = members;
			return id;
		}

		let half = size / 2.0;
		let mut parts: [Vec<usize>; 4] = Default::default();
		for i in members {
			let east = points[i].x >= x0 + half;
			let south = points[i].y >= y0 + half;
			parts[usize::from(east) + 2 * usize::from(south)].push(i);
		}
		for (q, part) in parts.into_iter().enumerate() {
			if part.is_empty() {
				continue;
			}
			let cx = x0 + if q % 2 == 1 { half } else { 0.0 };
			let cy = y0 + if q >= 2 { half } else { 0.0 };
			let child = self.split(points, part, cx, cy, half, depth + 1);
			self.quads[id].children[q] = Some(child);
		}
		id
	}

	/// Velocity change on body `i` from every other body. Distant quads that
	/// do not contain `i` act through their centroid.
	pub(crate) fn charge_on(&self, i: usize, points: &[Point], field: &ChargeField) -> Point {
		let mut out = Point::default();
		if !self.quads.is_empty() {
			self.accumulate(0, i, points, field, &mut out);
		}
		out
	}

	fn accumulate(
		&self,
		q: usize,
		i: usize,
		points: &[Point],
		field: &ChargeField,
		out: &mut Point,
	) {
		let quad = &self.quads[q];
		let p = points[i];
		if quad.is_leaf() {
			for &j in &quad.bodies {
				if j != i {
					let (dx, dy) = pair_offset(i, j, points);
					push(out, dx, dy, field.strength, field);
				}
			}
			return;
		}

		let (dx, dy) = (quad.centroid.x - p.x, quad.centroid.y - p.y);
		let l2 = dx * dx + dy * dy;
		if !quad.contains(p) && quad.size * quad.size < field.theta2 * l2 {
			push(out, dx, dy, field.strength * quad.count, field);
			return;
		}
		for child in quad.children.iter().flatten() {
			self.accumulate(*child, i, points, field, out);
		}
	}
}

/// Offset from `i` to `j`, antisymmetric even for coincident points.
pub(crate) fn pair_offset(i: usize, j: usize, points: &[Point]) -> (f64, f64) {
	let (a, b) = (points[i], points[j]);
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	if dx != 0.0 || dy != 0.0 {
		return (dx, dy);
	}
	let n = points.len();
	let (lo, hi) = (i.min(j), i.max(j));
	let sign = if i < j { 1.0 } else { -1.0 };
	(
		sign * super::simulation::jiggle(lo * n + hi),
		sign * super::simulation::jiggle(hi * n + lo),
	)
}

fn push(out: &mut Point, dx: f64, dy: f64, strength: f64, field: &ChargeField) {
	let mut l2 = dx * dx + dy * dy;
	if l2 < field.min_distance2 {
		l2 = (field.min_distance2 * l2).sqrt();
	}
	out.x += dx * strength / l2;
	out.y += dy * strength / l2;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scatter(n: usize) -> Vec<Point> {
		(0..n)
			.map(|i| {
				let a = i as f64 * 2.399_963;
				let r = 12.0 * (i as f64 + 0.5).sqrt();
				Point::new(r * a.cos(), r * a.sin())
			})
			.collect()
	}

	fn exact(i: usize, points: &[Point], field: &ChargeField) -> Point {
		let mut out = Point::default();
		for j in (0..points.len()).filter(|&j| j != i) {
			let (dx, dy) = pair_offset(i, j, points);
			push(&mut out, dx, dy, field.strength, field);
		}
		out
	}

	fn field(theta: f64) -> ChargeField {
		ChargeField {
			strength: -200.0,
			min_distance2: 225.0,
			theta2: theta * theta,
		}
	}

	#[test]
	fn zero_theta_matches_pairwise_sum() {
		let points = scatter(60);
		let tree = QuadTree::build(&points);
		for i in [0, 17, 59] {
			let (a, b) = (tree.charge_on(i, &points, &field(0.0)), exact(i, &points, &field(0.0)));
			assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{a:?} vs {b:?}");
		}
	}

	#[test]
	fn approximation_stays_close_to_exact() {
		let points = scatter(400);
		let tree = QuadTree::build(&points);
		let f = field(0.9);
		for i in [3, 150, 399] {
			let (a, b) = (tree.charge_on(i, &points, &f), exact(i, &points, &f));
			let err = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
			// Summed magnitude of every pair term; the net force can nearly cancel
			let scale: f64 = (0..points.len())
				.filter(|&j| j != i)
				.map(|j| {
					let mut one = Point::default();
					let (dx, dy) = pair_offset(i, j, &points);
					push(&mut one, dx, dy, f.strength, &f);
					(one.x * one.x + one.y * one.y).sqrt()
				})
				.sum();
			assert!(err <= 0.05 * scale, "error {err} against {scale}");
		}
	}

	#[test]
	fn coincident_points_do_not_blow_up() {
		let points = vec![Point::default(); 30];
		let tree = QuadTree::build(&points);
		let f = tree.charge_on(4, &points, &field(0.9));
		assert!(f.x.is_finite() && f.y.is_finite());
	}
}
