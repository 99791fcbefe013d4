//! Kernel density contours for group highlighting.
//!
//! Samples are binned onto a grid padded around their extent, blurred with a
//! separable Gaussian, and traced with marching squares at evenly spaced
//! levels below the peak. The grid carries a border of empty cells wider than
//! the kernel, so every traced ring closes.

use std::collections::HashMap;

use log::{debug, warn};

use super::config::DensityConfig;
use super::types::Point;

/// Rings traced at one density level, in grid-local world units.
#[derive(Clone, Debug, PartialEq)]
pub struct ContourBand {
	pub threshold: f64,
	pub rings: Vec<Vec<Point>>,
}

/// Contours plus the offset that places them back in world space.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityContours {
	pub bands: Vec<ContourBand>,
	pub offset: Point,
	pub color: String,
}

impl DensityContours {
	pub fn to_world(&self, local: Point) -> Point {
		Point::new(local.x + self.offset.x, local.y + self.offset.y)
	}
}

#[derive(Clone, Debug)]
pub struct DensityEstimator {
	config: DensityConfig,
}

struct Grid {
	nx: usize,
	ny: usize,
	values: Vec<f64>,
}

impl Grid {
	fn at(&self, x: usize, y: usize) -> f64 {
		self.values[y * self.nx + x]
	}
}

/// Upper bound on grid cells for one estimate.
pub const MAX_GRID_CELLS: usize = 1 << 20;

struct GridSize {
	cell: f64,
	sigma: f64,
	radius: usize,
	margin: usize,
	nx: usize,
	ny: usize,
}

/// A grid edge: horizontal `(0, x, y)` joins `(x, y)` and `(x + 1, y)`,
/// vertical `(1, x, y)` joins `(x, y)` and `(x, y + 1)`.
type EdgeKey = (u8, usize, usize);

impl DensityEstimator {
	pub fn new(config: DensityConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &DensityConfig {
		&self.config
	}

	/// Grid dimensions for a padded extent. Cells are doubled in size until
	/// the grid fits within [`MAX_GRID_CELLS`].
	fn grid_size(&self, span: Point) -> GridSize {
		let requested = self.config.cell_size.max(0.5);
		let mut cell = requested;
		loop {
			let sigma = (self.config.bandwidth / cell).max(0.5);
			let radius = (3.0 * sigma).ceil();
			let margin = radius + 1.0;
			let nx = (span.x / cell).ceil() + 1.0 + 2.0 * margin;
			let ny = (span.y / cell).ceil() + 1.0 + 2.0 * margin;
			if nx * ny <= MAX_GRID_CELLS as f64 {
				if cell > requested {
					debug!(
						"density: cell size raised from {requested} to {cell} for a {nx}x{ny} grid"
					);
				}
				return GridSize {
					cell,
					sigma,
					radius: radius as usize,
					margin: margin as usize,
					nx: nx as usize,
					ny: ny as usize,
				};
			}
			cell *= 2.0;
		}
	}

	/// Contours for weighted samples `(position, weight)`. Fewer than three
	/// samples is "no contour", not an error.
	pub fn estimate(&self, samples: &[(Point, f64)], color: &str) -> Option<DensityContours> {
		if samples.len() < 3 {
			return None;
		}
		let (mut min, mut max) = (samples[0].0, samples[0].0);
		for (p, _) in samples {
			min = Point::new(min.x.min(p.x), min.y.min(p.y));
			max = Point::new(max.x.max(p.x), max.y.max(p.y));
		}
		let pad = self.config.padding.max(0.0);
		let span = Point::new(max.x - min.x + 2.0 * pad, max.y - min.y + 2.0 * pad);
		if !(span.x.is_finite() && span.y.is_finite()) {
			warn!("density: sample extent is not finite, skipping");
			return None;
		}
		let offset = Point::new(min.x - pad, min.y - pad);
		let GridSize {
			cell,
			sigma,
			radius,
			margin,
			nx,
			ny,
		} = self.grid_size(span);

		let mut grid = Grid {
			nx,
			ny,
			values: vec![0.0; nx * ny],
		};
		for &(p, w) in samples {
			let gx = ((p.x - offset.x) / cell).floor().max(0.0) as usize + margin;
			let gy = ((p.y - offset.y) / cell).floor().max(0.0) as usize + margin;
			grid.values[gy.min(ny - 1) * nx + gx.min(nx - 1)] += w;
		}
		blur(&mut grid, sigma, radius);

		let peak = grid.values.iter().copied().fold(0.0, f64::max);
		if peak <= 0.0 {
			return None;
		}

		let levels = self.config.thresholds.max(1);
		let to_local = |gx: f64, gy: f64| {
			Point::new(
				(gx - margin as f64 + 0.5) * cell,
				(gy - margin as f64 + 0.5) * cell,
			)
		};
		let bands: Vec<ContourBand> = (1..=levels)
			.map(|i| {
				let threshold = peak * i as f64 / (levels + 1) as f64;
				let rings = trace(&grid, threshold)
					.into_iter()
					.map(|ring| ring.into_iter().map(|p| to_local(p.x, p.y)).collect())
					.collect();
				ContourBand { threshold, rings }
			})
			.filter(|band| !band.rings.is_empty())
			.collect();

		debug!(
			"density: {} samples, {}x{} grid, {} bands",
			samples.len(),
			nx,
			ny,
			bands.len()
		);
		Some(DensityContours {
			bands,
			offset,
			color: color.to_string(),
		})
	}
}

fn blur(grid: &mut Grid, sigma: f64, radius: usize) {
	let r = radius as isize;
	let kernel: Vec<f64> = (-r..=r)
		.map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
		.collect();
	let norm: f64 = kernel.iter().sum();
	let kernel: Vec<f64> = kernel.into_iter().map(|k| k / norm).collect();

	let (nx, ny) = (grid.nx as isize, grid.ny as isize);
	let mut tmp = vec![0.0; grid.values.len()];
	for y in 0..ny {
		for x in 0..nx {
			let mut acc = 0.0;
			for (i, k) in kernel.iter().enumerate() {
				let sx = x + i as isize - r;
				if (0..nx).contains(&sx) {
					acc += k * grid.values[(y * nx + sx) as usize];
				}
			}
			tmp[(y * nx + x) as usize] = acc;
		}
	}
	for y in 0..ny {
		for x in 0..nx {
			let mut acc = 0.0;
			for (i, k) in kernel.iter().enumerate() {
				let sy = y + i as isize - r;
				if (0..ny).contains(&sy) {
					acc += k * tmp[(sy * nx + x) as usize];
				}
			}
			grid.values[(y * nx + x) as usize] = acc;
		}
	}
}

/// Closed rings at `threshold`, in grid coordinates.
fn trace(grid: &Grid, threshold: f64) -> Vec<Vec<Point>> {
	let mut segments: Vec<(EdgeKey, EdgeKey)> = Vec::new();
	for y in 0..grid.ny - 1 {
		for x in 0..grid.nx - 1 {
			let inside = |cx, cy| grid.at(cx, cy) >= threshold;
			let code = (inside(x, y) as u8) << 3
				| (inside(x + 1, y) as u8) << 2
				| (inside(x + 1, y + 1) as u8) << 1
				| inside(x, y + 1) as u8;
			let top = (0, x, y);
			let bottom = (0, x, y + 1);
			let left = (1, x, y);
			let right = (1, x + 1, y);
			match code {
				1 | 14 => segments.push((left, bottom)),
				2 | 13 => segments.push((bottom, right)),
				3 | 12 => segments.push((left, right)),
				4 | 11 => segments.push((top, right)),
				6 | 9 => segments.push((top, bottom)),
				7 | 8 => segments.push((top, left)),
				// Saddles always separate the two inside corners.
				5 => {
					segments.push((top, right));
					segments.push((left, bottom));
				}
				10 => {
					segments.push((top, left));
					segments.push((bottom, right));
				}
				_ => {}
			}
		}
	}

	let mut by_edge: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
	for (i, &(a, b)) in segments.iter().enumerate() {
		by_edge.entry(a).or_default().push(i);
		by_edge.entry(b).or_default().push(i);
	}

	let mut used = vec![false; segments.len()];
	let mut rings = Vec::new();
	for first in 0..segments.len() {
		if used[first] {
			continue;
		}
		used[first] = true;
		let (start, mut current) = segments[first];
		let mut keys = vec![start];
		while current != start {
			keys.push(current);
			let next = by_edge
				.get(&current)
				.and_then(|list| list.iter().copied().find(|&s| !used[s]));
			let Some(next) = next else {
				break;
			};
			used[next] = true;
			let (a, b) = segments[next];
			current = if a == current { b } else { a };
		}
		if current == start && keys.len() >= 3 {
			rings.push(keys.into_iter().map(|k| crossing(grid, k, threshold)).collect());
		}
	}
	rings
}

fn crossing(grid: &Grid, (axis, x, y): EdgeKey, threshold: f64) -> Point {
	let (x2, y2) = if axis == 0 { (x + 1, y) } else { (x, y + 1) };
	let (a, b) = (grid.at(x, y), grid.at(x2, y2));
	let t = if b != a {
		((threshold - a) / (b - a)).clamp(0.0, 1.0)
	} else {
		0.5
	};
	Point::new(
		x as f64 + (x2 - x) as f64 * t,
		y as f64 + (y2 - y) as f64 * t,
	)
}

/// Contours cached per group id until invalidated. A cached `None` records
/// "too few members" so it is not recomputed every frame either.
#[derive(Debug, Default)]
pub struct DensityCache {
	entries: HashMap<String, Option<DensityContours>>,
}

impl DensityCache {
	pub fn get_or_compute(
		&mut self,
		group_id: &str,
		compute: impl FnOnce() -> Option<DensityContours>,
	) -> Option<&DensityContours> {
		self.entries
			.entry(group_id.to_string())
			.or_insert_with(compute)
			.as_ref()
	}

	pub fn get(&self, group_id: &str) -> Option<&DensityContours> {
		self.entries.get(group_id).and_then(Option::as_ref)
	}

	pub fn invalidate(&mut self, group_id: &str) {
		self.entries.remove(group_id);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn is_cached(&self, group_id: &str) -> bool {
		self.entries.contains_key(group_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn estimator() -> DensityEstimator {
		DensityEstimator::new(DensityConfig::default())
	}

	fn samples(points: &[(f64, f64)]) -> Vec<(Point, f64)> {
		points.iter().map(|&(x, y)| (Point::new(x, y), 1.0)).collect()
	}

	fn contains(ring: &[Point], p: Point) -> bool {
		let mut inside = false;
		let mut j = ring.len() - 1;
		for i in 0..ring.len() {
			let (a, b) = (ring[i], ring[j]);
			if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
				inside = !inside;
			}
			j = i;
		}
		inside
	}

	#[test]
	fn fewer_than_three_points_is_no_contour() {
		assert!(estimator().estimate(&[], "#fff").is_none());
		assert!(
			estimator()
				.estimate(&samples(&[(0.0, 0.0), (5.0, 5.0)]), "#fff")
				.is_none()
		);
	}

	#[test]
	fn far_flung_samples_coarsen_the_grid() {
		let pts = [(0.0, 0.0), (1e10, 0.0), (0.0, 1e10)];
		let contours = estimator().estimate(&samples(&pts), "#fff").unwrap();
		assert!(contours.offset.x.is_finite() && contours.offset.y.is_finite());

		let span = Point::new(1e10 + 100.0, 1e10 + 100.0);
		let size = estimator().grid_size(span);
		assert!(size.nx * size.ny <= MAX_GRID_CELLS);
		assert!(size.cell > DensityConfig::default().cell_size);
	}

	#[test]
	fn non_finite_extent_is_no_contour() {
		let pts = [(0.0, 0.0), (f64::MAX, 0.0), (-f64::MAX, 0.0)];
		assert!(estimator().estimate(&samples(&pts), "#fff").is_none());
	}

	#[test]
	fn innermost_band_surrounds_the_cluster() {
		let pts = [(100.0, 100.0), (110.0, 100.0), (100.0, 110.0), (108.0, 108.0)];
		let contours = estimator().estimate(&samples(&pts), "#abc").unwrap();
		assert_eq!(contours.color, "#abc");
		assert!(!contours.bands.is_empty());

		let top = contours.bands.last().unwrap();
		let center = Point::new(104.5, 104.5);
		let local = Point::new(center.x - contours.offset.x, center.y - contours.offset.y);
		assert!(top.rings.iter().any(|ring| contains(ring, local)));

		let mut thresholds = contours.bands.iter().map(|b| b.threshold);
		let mut prev = thresholds.next().unwrap();
		for t in thresholds {
			assert!(t > prev);
			prev = t;
		}
	}

	#[test]
	fn separate_clusters_give_separate_peaks() {
		let pts = [
			(0.0, 0.0),
			(10.0, 0.0),
			(0.0, 10.0),
			(500.0, 0.0),
			(510.0, 0.0),
			(500.0, 10.0),
		];
		let contours = estimator().estimate(&samples(&pts), "#abc").unwrap();
		assert_eq!(contours.bands.last().unwrap().rings.len(), 2);
		assert_eq!(contours.bands.first().unwrap().rings.len(), 2);
	}

	#[test]
	fn rings_stay_inside_the_padded_extent() {
		let pts = [(0.0, 0.0), (40.0, 10.0), (20.0, 60.0)];
		let config = DensityConfig::default();
		let reach = config.padding + 4.0 * config.bandwidth;
		let contours = estimator().estimate(&samples(&pts), "#abc").unwrap();
		for band in &contours.bands {
			for ring in &band.rings {
				assert!(ring.len() >= 3);
				for &p in ring {
					let w = contours.to_world(p);
					assert!(w.x > -reach && w.x < 40.0 + reach);
					assert!(w.y > -reach && w.y < 60.0 + reach);
				}
			}
		}
	}

	#[test]
	fn cache_computes_once_until_invalidated() {
		let mut cache = DensityCache::default();
		let mut calls = 0;
		let pts = samples(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
		for _ in 0..3 {
			cache.get_or_compute("g1", || {
				calls += 1;
				estimator().estimate(&pts, "#abc")
			});
		}
		assert_eq!(calls, 1);
		cache.invalidate("g1");
		assert!(!cache.is_cached("g1"));
		cache.get_or_compute("g1", || {
			calls += 1;
			None
		});
		assert_eq!(calls, 2);
		assert!(cache.is_cached("g1"));
	}
}
