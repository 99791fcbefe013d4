//! Pan/zoom state and the screen <-> world mapping.

use serde::{Deserialize, Serialize};

use super::types::Point;

/// `screen = (x, y) + k * world`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self::IDENTITY
	}
}

impl ViewTransform {
	pub const IDENTITY: ViewTransform = ViewTransform {
		x: 0.0,
		y: 0.0,
		k: 1.0,
	};

	pub fn to_world(&self, sx: f64, sy: f64) -> Point {
		Point::new((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	pub fn to_screen(&self, wx: f64, wy: f64) -> Point {
		Point::new(self.x + self.k * wx, self.y + self.k * wy)
	}

	fn lerp(&self, to: &ViewTransform, t: f64) -> ViewTransform {
		ViewTransform {
			x: self.x + (to.x - self.x) * t,
			y: self.y + (to.y - self.y) * t,
			k: self.k + (to.k - self.k) * t,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl BoundingBox {
	pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
		points.into_iter().fold(None, |acc, p| {
			Some(match acc {
				None => BoundingBox {
					min_x: p.x,
					min_y: p.y,
					max_x: p.x,
					max_y: p.y,
				},
				Some(b) => BoundingBox {
					min_x: b.min_x.min(p.x),
					min_y: b.min_y.min(p.y),
					max_x: b.max_x.max(p.x),
					max_y: b.max_y.max(p.y),
				},
			})
		})
	}

	pub fn width(&self) -> f64 {
		self.max_x - self.min_x
	}

	pub fn height(&self) -> f64 {
		self.max_y - self.min_y
	}

	pub fn center(&self) -> Point {
		Point::new(
			(self.min_x + self.max_x) / 2.0,
			(self.min_y + self.max_y) / 2.0,
		)
	}

	pub fn padded(&self, pad: f64) -> Self {
		BoundingBox {
			min_x: self.min_x - pad,
			min_y: self.min_y - pad,
			max_x: self.max_x + pad,
			max_y: self.max_y + pad,
		}
	}
}

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Debug)]
struct Transition {
	from: ViewTransform,
	elapsed_ms: f64,
	duration_ms: f64,
}

/// Viewport state. The logical transform jumps straight to its end state; the
/// displayed transform eases toward it over a short transition.
#[derive(Clone, Debug)]
pub struct Viewport {
	transform: ViewTransform,
	transition: Option<Transition>,
	pub width: f64,
	pub height: f64,
	pub min_zoom: f64,
	pub max_zoom: f64,
}

impl Viewport {
	/// Zoom bounds given in either order are normalized, and the initial
	/// scale is clamped into them.
	pub fn new(width: f64, height: f64, min_zoom: f64, max_zoom: f64) -> Self {
		let (min_zoom, max_zoom) = (min_zoom.min(max_zoom), min_zoom.max(max_zoom));
		Self {
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0f64.clamp(min_zoom, max_zoom),
			},
			transition: None,
			width,
			height,
			min_zoom,
			max_zoom,
		}
	}

	/// Logical state: what every contract reads.
	pub fn transform(&self) -> ViewTransform {
		self.transform
	}

	/// What is on screen right now, mid-transition or not.
	pub fn displayed(&self) -> ViewTransform {
		match &self.transition {
			Some(tr) => {
				let t = (tr.elapsed_ms / tr.duration_ms).clamp(0.0, 1.0);
				tr.from.lerp(&self.transform, ease_out_cubic(t))
			}
			None => self.transform,
		}
	}

	pub fn is_animating(&self) -> bool {
		self.transition.is_some()
	}

	/// Advances the transition; returns whether it is still running.
	pub fn tick(&mut self, dt_ms: f64) -> bool {
		if let Some(tr) = &mut self.transition {
			tr.elapsed_ms += dt_ms;
			if tr.elapsed_ms >= tr.duration_ms {
				self.transition = None;
			}
		}
		self.transition.is_some()
	}

	pub fn clamp_scale(&self, k: f64) -> f64 {
		k.clamp(self.min_zoom, self.max_zoom)
	}

	/// Immediate set, cancelling any transition. Scale is clamped.
	pub fn set(&mut self, transform: ViewTransform) {
		self.transition = None;
		self.transform = ViewTransform {
			k: self.clamp_scale(transform.k),
			..transform
		};
	}

	/// Stops a running transition where it is, as a gesture grabbing the view would.
	pub fn interrupt(&mut self) {
		if self.transition.is_some() {
			self.transform = self.displayed();
			self.transition = None;
		}
	}

	/// Eased set. The logical transform is the end state at once.
	pub fn animate_to(&mut self, transform: ViewTransform, duration_ms: f64) {
		let from = self.displayed();
		self.set(transform);
		if duration_ms > 0.0 && from != self.transform {
			self.transition = Some(Transition {
				from,
				elapsed_ms: 0.0,
				duration_ms,
			});
		}
	}

	pub fn to_world(&self, sx: f64, sy: f64) -> Point {
		self.transform.to_world(sx, sy)
	}

	pub fn to_screen(&self, wx: f64, wy: f64) -> Point {
		self.transform.to_screen(wx, wy)
	}

	/// Zooms to `k` keeping the world point under `focal` (screen) fixed.
	pub fn zoom_to(&mut self, k: f64, focal: Point) {
		let current = self.transform;
		let anchor = current.to_world(focal.x, focal.y);
		let k = self.clamp_scale(k);
		self.set(ViewTransform {
			x: focal.x - anchor.x * k,
			y: focal.y - anchor.y * k,
			k,
		});
	}

	pub fn pan_by(&mut self, dx: f64, dy: f64) {
		let t = self.transform;
		self.set(ViewTransform {
			x: t.x + dx,
			y: t.y + dy,
			k: t.k,
		});
	}

	/// Transform placing `world` at the viewport center at the current scale.
	pub fn centered_on(&self, world: Point) -> ViewTransform {
		let k = self.transform.k;
		ViewTransform {
			x: self.width / 2.0 - world.x * k,
			y: self.height / 2.0 - world.y * k,
			k,
		}
	}

	/// Transform fitting `bbox` into `margin` of the viewport, centered.
	pub fn fitted_to(&self, bbox: &BoundingBox, margin: f64) -> ViewTransform {
		let (w, h) = (bbox.width(), bbox.height());
		let k = if w <= 0.0 && h <= 0.0 {
			self.transform.k
		} else {
			margin / (w / self.width).max(h / self.height)
		};
		let k = self.clamp_scale(k);
		let c = bbox.center();
		ViewTransform {
			x: self.width / 2.0 - c.x * k,
			y: self.height / 2.0 - c.y * k,
			k,
		}
	}

	/// Surface size changed; world space and the current transform stay put.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn close(a: Point, b: Point) -> bool {
		(a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
	}

	proptest! {
		#[test]
		fn world_screen_round_trip(
			x in -1e4f64..1e4, y in -1e4f64..1e4,
			tx in -1e4f64..1e4, ty in -1e4f64..1e4, k in 0.01f64..10.0,
		) {
			let t = ViewTransform { x: tx, y: ty, k };
			let s = t.to_screen(x, y);
			let back = t.to_world(s.x, s.y);
			prop_assert!((back.x - x).abs() <= 1e-6 * x.abs().max(1.0));
			prop_assert!((back.y - y).abs() <= 1e-6 * y.abs().max(1.0));
		}

		#[test]
		fn zoom_keeps_focal_point_fixed(
			fx in 0f64..800.0, fy in 0f64..600.0, k in 0.05f64..8.0,
		) {
			let mut viewport = Viewport::new(800.0, 600.0, 0.01, 10.0);
			viewport.pan_by(37.0, -12.0);
			let before = viewport.to_world(fx, fy);
			viewport.zoom_to(k, Point::new(fx, fy));
			let after = viewport.to_world(fx, fy);
			prop_assert!((before.x - after.x).abs() < 1e-6);
			prop_assert!((before.y - after.y).abs() < 1e-6);
		}
	}

	#[test]
	fn scale_is_clamped() {
		let mut viewport = Viewport::new(800.0, 600.0, 0.5, 4.0);
		viewport.zoom_to(100.0, Point::new(0.0, 0.0));
		assert_eq!(viewport.transform().k, 4.0);
		viewport.zoom_to(0.0001, Point::new(0.0, 0.0));
		assert_eq!(viewport.transform().k, 0.5);
	}

	#[test]
	fn initial_scale_respects_bounds_in_either_order() {
		let viewport = Viewport::new(800.0, 600.0, 4.0, 2.0);
		assert_eq!((viewport.min_zoom, viewport.max_zoom), (2.0, 4.0));
		assert_eq!(viewport.transform().k, 2.0);
		assert_eq!(viewport.displayed().k, 2.0);

		let viewport = Viewport::new(800.0, 600.0, 0.1, 0.5);
		assert_eq!(viewport.transform().k, 0.5);
	}

	#[test]
	fn center_on_puts_point_mid_screen() {
		let mut viewport = Viewport::new(800.0, 600.0, 0.01, 10.0);
		viewport.zoom_to(2.0, Point::new(100.0, 100.0));
		let target = viewport.centered_on(Point::new(40.0, -25.0));
		viewport.animate_to(target, 750.0);
		assert!(close(viewport.to_screen(40.0, -25.0), Point::new(400.0, 300.0)));
		assert!(viewport.is_animating());
	}

	#[test]
	fn fit_to_content_contains_bbox() {
		let viewport = Viewport::new(800.0, 600.0, 0.01, 10.0);
		let bbox = BoundingBox {
			min_x: -100.0,
			min_y: -50.0,
			max_x: 300.0,
			max_y: 150.0,
		};
		let t = viewport.fitted_to(&bbox, 0.9);
		assert!((t.k - 1.8).abs() < 1e-9);
		let lo = t.to_screen(bbox.min_x, bbox.min_y);
		let hi = t.to_screen(bbox.max_x, bbox.max_y);
		assert!(lo.x >= 0.0 && lo.y >= 0.0 && hi.x <= 800.0 && hi.y <= 600.0);
		assert!(close(t.to_screen(100.0, 50.0), Point::new(400.0, 300.0)));
	}

	#[test]
	fn transition_eases_toward_logical_state() {
		let mut viewport = Viewport::new(800.0, 600.0, 0.01, 10.0);
		let start = viewport.transform();
		let end = ViewTransform {
			x: 0.0,
			y: 0.0,
			k: 2.0,
		};
		viewport.animate_to(end, 100.0);
		assert_eq!(viewport.transform(), end);
		assert_eq!(viewport.displayed(), start);
		viewport.tick(50.0);
		let mid = viewport.displayed();
		assert!(mid.k > start.k && mid.k < end.k);
		assert!(!viewport.tick(60.0));
		assert_eq!(viewport.displayed(), end);
	}

	#[test]
	fn resize_keeps_world_mapping() {
		let mut viewport = Viewport::new(800.0, 600.0, 0.01, 10.0);
		let before = viewport.to_world(10.0, 10.0);
		viewport.resize(1024.0, 768.0);
		assert!(close(viewport.to_world(10.0, 10.0), before));
	}
}
