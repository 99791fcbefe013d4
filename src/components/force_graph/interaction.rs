//! Pointer handling: hit-testing, selection, hover and pan gestures. Works in
//! node indices; the engine maps them to ids and events.

use super::model::{GraphModel, GraphView};
use super::settings::Settings;
use super::types::Point;
use super::viewport::ViewTransform;

/// Screen distance a press may travel and still count as a click.
const CLICK_SLOP_PX: f64 = 3.0;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PanState {
	pub active: bool,
	pub start: Point,
	pub last: Point,
	pub travelled: f64,
}

/// What a released pointer turned out to be.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerRelease {
	Click(Point),
	PanEnd,
	Idle,
}

#[derive(Clone, Debug)]
pub struct InteractionController {
	selection: Option<usize>,
	hover: Option<usize>,
	pan: PanState,
	hit_tolerance_px: f64,
}

impl InteractionController {
	pub fn new(hit_tolerance_px: f64) -> Self {
		Self {
			selection: None,
			hover: None,
			pan: PanState::default(),
			hit_tolerance_px,
		}
	}

	pub fn selection(&self) -> Option<usize> {
		self.selection
	}

	pub fn hover(&self) -> Option<usize> {
		self.hover
	}

	pub fn pan(&self) -> &PanState {
		&self.pan
	}

	/// Topmost visible node within its rendered radius plus the screen tolerance
	/// of `screen`. Nodes are drawn in view order, so the scan runs backwards.
	pub fn hit_test(
		&self,
		model: &GraphModel,
		view: &GraphView,
		settings: &Settings,
		transform: &ViewTransform,
		screen: Point,
	) -> Option<usize> {
		let k = transform.k;
		if k <= 0.0 {
			return None;
		}
		let world = transform.to_world(screen.x, screen.y);
		let tolerance = self.hit_tolerance_px / k;
		view.node_indices().iter().rev().copied().find(|&idx| {
			let Some(node) = model.node(idx) else {
				return false;
			};
			let Some(pos) = node.position else {
				return false;
			};
			let radius = settings.node_radius(node.base_radius(), k);
			pos.distance(&world) <= radius + tolerance
		})
	}

	/// Sets the selection. Re-selecting the current node changes nothing but
	/// still counts as a selection, so the caller always notifies.
	pub fn select(&mut self, node: Option<usize>) -> bool {
		let changed = self.selection != node;
		self.selection = node;
		changed
	}

	/// Returns whether the hovered node changed.
	pub fn set_hover(&mut self, node: Option<usize>) -> bool {
		if self.hover == node {
			return false;
		}
		self.hover = node;
		true
	}

	/// Drops selection and hover that are no longer visible. Returns whether
	/// the selection was cleared.
	pub fn retain_visible(&mut self, view: &GraphView) -> bool {
		if self.hover.is_some_and(|h| !view.contains(h)) {
			self.hover = None;
		}
		match self.selection {
			Some(sel) if !view.contains(sel) => {
				self.selection = None;
				true
			}
			_ => false,
		}
	}

	pub fn reset(&mut self) {
		self.selection = None;
		self.hover = None;
		self.pan = PanState::default();
	}

	pub fn pointer_down(&mut self, screen: Point) {
		self.pan = PanState {
			active: true,
			start: screen,
			last: screen,
			travelled: 0.0,
		};
	}

	/// Screen delta to pan by, if a press is in progress.
	pub fn pointer_move(&mut self, screen: Point) -> Option<(f64, f64)> {
		if !self.pan.active {
			return None;
		}
		let (dx, dy) = (screen.x - self.pan.last.x, screen.y - self.pan.last.y);
		self.pan.last = screen;
		self.pan.travelled += (dx * dx + dy * dy).sqrt();
		Some((dx, dy))
	}

	pub fn pointer_up(&mut self, screen: Point) -> PointerRelease {
		if !self.pan.active {
			return PointerRelease::Idle;
		}
		let travelled = self.pan.travelled;
		self.pan = PanState::default();
		if travelled <= CLICK_SLOP_PX {
			PointerRelease::Click(screen)
		} else {
			PointerRelease::PanEnd
		}
	}

	pub fn pointer_leave(&mut self) -> bool {
		self.pan = PanState::default();
		self.set_hover(None)
	}
}
