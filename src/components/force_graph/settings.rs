use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::NodeKind;

/// End-user display settings. Read as an immutable snapshot for each frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub show_labels: bool,
	pub show_links: bool,
	pub hidden_kinds: BTreeSet<NodeKind>,
	pub node_size_multiplier: f64,
	/// Node sizes live in world units and grow with zoom. When off, radii are
	/// held constant in screen pixels.
	pub linear_zoom: bool,
	/// Global fade applied to nodes, links and labels while a density overlay is shown.
	pub graph_dimming: f64,
	pub density_opacity: f64,
	pub contour_blur: f64,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			show_labels: false,
			show_links: true,
			hidden_kinds: BTreeSet::new(),
			node_size_multiplier: 1.0,
			linear_zoom: true,
			graph_dimming: 0.0,
			density_opacity: 0.5,
			contour_blur: 0.0,
		}
	}
}

impl Settings {
	pub fn kind_visible(&self, kind: NodeKind) -> bool {
		!self.hidden_kinds.contains(&kind)
	}

	/// Returns whether visibility actually changed.
	pub fn set_kind_visible(&mut self, kind: NodeKind, visible: bool) -> bool {
		if visible {
			self.hidden_kinds.remove(&kind)
		} else {
			self.hidden_kinds.insert(kind)
		}
	}

	/// `1 - graph_dimming`, clamped to a valid alpha.
	pub fn dimming_factor(&self) -> f64 {
		(1.0 - self.graph_dimming).clamp(0.0, 1.0)
	}

	/// World-space radius of a node with the given base radius at zoom `k`.
	pub fn node_radius(&self, base_radius: f64, k: f64) -> f64 {
		let r = base_radius * self.node_size_multiplier;
		if self.linear_zoom || k <= 0.0 { r } else { r / k }
	}
}

/// A single settings change, as issued by the filter controls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterChange {
	ShowKind(NodeKind, bool),
	ShowLabels(bool),
	ShowLinks(bool),
	NodeSize(f64),
	LinearZoom(bool),
}

impl FilterChange {
	/// Whether this change alters which nodes are visible, as opposed to how they look.
	pub fn changes_visibility(&self) -> bool {
		matches!(self, FilterChange::ShowKind(..))
	}
}

impl Settings {
	/// Applies a change; returns whether anything differed.
	pub fn apply(&mut self, change: &FilterChange) -> bool {
		fn set<T: PartialEq + Copy>(slot: &mut T, value: T) -> bool {
			let changed = *slot != value;
			*slot = value;
			changed
		}
		match *change {
			FilterChange::ShowKind(kind, visible) => self.set_kind_visible(kind, visible),
			FilterChange::ShowLabels(v) => set(&mut self.show_labels, v),
			FilterChange::ShowLinks(v) => set(&mut self.show_links, v),
			FilterChange::NodeSize(v) => set(&mut self.node_size_multiplier, v.max(0.0)),
			FilterChange::LinearZoom(v) => set(&mut self.linear_zoom, v),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_toggle_reports_changes() {
		let mut settings = Settings::default();
		assert!(settings.kind_visible(NodeKind::Motion));
		assert!(settings.apply(&FilterChange::ShowKind(NodeKind::Motion, false)));
		assert!(!settings.kind_visible(NodeKind::Motion));
		assert!(!settings.apply(&FilterChange::ShowKind(NodeKind::Motion, false)));
		assert!(settings.apply(&FilterChange::ShowKind(NodeKind::Motion, true)));
	}

	#[test]
	fn screen_constant_radius_shrinks_in_world_space() {
		let mut settings = Settings::default();
		assert_eq!(settings.node_radius(4.0, 2.0), 4.0);
		settings.linear_zoom = false;
		assert_eq!(settings.node_radius(4.0, 2.0), 2.0);
	}

	#[test]
	fn filter_change_wire_shape() {
		let change: FilterChange =
			serde_json::from_str(r#"{"type": "show_labels", "value": true}"#).unwrap();
		assert_eq!(change, FilterChange::ShowLabels(true));
	}
}
