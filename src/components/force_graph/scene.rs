//! Per-frame draw lists. Every alpha and visibility decision is recomputed
//! from the current selection, hover and settings when a frame is built;
//! backends only paint what the frame says.

use super::config::Palette;
use super::density::DensityContours;
use super::groups::GroupStore;
use super::model::{Adjacency, GraphModel, GraphView};
use super::settings::Settings;
use super::types::Point;
use super::viewport::ViewTransform;

pub const DIMMED_LINK_ALPHA: f64 = 0.15;
pub const DIMMED_NODE_ALPHA: f64 = 0.2;
pub const LABEL_FONT_PX: f64 = 16.0;
pub const SUBLABEL_FONT_PX: f64 = 12.0;
const LABEL_GAP: f64 = 5.0;

#[derive(Clone, Debug, PartialEq)]
pub struct FrameLink {
	pub from: Point,
	pub to: Point,
	pub width: f64,
	pub alpha: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameNode {
	pub index: usize,
	pub center: Point,
	pub radius: f64,
	pub color: String,
	pub alpha: f64,
	pub selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameLabel {
	pub text: String,
	pub sublabel: Option<String>,
	/// Left-middle anchor of the label text, in world units.
	pub anchor: Point,
	pub font_px: f64,
	pub alpha: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DensityLayer<'a> {
	pub contours: &'a DensityContours,
	pub fill_alpha: f64,
	pub stroke_alpha: f64,
	pub blur_px: f64,
}

/// Everything a backend needs to paint one frame, in draw order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<'a> {
	pub width: f64,
	pub height: f64,
	pub transform: ViewTransform,
	pub palette: &'a Palette,
	pub links: Vec<FrameLink>,
	pub nodes: Vec<FrameNode>,
	pub labels: Vec<FrameLabel>,
	pub density: Option<DensityLayer<'a>>,
}

/// A drawing backend. Implementations are interchangeable behind this contract.
pub trait RenderEngine {
	fn render(&mut self, frame: &Frame<'_>);
}

/// Selection context shared by the dimming rules.
#[derive(Clone, Copy)]
pub struct Focus<'a> {
	pub selection: Option<usize>,
	pub hover: Option<usize>,
	pub adjacency: &'a Adjacency,
}

impl Focus<'_> {
	fn in_neighborhood(&self, idx: usize) -> bool {
		match self.selection {
			None => true,
			Some(sel) => sel == idx || self.adjacency.are_neighbors(sel, idx),
		}
	}

	pub fn node_alpha(&self, idx: usize) -> f64 {
		if self.in_neighborhood(idx) {
			1.0
		} else {
			DIMMED_NODE_ALPHA
		}
	}

	/// A link stays bright while it touches the selection or one of its neighbors.
	pub fn link_alpha(&self, source: usize, target: usize) -> f64 {
		if self.selection.is_none()
			|| self.in_neighborhood(source)
			|| self.in_neighborhood(target)
		{
			1.0
		} else {
			DIMMED_LINK_ALPHA
		}
	}

	pub fn label_visible(&self, idx: usize, settings: &Settings) -> bool {
		settings.show_labels
			|| self.hover == Some(idx)
			|| (self.selection.is_some() && self.in_neighborhood(idx))
	}
}

pub struct SceneInput<'a> {
	pub model: &'a GraphModel,
	pub view: &'a GraphView,
	pub settings: &'a Settings,
	pub groups: &'a GroupStore,
	pub palette: &'a Palette,
	pub transform: ViewTransform,
	pub selection: Option<usize>,
	pub hover: Option<usize>,
	pub density: Option<&'a DensityContours>,
	pub width: f64,
	pub height: f64,
}

pub fn build_frame<'a>(input: &SceneInput<'a>) -> Frame<'a> {
	let SceneInput {
		model,
		view,
		settings,
		..
	} = *input;
	let k = input.transform.k;
	let fade = settings.dimming_factor();
	let focus = Focus {
		selection: input.selection,
		hover: input.hover,
		adjacency: model.adjacency(),
	};
	let screen_scale = if settings.linear_zoom || k <= 0.0 { 1.0 } else { 1.0 / k };

	let links = if settings.show_links {
		view.link_indices()
			.iter()
			.filter_map(|&li| {
				let link = model.links().get(li)?;
				if link.is_self_loop() {
					return None;
				}
				Some(FrameLink {
					from: model.position(link.source)?,
					to: model.position(link.target)?,
					width: link.weight * screen_scale,
					alpha: focus.link_alpha(link.source, link.target) * fade,
				})
			})
			.collect()
	} else {
		Vec::new()
	};

	let mut nodes = Vec::with_capacity(view.node_indices().len());
	let mut labels = Vec::new();
	for &idx in view.node_indices() {
		let Some(node) = model.node(idx) else {
			continue;
		};
		let Some(center) = node.position else {
			continue;
		};
		let radius = settings.node_radius(node.base_radius(), k);
		let color = input
			.groups
			.color_of(node.id())
			.unwrap_or(&node.color)
			.to_string();
		nodes.push(FrameNode {
			index: idx,
			center,
			radius,
			color,
			alpha: focus.node_alpha(idx) * fade,
			selected: input.selection == Some(idx),
		});
		if focus.label_visible(idx, settings) {
			labels.push(FrameLabel {
				text: node.label.clone(),
				sublabel: node.sublabel.clone(),
				anchor: Point::new(center.x + radius + LABEL_GAP * screen_scale, center.y),
				font_px: LABEL_FONT_PX * screen_scale,
				alpha: fade,
			});
		}
	}

	let density = input.density.map(|contours| DensityLayer {
		contours,
		fill_alpha: settings.density_opacity * 0.15,
		stroke_alpha: settings.density_opacity * 0.6,
		blur_px: settings.contour_blur,
	});

	Frame {
		width: input.width,
		height: input.height,
		transform: input.transform,
		palette: input.palette,
		links,
		nodes,
		labels,
		density,
	}
}

/// Owned summary of a rendered frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedFrame {
	pub transform: ViewTransform,
	pub links: Vec<FrameLink>,
	pub nodes: Vec<FrameNode>,
	pub labels: Vec<FrameLabel>,
	pub density_bands: usize,
}

impl RecordedFrame {
	pub fn node(&self, idx: usize) -> Option<&FrameNode> {
		self.nodes.iter().find(|n| n.index == idx)
	}

	pub fn label_texts(&self) -> Vec<&str> {
		self.labels.iter().map(|l| l.text.as_str()).collect()
	}
}

/// Backend that paints nothing and keeps the frames, for headless hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct SceneRecorder {
	frames: Vec<RecordedFrame>,
	keep: usize,
}

impl SceneRecorder {
	/// Keeps at most the last `keep` frames.
	pub fn new(keep: usize) -> Self {
		Self {
			frames: Vec::new(),
			keep: keep.max(1),
		}
	}

	pub fn last(&self) -> Option<&RecordedFrame> {
		self.frames.last()
	}

	pub fn frames(&self) -> &[RecordedFrame] {
		&self.frames
	}
}

impl RenderEngine for SceneRecorder {
	fn render(&mut self, frame: &Frame<'_>) {
		if self.frames.len() >= self.keep.max(1) {
			self.frames.remove(0);
		}
		self.frames.push(RecordedFrame {
			transform: frame.transform,
			links: frame.links.clone(),
			nodes: frame.nodes.clone(),
			labels: frame.labels.clone(),
			density_bands: frame.density.as_ref().map_or(0, |d| d.contours.bands.len()),
		});
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::components::force_graph::types::{GraphData, GraphLink, GraphNode, NodeKind};

	// a - b - c - d, plus e on its own
	fn model() -> GraphModel {
		let mut model = GraphModel::build(
			GraphData {
				nodes: ["a", "b", "c", "d", "e"]
					.iter()
					.map(|id| GraphNode::new(*id, id.to_uppercase(), NodeKind::Supporter))
					.collect(),
				links: vec![
					GraphLink::new("a", "b", 1.0),
					GraphLink::new("b", "c", 2.0),
					GraphLink::new("c", "d", 1.0),
				],
			},
			&Palette::default(),
		);
		let positions: Vec<_> = (0..5)
			.map(|i| (i, Point::new(i as f64 * 10.0, 0.0), Point::default()))
			.collect();
		model.commit_positions(&positions);
		model
	}

	fn frame_for(
		model: &GraphModel,
		settings: &Settings,
		groups: &GroupStore,
		selection: Option<usize>,
		hover: Option<usize>,
	) -> RecordedFrame {
		let palette = Palette::default();
		let view = GraphView::all(model);
		let frame = build_frame(&SceneInput {
			model,
			view: &view,
			settings,
			groups,
			palette: &palette,
			transform: ViewTransform::IDENTITY,
			selection,
			hover,
			density: None,
			width: 100.0,
			height: 100.0,
		});
		let mut recorder = SceneRecorder::new(1);
		recorder.render(&frame);
		recorder.last().cloned().unwrap_or_default()
	}

	#[test]
	fn nothing_dims_without_selection() {
		let model = model();
		let frame = frame_for(&model, &Settings::default(), &GroupStore::new(), None, None);
		assert!(frame.nodes.iter().all(|n| n.alpha == 1.0));
		assert!(frame.links.iter().all(|l| l.alpha == 1.0));
		assert!(frame.labels.is_empty());
	}

	#[test]
	fn selection_dims_outside_its_neighborhood() {
		let model = model();
		let frame = frame_for(&model, &Settings::default(), &GroupStore::new(), Some(1), None);
		let alphas: Vec<f64> = frame.nodes.iter().map(|n| n.alpha).collect();
		assert_eq!(alphas, vec![1.0, 1.0, 1.0, DIMMED_NODE_ALPHA, DIMMED_NODE_ALPHA]);
		// a-b and b-c touch the selection, c-d touches the neighbor c.
		assert!(frame.links.iter().all(|l| l.alpha == 1.0));
		assert_eq!(frame.label_texts(), vec!["A", "B", "C"]);
		assert!(frame.node(1).unwrap().selected);

		let frame = frame_for(&model, &Settings::default(), &GroupStore::new(), Some(0), None);
		let link_alphas: Vec<f64> = frame.links.iter().map(|l| l.alpha).collect();
		assert_eq!(link_alphas, vec![1.0, 1.0, DIMMED_LINK_ALPHA]);
	}

	#[test]
	fn hover_shows_one_label_and_graph_dimming_fades_everything() {
		let model = model();
		let settings = Settings {
			graph_dimming: 0.5,
			..Settings::default()
		};
		let frame = frame_for(&model, &settings, &GroupStore::new(), None, Some(4));
		assert_eq!(frame.label_texts(), vec!["E"]);
		assert!(frame.nodes.iter().all(|n| n.alpha == 0.5));
		assert!(frame.labels.iter().all(|l| l.alpha == 0.5));
	}

	#[test]
	fn group_color_overrides_and_hidden_links_are_skipped() {
		let model = model();
		let mut groups = GroupStore::new();
		let g = groups.create("Team", "#123456");
		groups.assign("c", Some(&g));
		let settings = Settings {
			show_links: false,
			..Settings::default()
		};
		let frame = frame_for(&model, &settings, &groups, None, None);
		assert_eq!(frame.node(2).unwrap().color, "#123456");
		assert_eq!(frame.node(0).unwrap().color, Palette::default().supporter);
		assert!(frame.links.is_empty());
	}

	#[test]
	fn unpositioned_nodes_and_their_links_are_skipped() {
		let palette = Palette::default();
		let model = GraphModel::build(
			GraphData {
				nodes: vec![
					GraphNode::new("a", "A", NodeKind::Motion),
					GraphNode::new("b", "B", NodeKind::Motion),
				],
				links: vec![GraphLink::new("a", "b", 3.0)],
			},
			&palette,
		);
		let frame = frame_for(&model, &Settings::default(), &GroupStore::new(), None, None);
		assert!(frame.nodes.is_empty() && frame.links.is_empty());
	}

	#[test]
	fn link_width_is_weight() {
		let model = model();
		let frame = frame_for(&model, &Settings::default(), &GroupStore::new(), None, None);
		assert_eq!(frame.links[1].width, 2.0);
	}
}
