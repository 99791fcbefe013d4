//! The engine instance: owns the model, layout, metrics, view and user state,
//! and talks to the outside world only through events and commands.

use log::{debug, info, warn};

use super::centrality::{CentralityJob, CentralityScores};
use super::config::{DensityConfig, EngineConfig};
use super::density::{DensityCache, DensityEstimator};
use super::error::EngineError;
use super::events::{EngineCommand, EngineEvent, EventBus, SubscriptionId, ViewAction};
use super::groups::{Group, GroupStore};
use super::interaction::{InteractionController, PointerRelease};
use super::layout::{ForceSimulation, LayoutStatus, PrecomputedLayout, export_positions};
use super::model::{GraphModel, GraphView};
use super::scene::{RenderEngine, SceneInput, build_frame};
use super::settings::{FilterChange, Settings};
use super::types::{GraphData, Node, NodeKind, Point};
#[cfg(not(target_arch = "wasm32"))]
use super::worker::CentralityWorker;
use super::viewport::{ViewTransform, Viewport};

const WHEEL_ZOOM_IN: f64 = 1.1;
const WHEEL_ZOOM_OUT: f64 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineStatus {
	NotLoaded,
	/// Loaded, but no positions are available.
	Ungraphed,
	Simulating { progress: f64 },
	Ready,
}

/// Where positions for a newly loaded project come from.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutRequest {
	Precomputed(PrecomputedLayout),
	Simulate,
	/// No position file and no simulation: the project stays ungraphed.
	None,
}

enum CentralityTask {
	Idle,
	Cooperative(CentralityJob),
	#[cfg(not(target_arch = "wasm32"))]
	Background(CentralityWorker),
}

#[cfg(not(target_arch = "wasm32"))]
fn offload(job: CentralityJob, chunk: usize) -> CentralityTask {
	CentralityTask::Background(CentralityWorker::spawn(job, chunk))
}

#[cfg(target_arch = "wasm32")]
fn offload(job: CentralityJob, _chunk: usize) -> CentralityTask {
	CentralityTask::Cooperative(job)
}

/// File-name-safe form of a node id.
pub fn sanitize_file_name(name: &str) -> String {
	name.chars()
		.map(|c| match c {
			'<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
			c => c,
		})
		.collect::<String>()
		.trim()
		.to_string()
}

pub struct GraphEngine {
	config: EngineConfig,
	model: Option<GraphModel>,
	view: Option<GraphView>,
	settings: Settings,
	viewport: Viewport,
	groups: GroupStore,
	interaction: InteractionController,
	density: DensityEstimator,
	density_cache: DensityCache,
	density_group: Option<String>,
	bus: EventBus,
	layout: Option<ForceSimulation>,
	centrality: CentralityTask,
	status: EngineStatus,
	pending_focus: Option<String>,
	zoom_dirty: bool,
	dirty: bool,
}

impl GraphEngine {
	pub fn new(config: EngineConfig, width: f64, height: f64) -> Self {
		Self {
			viewport: Viewport::new(width, height, config.min_zoom, config.max_zoom),
			interaction: InteractionController::new(config.hit_tolerance_px),
			density: DensityEstimator::new(config.density.clone()),
			config,
			model: None,
			view: None,
			settings: Settings::default(),
			groups: GroupStore::new(),
			density_cache: DensityCache::default(),
			density_group: None,
			bus: EventBus::new(),
			layout: None,
			centrality: CentralityTask::Idle,
			status: EngineStatus::NotLoaded,
			pending_focus: None,
			zoom_dirty: false,
			dirty: true,
		}
	}

	pub fn subscribe(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
		self.bus.subscribe(listener)
	}

	pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
		self.bus.unsubscribe(id)
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn status(&self) -> EngineStatus {
		self.status
	}

	pub fn model(&self) -> Option<&GraphModel> {
		self.model.as_ref()
	}

	pub fn view(&self) -> Option<&GraphView> {
		self.view.as_ref()
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn viewport(&self) -> &Viewport {
		&self.viewport
	}

	pub fn groups(&self) -> &GroupStore {
		&self.groups
	}

	pub fn density_group(&self) -> Option<&str> {
		self.density_group.as_deref()
	}

	fn node_id(&self, idx: usize) -> Option<&str> {
		self.model.as_ref()?.node(idx).map(Node::id)
	}

	pub fn selected(&self) -> Option<&Node> {
		let idx = self.interaction.selection()?;
		self.model.as_ref()?.node(idx)
	}

	pub fn hovered(&self) -> Option<&Node> {
		let idx = self.interaction.hover()?;
		self.model.as_ref()?.node(idx)
	}

	// ---- project lifecycle ----

	/// Installs a new project, replacing the current one wholesale.
	pub fn load_project(
		&mut self,
		data: GraphData,
		layout: LayoutRequest,
		focus: Option<String>,
	) -> EngineStatus {
		self.unload();
		let mut model = GraphModel::build(data, &self.config.palette);

		self.status = match layout {
			LayoutRequest::Precomputed(positions) => {
				if positions.apply(&mut model) == 0 {
					warn!("position file matches no nodes; project is ungraphed");
					EngineStatus::Ungraphed
				} else {
					EngineStatus::Ready
				}
			}
			LayoutRequest::Simulate => {
				self.layout = Some(ForceSimulation::new(
					&model,
					self.config.simulation.clone(),
					&self.config.seed,
					Point::default(),
				));
				EngineStatus::Simulating { progress: 0.0 }
			}
			LayoutRequest::None => EngineStatus::Ungraphed,
		};

		let job = CentralityJob::new(&model);
		let (node_count, link_count) = (model.len(), model.links().len());
		self.view = Some(model.filter(|n| self.settings.kind_visible(n.kind)));
		self.model = Some(model);
		if node_count <= self.config.centrality_offload_threshold {
			if let Some(scores) = job.run() {
				self.merge_centrality(scores);
			}
		} else {
			self.centrality = offload(job, self.config.centrality_sources_per_frame);
		}

		self.pending_focus = focus;
		info!("project loaded: {node_count} nodes, {link_count} links, {:?}", self.status);
		self.bus.publish(&EngineEvent::DataLoaded {
			node_count,
			link_count,
		});
		if self.status == EngineStatus::Ready {
			self.apply_initial_focus();
		}
		self.dirty = true;
		self.status
	}

	/// JSON convenience over [`GraphEngine::load_project`]. A missing position
	/// file either simulates or leaves the project ungraphed.
	pub fn load_project_json(
		&mut self,
		graph: &str,
		positions: Option<&str>,
		simulate_if_missing: bool,
	) -> Result<EngineStatus, EngineError> {
		let data = GraphData::from_json(graph)?;
		let layout = match positions {
			Some(json) => LayoutRequest::Precomputed(PrecomputedLayout::from_json(json)?),
			None if simulate_if_missing => LayoutRequest::Simulate,
			None => LayoutRequest::None,
		};
		Ok(self.load_project(data, layout, None))
	}

	/// Drops the project, cancelling any layout or centrality work.
	pub fn unload(&mut self) {
		if let Some(mut sim) = self.layout.take() {
			sim.cancel();
		}
		self.cancel_centrality();
		self.model = None;
		self.view = None;
		self.interaction.reset();
		self.density_cache.clear();
		self.pending_focus = None;
		self.status = EngineStatus::NotLoaded;
		self.dirty = true;
	}

	fn cancel_centrality(&mut self) {
		match std::mem::replace(&mut self.centrality, CentralityTask::Idle) {
			CentralityTask::Idle => {}
			CentralityTask::Cooperative(mut job) => job.cancel(),
			#[cfg(not(target_arch = "wasm32"))]
			CentralityTask::Background(worker) => worker.cancel(),
		}
	}

	fn merge_centrality(&mut self, scores: CentralityScores) {
		let Some(model) = self.model.as_mut() else {
			return;
		};
		if model.merge_centrality(scores.generation, &scores.scores) {
			self.bus.publish(&EngineEvent::CentralityComputed {
				node_count: scores.scores.len(),
			});
		} else {
			warn!("discarding centrality computed for an older project");
		}
	}

	/// Whether centrality work is still pending.
	pub fn centrality_pending(&self) -> bool {
		!matches!(self.centrality, CentralityTask::Idle)
	}

	/// Blocks until pending centrality is merged.
	#[cfg(not(target_arch = "wasm32"))]
	pub fn finish_centrality(&mut self) {
		let scores = match std::mem::replace(&mut self.centrality, CentralityTask::Idle) {
			CentralityTask::Idle => None,
			CentralityTask::Cooperative(job) => job.run(),
			CentralityTask::Background(worker) => worker.wait(),
		};
		if let Some(scores) = scores {
			self.merge_centrality(scores);
		}
	}

	fn apply_initial_focus(&mut self) {
		let focus = self.pending_focus.take();
		let target = focus
			.as_deref()
			.and_then(|id| self.model.as_ref()?.index_of(id));
		match target {
			Some(idx) => {
				self.center_on_index(idx);
				self.select_index(Some(idx));
			}
			None => {
				if let Some(id) = focus {
					warn!("initial focus {id} is not in the graph");
				}
				self.fit_to_content();
			}
		}
	}

	// ---- frame loop ----

	/// Advances transitions, one layout step and a slice of centrality work.
	/// Returns whether the next frame needs drawing.
	pub fn tick(&mut self, dt_ms: f64) -> bool {
		if self.viewport.is_animating() {
			self.viewport.tick(dt_ms);
			self.dirty = true;
		}
		self.step_layout();
		self.poll_centrality();
		if self.zoom_dirty {
			self.zoom_dirty = false;
			self.bus.publish(&EngineEvent::ZoomChanged {
				transform: self.viewport.transform(),
			});
		}
		std::mem::take(&mut self.dirty)
	}

	fn step_layout(&mut self) {
		let Some(sim) = self.layout.as_mut() else {
			return;
		};
		let status = sim.step();
		let committed = sim.committed();
		let (progress, steps) = (sim.progress(), sim.steps());
		if let Some(model) = self.model.as_mut() {
			model.commit_positions(&committed);
		}
		self.dirty = true;
		match status {
			LayoutStatus::Running { .. } => {
				self.status = EngineStatus::Simulating { progress };
			}
			LayoutStatus::Finished => {
				self.layout = None;
				self.status = EngineStatus::Ready;
				self.density_cache.clear();
				info!("layout settled after {steps} steps");
				self.bus.publish(&EngineEvent::LayoutSettled { steps });
				self.apply_initial_focus();
			}
			LayoutStatus::Cancelled => {
				self.layout = None;
			}
		}
	}

	/// Runs the simulation to completion without frame timing.
	pub fn run_layout(&mut self) {
		while self.layout.is_some() {
			self.step_layout();
		}
	}

	fn poll_centrality(&mut self) {
		let chunk = self.config.centrality_sources_per_frame;
		match std::mem::replace(&mut self.centrality, CentralityTask::Idle) {
			CentralityTask::Idle => {}
			CentralityTask::Cooperative(mut job) => {
				if job.step(chunk) {
					if let Some(scores) = job.finish() {
						self.merge_centrality(scores);
					}
				} else {
					self.centrality = CentralityTask::Cooperative(job);
				}
			}
			#[cfg(not(target_arch = "wasm32"))]
			CentralityTask::Background(worker) => {
				if let Some(scores) = worker.try_result() {
					self.merge_centrality(scores);
				} else if worker.is_dead() {
					warn!("centrality worker exited without a result");
				} else {
					self.centrality = CentralityTask::Background(worker);
				}
			}
		}
	}

	/// Paints the current state with `backend`.
	pub fn render(&mut self, backend: &mut dyn RenderEngine) {
		self.refresh_density();
		let Some((model, view)) = self.model.as_ref().zip(self.view.as_ref()) else {
			return;
		};
		let density = self
			.density_group
			.as_deref()
			.and_then(|g| self.density_cache.get(g));
		let frame = build_frame(&SceneInput {
			model,
			view,
			settings: &self.settings,
			groups: &self.groups,
			palette: &self.config.palette,
			transform: self.viewport.displayed(),
			selection: self.interaction.selection(),
			hover: self.interaction.hover(),
			density,
			width: self.viewport.width,
			height: self.viewport.height,
		});
		backend.render(&frame);
	}

	fn refresh_density(&mut self) {
		if self.status != EngineStatus::Ready {
			return;
		}
		let (Some(group_id), Some(model)) = (self.density_group.as_deref(), self.model.as_ref())
		else {
			return;
		};
		let (estimator, groups) = (&self.density, &self.groups);
		self.density_cache.get_or_compute(group_id, || {
			let color = groups.group(group_id)?.color;
			let samples: Vec<(Point, f64)> = groups
				.members(group_id)
				.iter()
				.filter_map(|id| model.node_by_id(id))
				.filter_map(|node| {
					let weight = if node.link_count > 0.0 {
						node.link_count.sqrt()
					} else {
						1.0
					};
					Some((node.position?, weight))
				})
				.collect();
			estimator.estimate(&samples, &color)
		});
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.viewport.resize(width, height);
		self.dirty = true;
	}

	// ---- pointer input ----

	/// Topmost visible node under a screen point.
	pub fn hit_test(&self, x: f64, y: f64) -> Option<&Node> {
		let idx = self.hit_index(x, y)?;
		self.model.as_ref()?.node(idx)
	}

	fn hit_index(&self, x: f64, y: f64) -> Option<usize> {
		let (model, view) = self.model.as_ref().zip(self.view.as_ref())?;
		self.interaction.hit_test(
			model,
			view,
			&self.settings,
			&self.viewport.displayed(),
			Point::new(x, y),
		)
	}

	pub fn pointer_down(&mut self, x: f64, y: f64) {
		self.viewport.interrupt();
		self.interaction.pointer_down(Point::new(x, y));
	}

	pub fn pointer_move(&mut self, x: f64, y: f64) {
		if let Some((dx, dy)) = self.interaction.pointer_move(Point::new(x, y)) {
			self.viewport.pan_by(dx, dy);
			self.zoom_dirty = true;
			self.dirty = true;
			return;
		}
		let hit = self.hit_index(x, y);
		if self.interaction.set_hover(hit) {
			self.dirty = true;
			let node_id = hit.and_then(|idx| self.node_id(idx)).map(str::to_string);
			self.bus.publish(&EngineEvent::HoverChanged { node_id });
		}
	}

	pub fn pointer_up(&mut self, x: f64, y: f64) {
		if let PointerRelease::Click(p) = self.interaction.pointer_up(Point::new(x, y)) {
			match self.hit_index(p.x, p.y) {
				Some(idx) => self.select_index(Some(idx)),
				None if self.interaction.selection().is_some() => self.select_index(None),
				None => {}
			}
		}
	}

	pub fn pointer_leave(&mut self) {
		if self.interaction.pointer_leave() {
			self.dirty = true;
			self.bus.publish(&EngineEvent::HoverChanged { node_id: None });
		}
	}

	/// Zooms one wheel notch toward the cursor.
	pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) {
		if delta_y == 0.0 || !delta_y.is_finite() {
			return;
		}
		self.viewport.interrupt();
		let factor = if delta_y > 0.0 {
			WHEEL_ZOOM_OUT
		} else {
			WHEEL_ZOOM_IN
		};
		let k = self.viewport.transform().k * factor;
		self.viewport.zoom_to(k, Point::new(x, y));
		self.zoom_dirty = true;
		self.dirty = true;
	}

	/// Secondary-button press: asks the host for a context menu on the node under the cursor.
	pub fn context_menu(&mut self, x: f64, y: f64) -> bool {
		let Some(node_id) = self.hit_index(x, y).and_then(|idx| self.node_id(idx)) else {
			return false;
		};
		let event = EngineEvent::ContextMenuRequested {
			node_id: node_id.to_string(),
			x,
			y,
		};
		self.bus.publish(&event);
		true
	}

	/// Immediate transform change, coalesced into one zoom event per frame.
	pub fn set_transform(&mut self, transform: ViewTransform) {
		self.viewport.set(transform);
		self.zoom_dirty = true;
		self.dirty = true;
	}

	// ---- selection ----

	/// Selects by id; `None` or an unknown id clears. Always notifies.
	/// Selects a visible node, or clears with `None`. Ids that are unknown
	/// or filtered out leave the selection alone.
	pub fn select(&mut self, node_id: Option<&str>) {
		let Some(id) = node_id else {
			self.select_index(None);
			return;
		};
		let idx = self
			.model
			.as_ref()
			.and_then(|m| m.index_of(id))
			.filter(|&i| self.view.as_ref().is_some_and(|v| v.contains(i)));
		match idx {
			Some(idx) => self.select_index(Some(idx)),
			None => debug!("select ignored for unknown or hidden node {id}"),
		}
	}

	fn select_index(&mut self, idx: Option<usize>) {
		if self.interaction.select(idx) {
			self.dirty = true;
		}
		self.publish_selection();
	}

	fn publish_selection(&mut self) {
		let event = match self.selected() {
			Some(node) => EngineEvent::SelectionChanged {
				node_id: Some(node.id().to_string()),
				url: node.url.clone(),
				document: (node.kind == NodeKind::Motion)
					.then(|| format!("{}.pdf", sanitize_file_name(node.id()))),
			},
			None => EngineEvent::SelectionChanged {
				node_id: None,
				url: None,
				document: None,
			},
		};
		self.bus.publish(&event);
	}

	pub fn search(&self, query: &str) -> Vec<&Node> {
		let Some(model) = self.model.as_ref() else {
			return Vec::new();
		};
		model
			.search(query, self.config.search_limit)
			.into_iter()
			.filter_map(|idx| model.node(idx))
			.collect()
	}

	// ---- filters ----

	pub fn apply_filter(&mut self, change: FilterChange) {
		if !self.settings.apply(&change) {
			return;
		}
		self.dirty = true;
		if change.changes_visibility() {
			self.refresh_view();
		}
		self.bus.publish(&EngineEvent::FilterChanged { change });
	}

	fn refresh_view(&mut self) {
		let Some(model) = self.model.as_ref() else {
			return;
		};
		let view = model.filter(|n| self.settings.kind_visible(n.kind));
		let cleared = self.interaction.retain_visible(&view);
		self.view = Some(view);
		if cleared {
			self.publish_selection();
		}
	}

	// ---- view actions ----

	pub fn view_action(&mut self, action: ViewAction) {
		match action {
			ViewAction::Reset => {
				if self.interaction.selection().is_some() {
					self.select_index(None);
				}
				let hidden: Vec<NodeKind> = self.settings.hidden_kinds.iter().copied().collect();
				for kind in hidden {
					self.apply_filter(FilterChange::ShowKind(kind, true));
				}
				self.fit_to_content();
			}
			ViewAction::Center { node_id } => {
				if let Some(idx) = self.model.as_ref().and_then(|m| m.index_of(&node_id)) {
					self.center_on_index(idx);
				}
			}
			ViewAction::Highlight { node_id } => {
				let Some(model) = self.model.as_ref() else {
					return;
				};
				let Some(idx) = model.index_of(&node_id) else {
					return;
				};
				let kind = model.nodes()[idx].kind;
				if !self.settings.kind_visible(kind) {
					self.apply_filter(FilterChange::ShowKind(kind, true));
				}
				self.center_on_index(idx);
				self.select_index(Some(idx));
			}
		}
	}

	fn center_on_index(&mut self, idx: usize) {
		let Some(pos) = self.model.as_ref().and_then(|m| m.position(idx)) else {
			return;
		};
		let target = self.viewport.centered_on(pos);
		self.viewport.animate_to(target, self.config.view_animation_ms);
		self.zoom_dirty = true;
		self.dirty = true;
	}

	/// Fits every visible positioned node into the viewport.
	pub fn fit_to_content(&mut self) {
		let Some((model, view)) = self.model.as_ref().zip(self.view.as_ref()) else {
			return;
		};
		let Some(bbox) = model.bounds_of(view.node_indices().iter().copied()) else {
			return;
		};
		let target = self.viewport.fitted_to(&bbox, self.config.fit_margin);
		self.viewport.animate_to(target, self.config.view_animation_ms);
		self.zoom_dirty = true;
		self.dirty = true;
	}

	// ---- groups ----

	fn groups_changed(&mut self) {
		self.density_cache.clear();
		self.dirty = true;
		self.bus.publish(&EngineEvent::GroupUpdated {
			groups: self.groups.groups(),
		});
	}

	pub fn create_group(&mut self, name: &str, color: &str) -> String {
		let id = self.groups.create(name, color);
		self.groups_changed();
		id
	}

	pub fn delete_group(&mut self, group_id: &str) -> bool {
		if !self.groups.delete(group_id) {
			return false;
		}
		if self.density_group.as_deref() == Some(group_id) {
			self.density_group = None;
		}
		self.groups_changed();
		true
	}

	pub fn rename_group(&mut self, group_id: &str, name: &str) -> bool {
		if !self.groups.rename(group_id, name) {
			return false;
		}
		self.groups_changed();
		true
	}

	/// `None` removes membership. Unknown nodes or groups are a no-op.
	pub fn assign_to_group(&mut self, node_id: &str, group_id: Option<&str>) -> bool {
		if !self.model.as_ref().is_some_and(|m| m.contains(node_id)) {
			return false;
		}
		let changed = self.groups.assign(node_id, group_id);
		if changed {
			self.groups_changed();
		}
		changed
	}

	pub fn toggle_membership(&mut self, node_id: &str, group_id: &str) -> bool {
		if !self.model.as_ref().is_some_and(|m| m.contains(node_id)) {
			return false;
		}
		let changed = self.groups.toggle(node_id, group_id);
		if changed {
			self.groups_changed();
		}
		changed
	}

	pub fn update_groups(&mut self, groups: Vec<Group>) {
		self.groups.update_groups(groups);
		if let Some(g) = self.density_group.as_deref() {
			if !self.groups.contains(g) {
				self.density_group = None;
			}
		}
		self.groups_changed();
	}

	pub fn import_groups(&mut self, json: &str) -> Result<(), EngineError> {
		self.groups = GroupStore::from_json(json)?;
		self.groups_changed();
		Ok(())
	}

	pub fn export_groups(&self) -> Result<String, EngineError> {
		self.groups.to_json()
	}

	/// Shows the density overlay for a group (or hides it) with the given presentation knobs.
	pub fn set_density(&mut self, group_id: Option<String>, opacity: f64, dimming: f64, blur: f64) {
		self.density_group = group_id.filter(|g| self.groups.contains(g));
		self.settings.density_opacity = opacity.clamp(0.0, 1.0);
		self.settings.graph_dimming = dimming.clamp(0.0, 1.0);
		self.settings.contour_blur = blur.max(0.0);
		self.dirty = true;
	}

	pub fn set_density_config(&mut self, config: DensityConfig) {
		info!(
			"density kernel: bandwidth {}, {} thresholds",
			config.bandwidth, config.thresholds
		);
		self.density = DensityEstimator::new(config);
		self.density_cache.clear();
		self.dirty = true;
	}

	// ---- commands and export ----

	pub fn dispatch(&mut self, command: EngineCommand) {
		match command {
			EngineCommand::SetFilter(change) => self.apply_filter(change),
			EngineCommand::View(action) => self.view_action(action),
			EngineCommand::UpdateGroups(groups) => self.update_groups(groups),
			EngineCommand::RenameGroup { group_id, name } => {
				self.rename_group(&group_id, &name);
			}
			EngineCommand::ConfigureDensity(config) => self.set_density_config(config),
			EngineCommand::UpdateDensity {
				group_id,
				opacity,
				dimming,
				blur,
			} => self.set_density(group_id, opacity, dimming, blur),
		}
	}

	/// Current positions as a position file.
	pub fn export_positions(&self) -> Result<String, EngineError> {
		let model = self.model.as_ref().ok_or(EngineError::NotLoaded)?;
		Ok(serde_json::to_string(&export_positions(model))?)
	}
}
