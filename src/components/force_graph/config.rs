use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::layout::{SeedStrategy, SimulationParameters};
use super::types::NodeKind;

/// Static engine configuration. Every field has a default, so a partial JSON
/// document only overrides what it names.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub min_zoom: f64,
	pub max_zoom: f64,
	/// Hit-test slack around a node, in screen pixels.
	pub hit_tolerance_px: f64,
	pub view_animation_ms: f64,
	/// Share of the viewport that fitted content may occupy.
	pub fit_margin: f64,
	/// Graphs with more nodes than this compute centrality off the event path.
	pub centrality_offload_threshold: usize,
	/// BFS sources processed per frame by a cooperative centrality job.
	pub centrality_sources_per_frame: usize,
	/// Result cap for label search.
	pub search_limit: usize,
	pub simulation: SimulationParameters,
	pub seed: SeedStrategy,
	pub density: DensityConfig,
	pub palette: Palette,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			min_zoom: 0.01,
			max_zoom: 10.0,
			hit_tolerance_px: 8.0,
			view_animation_ms: 750.0,
			fit_margin: 0.9,
			centrality_offload_threshold: 1500,
			centrality_sources_per_frame: 64,
			search_limit: 600,
			simulation: SimulationParameters::default(),
			seed: SeedStrategy::default(),
			density: DensityConfig::default(),
			palette: Palette::default(),
		}
	}
}

impl EngineConfig {
	pub fn from_json(json: &str) -> Result<Self, EngineError> {
		let mut config: Self = serde_json::from_str(json)?;
		if config.min_zoom > config.max_zoom {
			std::mem::swap(&mut config.min_zoom, &mut config.max_zoom);
		}
		Ok(config)
	}
}

/// Kernel density estimation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
	/// Gaussian kernel standard deviation, in world units.
	pub bandwidth: f64,
	/// Number of iso-levels between zero and the peak density.
	pub thresholds: usize,
	/// World-space padding added around the group's extent.
	pub padding: f64,
	/// Grid resolution, in world units per cell.
	pub cell_size: f64,
}

impl Default for DensityConfig {
	fn default() -> Self {
		Self {
			bandwidth: 30.0,
			thresholds: 20,
			padding: 50.0,
			cell_size: 4.0,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Palette {
	pub motion: String,
	pub supporter: String,
	pub amendment: String,
	pub person: String,
	pub link: String,
	pub label: String,
	pub sublabel: String,
	pub background: String,
	pub selection: String,
}

impl Default for Palette {
	fn default() -> Self {
		Self {
			motion: "#d86b74".into(),
			supporter: "#7dff00".into(),
			amendment: "#e0a458".into(),
			person: "#5fa8d3".into(),
			link: "rgba(153, 153, 153, 0.3)".into(),
			label: "#faf9f5".into(),
			sublabel: "#9c9a92".into(),
			background: "#1a1a2e".into(),
			selection: "#7f6df2".into(),
		}
	}
}

impl Palette {
	pub fn kind_color(&self, kind: NodeKind) -> &str {
		match kind {
			NodeKind::Motion => &self.motion,
			NodeKind::Supporter => &self.supporter,
			NodeKind::Amendment => &self.amendment,
			NodeKind::Person => &self.person,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let config =
			EngineConfig::from_json(r#"{"max_zoom": 4, "density": {"bandwidth": 12}}"#).unwrap();
		assert_eq!(config.max_zoom, 4.0);
		assert_eq!(config.min_zoom, 0.01);
		assert_eq!(config.density.bandwidth, 12.0);
		assert_eq!(config.density.thresholds, 20);
		assert_eq!(config.palette.motion, "#d86b74");
	}

	#[test]
	fn inverted_zoom_range_is_swapped() {
		let config = EngineConfig::from_json(r#"{"min_zoom": 8, "max_zoom": 2}"#).unwrap();
		assert_eq!((config.min_zoom, config.max_zoom), (2.0, 8.0));
	}

	#[test]
	fn malformed_json_is_an_error() {
		assert!(EngineConfig::from_json("{nope").is_err());
	}
}
