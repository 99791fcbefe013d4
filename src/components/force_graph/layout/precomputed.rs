use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{LayoutProvider, Positions};
use crate::components::force_graph::error::EngineError;
use crate::components::force_graph::model::GraphModel;
use crate::components::force_graph::types::Point;

/// One entry of a position file. Unknown fields (labels, colors, whatever the
/// exporting tool wrote alongside) are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
	pub id: String,
	pub x: f64,
	pub y: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub vx: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub vy: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub link_count: Option<f64>,
}

/// Positions loaded from a file instead of simulated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrecomputedLayout {
	records: HashMap<String, PositionRecord>,
}

impl PrecomputedLayout {
	pub fn from_records(records: impl IntoIterator<Item = PositionRecord>) -> Self {
		Self {
			records: records
				.into_iter()
				.filter(|r| r.x.is_finite() && r.y.is_finite())
				.map(|r| (r.id.clone(), r))
				.collect(),
		}
	}

	pub fn from_json(json: &str) -> Result<Self, EngineError> {
		let records: Vec<PositionRecord> = serde_json::from_str(json)?;
		Ok(Self::from_records(records))
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Writes matched positions (and size / link count overrides) into the
	/// model. Nodes without a record keep whatever they had. Returns the
	/// number of nodes matched.
	pub fn apply(&self, model: &mut GraphModel) -> usize {
		let mut matched = 0;
		for idx in 0..model.len() {
			let Some(node) = model.node_mut(idx) else {
				continue;
			};
			let Some(record) = self.records.get(node.id()) else {
				continue;
			};
			node.position = Some(Point::new(record.x, record.y));
			node.velocity = match (record.vx, record.vy) {
				(Some(vx), Some(vy)) => Some(Point::new(vx, vy)),
				_ => None,
			};
			if let Some(size) = record.size.filter(|s| s.is_finite() && *s > 0.0) {
				node.size = Some(size);
			}
			if let Some(link_count) = record.link_count.filter(|c| c.is_finite() && *c > 0.0) {
				node.link_count = link_count;
			}
			matched += 1;
		}
		let unmatched = self.records.len() - matched.min(self.records.len());
		if unmatched > 0 {
			debug!("{unmatched} position records name unknown nodes");
		}
		info!("applied precomputed positions to {matched}/{} nodes", model.len());
		matched
	}
}

impl LayoutProvider for PrecomputedLayout {
	fn positions(&self) -> Positions {
		self.records
			.iter()
			.map(|(id, r)| (id.clone(), Point::new(r.x, r.y)))
			.collect()
	}

	fn is_settled(&self) -> bool {
		true
	}
}
