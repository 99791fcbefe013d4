//! Messages in and out of the engine. Consumers subscribe to events and send
//! commands; nothing in the engine waits on a reply.

use serde::{Deserialize, Serialize};

use super::config::DensityConfig;
use super::groups::Group;
use super::settings::FilterChange;
use super::viewport::ViewTransform;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
	/// Emitted on every selection, including re-selecting the same node.
	SelectionChanged {
		node_id: Option<String>,
		url: Option<String>,
		/// Sanitized document file name, for motions.
		document: Option<String>,
	},
	HoverChanged {
		node_id: Option<String>,
	},
	FilterChanged {
		change: FilterChange,
	},
	GroupUpdated {
		groups: Vec<Group>,
	},
	ZoomChanged {
		transform: ViewTransform,
	},
	DataLoaded {
		node_count: usize,
		link_count: usize,
	},
	LayoutSettled {
		steps: usize,
	},
	CentralityComputed {
		node_count: usize,
	},
	ContextMenuRequested {
		node_id: String,
		x: f64,
		y: f64,
	},
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ViewAction {
	/// Clear selection, show every kind, fit the graph.
	Reset,
	Center { node_id: String },
	/// Make the node visible if its kind is hidden, center on it and select it.
	Highlight { node_id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EngineCommand {
	SetFilter(FilterChange),
	View(ViewAction),
	UpdateGroups(Vec<Group>),
	RenameGroup {
		group_id: String,
		name: String,
	},
	/// Replaces the kernel settings; cached contours are recomputed on the next frame.
	ConfigureDensity(DensityConfig),
	UpdateDensity {
		group_id: Option<String>,
		opacity: f64,
		dimming: f64,
		blur: f64,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EngineEvent)>;

/// Synchronous fan-out to registered listeners, in subscription order.
#[derive(Default)]
pub struct EventBus {
	listeners: Vec<(SubscriptionId, Listener)>,
	next_id: u64,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
		self.next_id += 1;
		let id = SubscriptionId(self.next_id);
		self.listeners.push((id, Box::new(listener)));
		id
	}

	pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
		let before = self.listeners.len();
		self.listeners.retain(|(sid, _)| *sid != id);
		self.listeners.len() != before
	}

	pub fn publish(&mut self, event: &EngineEvent) {
		for (_, listener) in &mut self.listeners {
			listener(event);
		}
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}

impl std::fmt::Debug for EventBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventBus")
			.field("listeners", &self.listeners.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	#[test]
	fn listeners_receive_until_unsubscribed() {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let mut bus = EventBus::new();
		let sink = Rc::clone(&seen);
		let id = bus.subscribe(move |e| sink.borrow_mut().push(e.clone()));

		let event = EngineEvent::HoverChanged {
			node_id: Some("a".into()),
		};
		bus.publish(&event);
		assert!(bus.unsubscribe(id));
		assert!(!bus.unsubscribe(id));
		bus.publish(&event);
		assert_eq!(*seen.borrow(), vec![event]);
		assert!(bus.is_empty());
	}

	#[test]
	fn command_wire_shapes() {
		let cmd: EngineCommand =
			serde_json::from_str(r#"{"type": "view", "value": {"action": "highlight", "node_id": "m1"}}"#)
				.unwrap();
		assert_eq!(
			cmd,
			EngineCommand::View(ViewAction::Highlight {
				node_id: "m1".into()
			})
		);
		let cmd: EngineCommand = serde_json::from_str(
			r#"{"type": "set_filter", "value": {"type": "show_kind", "value": ["supporter", false]}}"#,
		)
		.unwrap();
		assert_eq!(
			cmd,
			EngineCommand::SetFilter(FilterChange::ShowKind(
				crate::components::force_graph::types::NodeKind::Supporter,
				false
			))
		);
	}

	#[test]
	fn density_config_command_fills_missing_fields() {
		let json = r#"{"type": "configure_density", "value": {"thresholds": 5}}"#;
		let cmd: EngineCommand = serde_json::from_str(json).unwrap();
		let EngineCommand::ConfigureDensity(config) = cmd else {
			panic!("wrong command: {cmd:?}");
		};
		assert_eq!(config.thresholds, 5);
		assert_eq!(config.bandwidth, DensityConfig::default().bandwidth);
	}

	#[test]
	fn events_serialize_tagged() {
		let json = serde_json::to_value(EngineEvent::DataLoaded {
			node_count: 3,
			link_count: 2,
		})
		.unwrap();
		assert_eq!(json["type"], "data_loaded");
		assert_eq!(json["node_count"], 3);
	}
}
