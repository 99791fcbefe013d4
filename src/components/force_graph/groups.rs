//! Ad-hoc node groups. A node belongs to at most one group; the last
//! assignment wins and the group color overrides the node's own.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::EngineError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
	#[serde(deserialize_with = "string_or_number")]
	pub id: String,
	#[serde(default)]
	pub name: String,
	pub color: String,
	#[serde(default)]
	pub nodes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
	pub node_id: String,
	#[serde(deserialize_with = "string_or_number")]
	pub group_id: String,
}

/// The `{groups, nodeGroups}` document used for import and export.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFile {
	#[serde(default)]
	pub groups: Vec<Group>,
	#[serde(default)]
	pub node_groups: Vec<NodeGroup>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
	Text(String),
	Int(i64),
	Float(f64),
}

/// Older exports used numeric timestamps as group ids.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	Ok(match RawId::deserialize(deserializer)? {
		RawId::Text(s) => s,
		RawId::Int(i) => i.to_string(),
		RawId::Float(f) => f.to_string(),
	})
}

#[derive(Clone, Debug, PartialEq)]
struct GroupMeta {
	id: String,
	name: String,
	color: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupStore {
	groups: Vec<GroupMeta>,
	node_groups: BTreeMap<String, String>,
	next_id: u64,
}

impl GroupStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.groups.len()
	}

	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}

	pub fn contains(&self, group_id: &str) -> bool {
		self.groups.iter().any(|g| g.id == group_id)
	}

	pub fn create(&mut self, name: impl Into<String>, color: impl Into<String>) -> String {
		let id = loop {
			self.next_id += 1;
			let candidate = format!("g{}", self.next_id);
			if !self.contains(&candidate) {
				break candidate;
			}
		};
		self.groups.push(GroupMeta {
			id: id.clone(),
			name: name.into(),
			color: color.into(),
		});
		id
	}

	/// Removes the group and every membership in it.
	pub fn delete(&mut self, group_id: &str) -> bool {
		let before = self.groups.len();
		self.groups.retain(|g| g.id != group_id);
		if self.groups.len() == before {
			return false;
		}
		self.node_groups.retain(|_, g| g != group_id);
		true
	}

	pub fn rename(&mut self, group_id: &str, name: impl Into<String>) -> bool {
		match self.groups.iter_mut().find(|g| g.id == group_id) {
			Some(g) => {
				g.name = name.into();
				true
			}
			None => false,
		}
	}

	/// `None` removes membership. Unknown groups are a no-op. Returns whether
	/// membership changed.
	pub fn assign(&mut self, node_id: &str, group_id: Option<&str>) -> bool {
		match group_id {
			None => self.node_groups.remove(node_id).is_some(),
			Some(g) if !self.contains(g) => false,
			Some(g) => self
				.node_groups
				.insert(node_id.to_string(), g.to_string())
				.is_none_or(|prev| prev != g),
		}
	}

	/// Adds the node to the group, or removes it if it is already a member.
	pub fn toggle(&mut self, node_id: &str, group_id: &str) -> bool {
		if self.group_of(node_id) == Some(group_id) {
			self.assign(node_id, None)
		} else {
			self.assign(node_id, Some(group_id))
		}
	}

	pub fn group_of(&self, node_id: &str) -> Option<&str> {
		self.node_groups.get(node_id).map(String::as_str)
	}

	/// The override color for a node, if it belongs to a group.
	pub fn color_of(&self, node_id: &str) -> Option<&str> {
		let group = self.group_of(node_id)?;
		self.groups
			.iter()
			.find(|g| g.id == group)
			.map(|g| g.color.as_str())
	}

	pub fn members(&self, group_id: &str) -> Vec<String> {
		self.node_groups
			.iter()
			.filter(|(_, g)| *g == group_id)
			.map(|(n, _)| n.clone())
			.collect()
	}

	pub fn counts(&self) -> Vec<(String, usize)> {
		self.groups
			.iter()
			.map(|g| (g.id.clone(), self.members(&g.id).len()))
			.collect()
	}

	pub fn memberships(&self) -> &BTreeMap<String, String> {
		&self.node_groups
	}

	pub fn groups(&self) -> Vec<Group> {
		self.groups
			.iter()
			.map(|g| Group {
				id: g.id.clone(),
				name: g.name.clone(),
				color: g.color.clone(),
				nodes: self.members(&g.id),
			})
			.collect()
	}

	pub fn group(&self, group_id: &str) -> Option<Group> {
		self.groups().into_iter().find(|g| g.id == group_id)
	}

	/// Replaces every group; memberships come from each group's node list.
	pub fn update_groups(&mut self, groups: Vec<Group>) {
		self.groups.clear();
		self.node_groups.clear();
		for group in groups {
			if self.contains(&group.id) {
				warn!("duplicate group id {} ignored", group.id);
				continue;
			}
			for node in &group.nodes {
				self.node_groups.insert(node.clone(), group.id.clone());
			}
			self.groups.push(GroupMeta {
				id: group.id,
				name: group.name,
				color: group.color,
			});
		}
	}

	pub fn export(&self) -> GroupFile {
		GroupFile {
			groups: self.groups(),
			node_groups: self
				.node_groups
				.iter()
				.map(|(n, g)| NodeGroup {
					node_id: n.clone(),
					group_id: g.clone(),
				})
				.collect(),
		}
	}

	pub fn to_json(&self) -> Result<String, EngineError> {
		Ok(serde_json::to_string_pretty(&self.export())?)
	}

	/// Replaces the store with the file's contents. Explicit `nodeGroups`
	/// entries win over the groups' own node lists.
	pub fn import(&mut self, file: GroupFile) -> Result<(), EngineError> {
		let mut seen = std::collections::HashSet::new();
		if let Some(dup) = file.groups.iter().find(|g| !seen.insert(g.id.as_str())) {
			return Err(EngineError::InvalidGroupFile(format!(
				"group id {} appears twice",
				dup.id
			)));
		}
		self.update_groups(file.groups);
		for entry in file.node_groups {
			if !self.assign(&entry.node_id, Some(&entry.group_id))
				&& !self.contains(&entry.group_id)
			{
				warn!(
					"membership of {} in unknown group {} ignored",
					entry.node_id, entry.group_id
				);
			}
		}
		info!(
			"imported {} groups, {} memberships",
			self.groups.len(),
			self.node_groups.len()
		);
		Ok(())
	}

	pub fn from_json(json: &str) -> Result<Self, EngineError> {
		let mut store = Self::new();
		store.import(serde_json::from_str(json)?)?;
		Ok(store)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn last_assignment_wins_and_overrides_color() {
		let mut store = GroupStore::new();
		let a = store.create("Left", "#ff0000");
		let b = store.create("Right", "#0000ff");
		assert!(store.assign("n1", Some(&a)));
		assert!(store.assign("n1", Some(&b)));
		assert!(!store.assign("n1", Some(&b)));
		assert_eq!(store.group_of("n1"), Some(b.as_str()));
		assert_eq!(store.color_of("n1"), Some("#0000ff"));
		assert_eq!(store.members(&a), Vec::<String>::new());
	}

	#[test]
	fn unknown_group_and_removal() {
		let mut store = GroupStore::new();
		let a = store.create("A", "#fff");
		assert!(!store.assign("n1", Some("nope")));
		assert!(!store.assign("n1", None));
		store.assign("n1", Some(&a));
		assert!(store.toggle("n1", &a));
		assert_eq!(store.group_of("n1"), None);
		assert!(store.toggle("n1", &a));
		assert!(store.delete(&a));
		assert_eq!(store.group_of("n1"), None);
		assert!(!store.delete(&a));
	}

	#[test]
	fn numeric_ids_are_accepted() {
		let store = GroupStore::from_json(
			r##"{
				"groups": [{"id": 1712345678901, "color": "#abc", "nodes": ["a"]}],
				"nodeGroups": [{"nodeId": "b", "groupId": 1712345678901}]
			}"##,
		)
		.unwrap();
		assert_eq!(store.members("1712345678901"), vec!["a", "b"]);
	}

	#[test]
	fn duplicate_group_ids_are_rejected() {
		let err = GroupStore::from_json(
			r##"{"groups": [{"id": "x", "color": "#a"}, {"id": "x", "color": "#b"}]}"##,
		);
		assert!(matches!(err, Err(EngineError::InvalidGroupFile(_))));
	}

	#[test]
	fn counts_follow_membership() {
		let mut store = GroupStore::new();
		let a = store.create("A", "#fff");
		store.assign("n1", Some(&a));
		store.assign("n2", Some(&a));
		assert_eq!(store.counts(), vec![(a, 2)]);
	}

	proptest! {
		#[test]
		fn export_import_round_trip(
			groups in 1usize..5,
			assignments in prop::collection::vec((0usize..30, 0usize..6), 0..40),
		) {
			let mut store = GroupStore::new();
			let ids: Vec<String> = (0..groups)
				.map(|i| store.create(format!("G{i}"), format!("#{i:06x}")))
				.collect();
			for (node, group) in assignments {
				let target = ids.get(group).map(String::as_str);
				store.assign(&format!("n{node}"), target);
			}
			let restored = GroupStore::from_json(&store.to_json().unwrap()).unwrap();
			prop_assert_eq!(restored.memberships(), store.memberships());
			prop_assert_eq!(restored.groups(), store.groups());
		}
	}
}
