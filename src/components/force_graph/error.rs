use thiserror::Error;

/// Failures at the engine's data boundaries. Everything past these boundaries
/// recovers locally and never surfaces as an error.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("malformed JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid group file: {0}")]
	InvalidGroupFile(String),

	#[error("no project is loaded")]
	NotLoaded,
}

/// A record dropped or repaired while building the model.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DataIssue {
	#[error("duplicate node id `{0}`; later record dropped")]
	DuplicateNode(String),

	#[error("link `{from}` -> `{to}` references unknown node `{missing}`; dropped")]
	DanglingLink {
		from: String,
		to: String,
		missing: String,
	},

	#[error("link `{from}` -> `{to}` has weight {weight}; clamped to 1")]
	WeightClamped {
		from: String,
		to: String,
		weight: f64,
	},
}
