//! Degree, closeness and betweenness over the unweighted adjacency.
//!
//! One BFS per source feeds both closeness and Brandes' dependency
//! accumulation, so a job can be advanced a few sources at a time.

use std::collections::VecDeque;

use log::debug;

use super::model::GraphModel;
use super::types::NodeCentrality;

/// Finished scores, tagged with the model build they belong to.
#[derive(Clone, Debug, PartialEq)]
pub struct CentralityScores {
	pub generation: u64,
	pub scores: Vec<NodeCentrality>,
}

/// Resumable centrality computation over a snapshot of the adjacency.
#[derive(Clone, Debug)]
pub struct CentralityJob {
	generation: u64,
	adj: Vec<Vec<usize>>,
	next_source: usize,
	closeness: Vec<f64>,
	betweenness: Vec<f64>,
	cancelled: bool,
}

impl CentralityJob {
	pub fn new(model: &GraphModel) -> Self {
		Self::from_adjacency(model.generation(), model.adjacency().to_lists())
	}

	pub fn from_adjacency(generation: u64, adj: Vec<Vec<usize>>) -> Self {
		let n = adj.len();
		Self {
			generation,
			adj,
			next_source: 0,
			closeness: vec![0.0; n],
			betweenness: vec![0.0; n],
			cancelled: false,
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_finished(&self) -> bool {
		self.next_source >= self.adj.len()
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled
	}

	pub fn cancel(&mut self) {
		self.cancelled = true;
	}

	pub fn progress(&self) -> f64 {
		if self.adj.is_empty() {
			1.0
		} else {
			self.next_source as f64 / self.adj.len() as f64
		}
	}

	/// Processes up to `sources` BFS sources. Returns whether the job is done.
	pub fn step(&mut self, sources: usize) -> bool {
		if self.cancelled {
			return false;
		}
		let end = self
			.next_source
			.saturating_add(sources.max(1))
			.min(self.adj.len());
		let mut scratch = Scratch::new(self.adj.len());
		for source in self.next_source..end {
			self.visit(source, &mut scratch);
		}
		self.next_source = end;
		self.is_finished()
	}

	pub fn run(mut self) -> Option<CentralityScores> {
		self.step(usize::MAX);
		self.finish()
	}

	/// The scores, if every source was processed and the job was not cancelled.
	pub fn finish(self) -> Option<CentralityScores> {
		if self.cancelled || !self.is_finished() {
			return None;
		}
		let scores = self
			.adj
			.iter()
			.zip(self.closeness)
			.zip(self.betweenness)
			.map(|((neighbors, closeness), betweenness)| NodeCentrality {
				degree: neighbors.len(),
				closeness,
				betweenness: betweenness / 2.0,
			})
			.collect::<Vec<_>>();
		debug!("centrality computed for {} nodes", scores.len());
		Some(CentralityScores {
			generation: self.generation,
			scores,
		})
	}

	fn visit(&mut self, source: usize, s: &mut Scratch) {
		s.reset(source);
		s.queue.push_back(source);

		while let Some(v) = s.queue.pop_front() {
			s.stack.push(v);
			for &w in &self.adj[v] {
				if s.distance[w] < 0 {
					s.distance[w] = s.distance[v] + 1;
					s.queue.push_back(w);
				}
				if s.distance[w] == s.distance[v] + 1 {
					s.sigma[w] += s.sigma[v];
					s.predecessors[w].push(v);
				}
			}
		}

		let (reached, total) = s
			.stack
			.iter()
			.filter(|&&v| v != source)
			.fold((0usize, 0i64), |(count, sum), &v| (count + 1, sum + s.distance[v] as i64));
		self.closeness[source] = if total > 0 {
			reached as f64 / total as f64
		} else {
			0.0
		};

		while let Some(w) = s.stack.pop() {
			for &v in &s.predecessors[w] {
				s.delta[v] += s.sigma[v] / s.sigma[w] * (1.0 + s.delta[w]);
			}
			if w != source {
				self.betweenness[w] += s.delta[w];
			}
		}
	}
}

/// Per-source buffers, reused across sources.
struct Scratch {
	stack: Vec<usize>,
	queue: VecDeque<usize>,
	predecessors: Vec<Vec<usize>>,
	sigma: Vec<f64>,
	delta: Vec<f64>,
	distance: Vec<i32>,
}

impl Scratch {
	fn new(n: usize) -> Self {
		Self {
			stack: Vec::new(),
			queue: VecDeque::new(),
			predecessors: vec![Vec::new(); n],
			sigma: vec![0.0; n],
			delta: vec![0.0; n],
			distance: vec![-1; n],
		}
	}

	fn reset(&mut self, source: usize) {
		self.predecessors.iter_mut().for_each(Vec::clear);
		self.sigma.fill(0.0);
		self.delta.fill(0.0);
		self.distance.fill(-1);
		self.stack.clear();
		self.queue.clear();
		self.sigma[source] = 1.0;
		self.distance[source] = 0;
	}
}

/// Computes everything in one go.
pub fn compute(model: &GraphModel) -> Option<CentralityScores> {
	CentralityJob::new(model).run()
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use proptest::prelude::*;

	use super::*;

	fn adjacency(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
		let mut sets = vec![BTreeSet::new(); n];
		for &(a, b) in edges {
			if a != b {
				sets[a].insert(b);
				sets[b].insert(a);
			}
		}
		sets.into_iter().map(|s| s.into_iter().collect()).collect()
	}

	fn scores(n: usize, edges: &[(usize, usize)]) -> Vec<NodeCentrality> {
		CentralityJob::from_adjacency(1, adjacency(n, edges))
			.run()
			.unwrap()
			.scores
	}

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-9
	}

	#[test]
	fn path_of_three() {
		let s = scores(3, &[(0, 1), (1, 2)]);
		assert_eq!(
			s.iter().map(|c| c.degree).collect::<Vec<_>>(),
			vec![1, 2, 1]
		);
		assert!(close(s[1].closeness, 1.0));
		// Two nodes reached at distances 1 and 2.
		assert!(close(s[0].closeness, 2.0 / 3.0));
		assert!(close(s[2].closeness, 2.0 / 3.0));
		assert!(close(s[1].betweenness, 1.0));
		assert!(close(s[0].betweenness, 0.0));
		assert!(close(s[2].betweenness, 0.0));
	}

	#[test]
	fn star_center_carries_all_paths() {
		let s = scores(5, &[(0, 1), (0, 2), (0, 3), (0, 4)]);
		// C(4, 2) leaf pairs route through the hub.
		assert!(close(s[0].betweenness, 6.0));
		assert!(s[1..].iter().all(|c| close(c.betweenness, 0.0)));
	}

	#[test]
	fn isolated_and_empty_graphs_are_zero() {
		let s = scores(2, &[]);
		assert!(s.iter().all(|c| c.closeness == 0.0 && c.betweenness == 0.0));
		assert!(scores(0, &[]).is_empty());
	}

	#[test]
	fn stepping_matches_one_shot() {
		let edges = [(0, 1), (1, 2), (2, 3), (3, 0), (1, 3), (4, 5)];
		let mut job = CentralityJob::from_adjacency(7, adjacency(6, &edges));
		assert!(!job.step(2));
		assert!((job.progress() - 1.0 / 3.0).abs() < 1e-9);
		assert!(!job.step(2));
		assert!(job.step(2));
		assert_eq!(job.finish().unwrap().scores, scores(6, &edges));
	}

	#[test]
	fn cancelled_or_partial_jobs_yield_nothing() {
		let mut job = CentralityJob::from_adjacency(1, adjacency(3, &[(0, 1)]));
		job.step(1);
		assert!(job.clone().finish().is_none());
		job.cancel();
		assert!(!job.step(10));
		assert!(job.finish().is_none());
	}

	fn graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
		(1usize..14).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..40)))
	}

	proptest! {
		#[test]
		fn degree_sum_is_twice_the_edge_count((n, edges) in graph()) {
			let unique_edges: BTreeSet<_> = edges
				.iter()
				.filter(|(a, b)| a != b)
				.map(|&(a, b)| (a.min(b), a.max(b)))
				.collect();
			let s = scores(n, &edges);
			prop_assert_eq!(s.iter().map(|c| c.degree).sum::<usize>(), 2 * unique_edges.len());
		}

		#[test]
		fn closeness_is_a_unit_score((n, edges) in graph()) {
			let adj = adjacency(n, &edges);
			for (v, c) in scores(n, &edges).iter().enumerate() {
				prop_assert!((0.0..=1.0).contains(&c.closeness));
				prop_assert_eq!(c.closeness == 0.0, adj[v].is_empty());
			}
		}

		#[test]
		fn betweenness_ignores_edge_direction((n, edges) in graph()) {
			let reversed: Vec<_> = edges.iter().map(|&(a, b)| (b, a)).collect();
			let (fwd, rev) = (scores(n, &edges), scores(n, &reversed));
			for (a, b) in fwd.iter().zip(&rev) {
				prop_assert!((a.betweenness - b.betweenness).abs() < 1e-9);
			}
		}
	}
}
