//! Background centrality on native targets. The browser build advances
//! [`CentralityJob`] cooperatively from the frame loop instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use log::{debug, warn};

use super::centrality::{CentralityJob, CentralityScores};

/// Handle to a centrality job running on its own thread. Dropping the handle
/// cancels the job.
pub struct CentralityWorker {
	generation: u64,
	cancel: Arc<AtomicBool>,
	receiver: Receiver<CentralityScores>,
	handle: Option<thread::JoinHandle<()>>,
}

impl CentralityWorker {
	/// Starts `job`, checking for cancellation every `chunk` sources.
	pub fn spawn(mut job: CentralityJob, chunk: usize) -> Self {
		let generation = job.generation();
		let cancel = Arc::new(AtomicBool::new(false));
		let (tx, receiver) = bounded(1);
		let flag = Arc::clone(&cancel);

		let handle = thread::Builder::new()
			.name(format!("centrality-{generation}"))
			.spawn(move || {
				while !flag.load(Ordering::Relaxed) {
					if job.step(chunk) {
						break;
					}
				}
				if flag.load(Ordering::Relaxed) {
					debug!("centrality job {generation} cancelled");
					return;
				}
				if let Some(scores) = job.finish() {
					let _ = tx.send(scores);
				}
			});

		let handle = match handle {
			Ok(h) => Some(h),
			Err(e) => {
				warn!("could not start centrality thread: {e}");
				None
			}
		};

		Self {
			generation,
			cancel,
			receiver,
			handle,
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn cancel(&self) {
		self.cancel.store(true, Ordering::Relaxed);
	}

	/// Whether the thread is gone and will never deliver a result.
	pub fn is_dead(&self) -> bool {
		self.receiver.is_empty() && self.handle.as_ref().is_none_or(|h| h.is_finished())
	}

	/// Non-blocking poll for the finished scores.
	pub fn try_result(&self) -> Option<CentralityScores> {
		match self.receiver.try_recv() {
			Ok(scores) => Some(scores),
			Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
		}
	}

	/// Blocks until the job finishes. `None` if it was cancelled.
	pub fn wait(mut self) -> Option<CentralityScores> {
		let result = self.receiver.recv().ok();
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
		result
	}
}

impl Drop for CentralityWorker {
	fn drop(&mut self) {
		self.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ring(n: usize) -> Vec<Vec<usize>> {
		(0..n).map(|i| vec![(i + n - 1) % n, (i + 1) % n]).collect()
	}

	#[test]
	fn worker_matches_inline_result() {
		let inline = CentralityJob::from_adjacency(3, ring(40)).run().unwrap();
		let worker = CentralityWorker::spawn(CentralityJob::from_adjacency(3, ring(40)), 7);
		assert_eq!(worker.wait().unwrap(), inline);
	}

	#[test]
	fn cancelled_worker_yields_nothing() {
		let worker = CentralityWorker::spawn(CentralityJob::from_adjacency(3, ring(20_000)), 1);
		worker.cancel();
		// The thread may finish a few sources before it sees the flag, but
		// never the full ring.
		assert!(worker.wait().is_none());
	}
}
