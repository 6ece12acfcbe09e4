//! Cancel-and-rearm slot for the background refresh task.

// crates.io
use tokio::task::JoinHandle;
// self
use crate::_prelude::*;

#[derive(Debug, Default)]
struct Slot {
	generation: u64,
	handle: Option<JoinHandle<()>>,
}

/// Holds at most one pending background task.
///
/// Every [`rearm`](RefreshSchedule::rearm) aborts the previous task and bumps a generation
/// counter. A task that fires calls [`detach`](RefreshSchedule::detach) first so the refresh
/// it performs (which rearms the slot) cannot abort the task itself.
#[derive(Debug, Default)]
pub(crate) struct RefreshSchedule(Mutex<Slot>);
impl RefreshSchedule {
	/// Aborts the pending task and installs the one produced by `spawn`, which receives the new
	/// generation.
	pub(crate) fn rearm(&self, spawn: impl FnOnce(u64) -> JoinHandle<()>) -> u64 {
		let mut slot = self.0.lock();

		if let Some(handle) = slot.handle.take() {
			handle.abort();
		}

		slot.generation += 1;

		let generation = slot.generation;

		slot.handle = Some(spawn(generation));

		generation
	}

	/// Releases the handle of `generation` without aborting it.
	///
	/// Returns `false` if the slot was rearmed since, in which case the caller is stale.
	pub(crate) fn detach(&self, generation: u64) -> bool {
		let mut slot = self.0.lock();

		if slot.generation != generation {
			return false;
		}

		slot.handle.take();

		true
	}

	/// Returns `true` if no rearm happened after `generation` was installed.
	pub(crate) fn is_current(&self, generation: u64) -> bool {
		self.0.lock().generation == generation
	}

	/// Returns `true` while a task is installed and not yet detached.
	pub(crate) fn is_armed(&self) -> bool {
		self.0.lock().handle.as_ref().is_some_and(|handle| !handle.is_finished())
	}

	/// Aborts the pending task, if any.
	pub(crate) fn cancel(&self) {
		if let Some(handle) = self.0.lock().handle.take() {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	fn counting_task(counter: &Arc<AtomicUsize>, delay: Duration) -> JoinHandle<()> {
		let counter = counter.clone();

		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			counter.fetch_add(1, Ordering::SeqCst);
		})
	}

	#[tokio::test]
	async fn rearm_aborts_previous_task() {
		let schedule = RefreshSchedule::default();
		let first = Arc::new(AtomicUsize::new(0));
		let second = Arc::new(AtomicUsize::new(0));
		let g1 = schedule.rearm(|_| counting_task(&first, Duration::from_millis(50)));
		let g2 = schedule.rearm(|_| counting_task(&second, Duration::from_millis(50)));

		assert_eq!((g1, g2), (1, 2));
		assert!(schedule.is_armed());

		tokio::time::sleep(Duration::from_millis(200)).await;

		assert_eq!(first.load(Ordering::SeqCst), 0);
		assert_eq!(second.load(Ordering::SeqCst), 1);
		assert!(!schedule.is_armed());
	}

	#[tokio::test]
	async fn detach_only_succeeds_for_current_generation() {
		let schedule = RefreshSchedule::default();
		let counter = Arc::new(AtomicUsize::new(0));
		let generation = schedule.rearm(|_| counting_task(&counter, Duration::from_millis(20)));

		assert!(schedule.detach(generation));
		assert!(schedule.is_current(generation));
		assert!(!schedule.is_armed());

		// A detached task keeps running to completion.
		tokio::time::sleep(Duration::from_millis(100)).await;

		assert_eq!(counter.load(Ordering::SeqCst), 1);

		schedule.rearm(|_| counting_task(&counter, Duration::from_secs(60)));

		assert!(!schedule.detach(generation));
		assert!(!schedule.is_current(generation));

		schedule.cancel();

		assert!(!schedule.is_armed());
	}
}
