//! Periodic background work.
//!
//! The [`TaskRunner`] wakes every `tasks.interval_secs` and runs each
//! registered [`PeriodicTask`] in turn until the shutdown broadcast arrives.
//! A failing task is logged and the next one still runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cantina_core::Result;
use cantina_db::repositories::accounts;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::services::notifications;
use crate::state::AppState;

#[async_trait]
pub trait PeriodicTask: Send + Sync {
	fn name(&self) -> &str;

	/// Runs once. Returns how many records were touched.
	async fn run(&self, state: &AppState) -> Result<usize>;
}

/// Low and negative balance alerts for guardians.
pub struct BalanceScanTask;

#[async_trait]
impl PeriodicTask for BalanceScanTask {
	fn name(&self) -> &str {
		"balance_scan"
	}

	async fn run(&self, state: &AppState) -> Result<usize> {
		notifications::scan_balances(&state.db, &state.settings.business).await
	}
}

/// Unpaid lunch fees past their due date.
pub struct OverdueFeesTask;

#[async_trait]
impl PeriodicTask for OverdueFeesTask {
	fn name(&self) -> &str {
		"overdue_lunch_fees"
	}

	async fn run(&self, state: &AppState) -> Result<usize> {
		notifications::flag_overdue_fees(&state.db, state.today()).await
	}
}

/// Expired sessions and spent password recovery tokens.
pub struct ExpiredSessionsTask;

#[async_trait]
impl PeriodicTask for ExpiredSessionsTask {
	fn name(&self) -> &str {
		"expired_sessions"
	}

	async fn run(&self, state: &AppState) -> Result<usize> {
		let mut conn = state.db.pool().acquire().await?;
		let now = Utc::now();
		let sessions = accounts::delete_expired_sessions(&mut conn, now).await?;
		let tokens = accounts::delete_stale_recovery_tokens(&mut conn, now).await?;
		Ok(usize::try_from(sessions.saturating_add(tokens)).unwrap_or(usize::MAX))
	}
}

pub struct TaskRunner {
	tasks: Vec<Arc<dyn PeriodicTask>>,
	interval: Duration,
}

impl TaskRunner {
	pub fn new(interval: Duration) -> Self {
		Self {
			tasks: Vec::new(),
			interval,
		}
	}

	/// The runner with the canteen's standard tasks.
	pub fn standard(interval: Duration) -> Self {
		Self::new(interval)
			.with_task(Arc::new(BalanceScanTask))
			.with_task(Arc::new(OverdueFeesTask))
			.with_task(Arc::new(ExpiredSessionsTask))
	}

	pub fn with_task(mut self, task: Arc<dyn PeriodicTask>) -> Self {
		self.tasks.push(task);
		self
	}

	pub fn task_names(&self) -> Vec<&str> {
		self.tasks.iter().map(|task| task.name()).collect()
	}

	/// Runs every task once, in registration order.
	pub async fn run_once(&self, state: &AppState) {
		for task in &self.tasks {
			match task.run(state).await {
				Ok(0) => tracing::debug!(task = task.name(), "task finished, nothing to do"),
				Ok(count) => tracing::info!(task = task.name(), count, "task finished"),
				Err(error) => tracing::error!(task = task.name(), %error, "task failed"),
			}
		}
	}

	/// Ticks until `shutdown` fires. The first round runs immediately.
	pub async fn run(self, state: AppState, mut shutdown: broadcast::Receiver<()>) {
		let mut interval = tokio::time::interval(self.interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		tracing::info!(interval_secs = self.interval.as_secs(), tasks = ?self.task_names(), "task runner started");

		loop {
			tokio::select! {
				_ = interval.tick() => self.run_once(&state).await,
				_ = shutdown.recv() => break,
			}
		}
		tracing::info!("task runner stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::testing::{TestEnv, env};
	use cantina_core::Error;
	use cantina_db::repositories::notifications as notification_repo;
	use rstest::rstest;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Counting {
		runs: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl PeriodicTask for Counting {
		fn name(&self) -> &str {
			"counting"
		}

		async fn run(&self, _state: &AppState) -> Result<usize> {
			Ok(self.runs.fetch_add(1, Ordering::SeqCst) + 1)
		}
	}

	struct Failing;

	#[async_trait]
	impl PeriodicTask for Failing {
		fn name(&self) -> &str {
			"failing"
		}

		async fn run(&self, _state: &AppState) -> Result<usize> {
			Err(Error::Internal("boom".to_string()))
		}
	}

	#[rstest]
	fn test_standard_tasks() {
		let runner = TaskRunner::standard(Duration::from_secs(3_600));
		assert_eq!(runner.task_names(), vec!["balance_scan", "overdue_lunch_fees", "expired_sessions"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failure_does_not_stop_later_tasks(#[future] env: TestEnv) {
		let env = env.await;
		let runs = Arc::new(AtomicUsize::new(0));
		let runner = TaskRunner::new(Duration::from_secs(60))
			.with_task(Arc::new(Failing))
			.with_task(Arc::new(Counting { runs: runs.clone() }));

		runner.run_once(&env.state).await;
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_runner_stops_on_shutdown(#[future] env: TestEnv) {
		let env = env.await;
		let runs = Arc::new(AtomicUsize::new(0));
		let runner = TaskRunner::new(Duration::from_millis(10)).with_task(Arc::new(Counting { runs: runs.clone() }));
		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

		let handle = tokio::spawn(runner.run(env.state.clone(), shutdown_rx));
		tokio::time::sleep(Duration::from_millis(50)).await;
		shutdown_tx.send(()).unwrap();
		tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

		let seen = runs.load(Ordering::SeqCst);
		assert!(seen >= 1);
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert_eq!(runs.load(Ordering::SeqCst), seen);
	}

	#[rstest]
	#[tokio::test]
	async fn test_balance_scan_notifies_guardian(#[future] env: TestEnv) {
		let env = env.await;
		env.set_balance(-5_000).await;

		let sent = BalanceScanTask.run(&env.state).await.unwrap();
		assert_eq!(sent, 1);

		let mut conn = env.state.db.pool().acquire().await.unwrap();
		let unread = notification_repo::list_for_customer(&mut conn, env.customer_id, true).await.unwrap();
		assert_eq!(unread.len(), 1);
	}
}
