//! Graceful shutdown coordination.
//!
//! One [`ShutdownCoordinator`] is shared by the server accept loop, its
//! connections and the background task runner. Calling
//! [`shutdown`](ShutdownCoordinator::shutdown) broadcasts to every subscriber;
//! the server reports back through
//! [`notify_shutdown_complete`](ShutdownCoordinator::notify_shutdown_complete).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

#[derive(Clone)]
pub struct ShutdownCoordinator {
	shutdown_tx: broadcast::Sender<()>,
	complete_tx: Arc<watch::Sender<bool>>,
	shutting_down: Arc<AtomicBool>,
	timeout: Duration,
}

impl ShutdownCoordinator {
	/// `timeout` bounds how long [`wait_for_shutdown`](Self::wait_for_shutdown)
	/// waits for in-flight work.
	pub fn new(timeout: Duration) -> Self {
		let (shutdown_tx, _) = broadcast::channel(4);
		let (complete_tx, _) = watch::channel(false);
		Self {
			shutdown_tx,
			complete_tx: Arc::new(complete_tx),
			shutting_down: Arc::new(AtomicBool::new(false)),
			timeout,
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<()> {
		self.shutdown_tx.subscribe()
	}

	pub fn shutdown(&self) {
		if !self.shutting_down.swap(true, Ordering::SeqCst) {
			tracing::info!("shutdown requested");
			// No receivers just means nothing is running yet.
			let _ = self.shutdown_tx.send(());
		}
	}

	pub fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::SeqCst)
	}

	pub fn notify_shutdown_complete(&self) {
		self.complete_tx.send_replace(true);
	}

	/// Waits until the server reports completion. Returns `false` when the
	/// timeout elapsed first.
	pub async fn wait_for_shutdown(&self) -> bool {
		let mut complete_rx = self.complete_tx.subscribe();
		tokio::time::timeout(self.timeout, complete_rx.wait_for(|done| *done))
			.await
			.is_ok()
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(error) = tokio::signal::ctrl_c().await {
			tracing::error!(%error, "failed to listen for Ctrl-C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(error) => {
				tracing::error!(%error, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => tracing::info!("received Ctrl-C"),
		_ = terminate => tracing::info!("received SIGTERM"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_shutdown_reaches_every_subscriber() {
		let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
		let mut first = coordinator.subscribe();
		let mut second = coordinator.subscribe();

		coordinator.shutdown();
		coordinator.shutdown();

		assert!(coordinator.is_shutting_down());
		assert!(first.recv().await.is_ok());
		assert!(second.recv().await.is_ok());
	}

	#[rstest]
	#[tokio::test]
	async fn test_wait_for_shutdown() {
		let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
		assert!(!coordinator.wait_for_shutdown().await);

		let server = coordinator.clone();
		tokio::spawn(async move { server.notify_shutdown_complete() });
		assert!(coordinator.wait_for_shutdown().await);
	}
}
