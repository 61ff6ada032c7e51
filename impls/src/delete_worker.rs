use api::store::BlobStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One queued blob removal: `bucket/name` on the store that owns it.
struct DeleteWork {
	bucket: String,
	name: String,
}

/// A bounded pool of workers (`N`, fixed at construction) draining an unbounded queue of
/// blob deletions in the background.
///
/// File soft-delete is synchronous and returns as soon as the metadata row is marked
/// deleted; the corresponding blob-store object is removed out of band here so a slow or
/// failing object-store delete never blocks the RPC caller. A failed delete is logged and
/// dropped, not retried: a soft-deleted row is already invisible to every read path, so a
/// leaked object is a storage-cost problem, not a correctness one. The queue itself is
/// unbounded so [`queue_delete`](DeleteWorkerPool::queue_delete) never blocks its caller on
/// worker backpressure; only the pool being closed can make it fail.
pub struct DeleteWorkerPool {
	sender: mpsc::UnboundedSender<DeleteWork>,
	workers: Vec<JoinHandle<()>>,
}

impl DeleteWorkerPool {
	/// Spawns `worker_count` consumer tasks pulling from an unbounded queue against
	/// `blob_store`.
	pub fn spawn(blob_store: Arc<dyn BlobStore>, worker_count: usize) -> Self {
		let (sender, receiver) = mpsc::unbounded_channel();
		let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
		let workers = (0..worker_count)
			.map(|_| {
				let receiver = receiver.clone();
				let blob_store = blob_store.clone();
				tokio::spawn(async move {
					loop {
						let work = {
							let mut guard = receiver.lock().await;
							guard.recv().await
						};
						let Some(work) = work else { break };
						if let Err(e) = blob_store.delete(&work.bucket, &work.name).await {
							log::warn!(
								"blob delete failed for {}/{}: {e}",
								work.bucket,
								work.name
							);
						}
					}
				})
			})
			.collect();
		Self { sender, workers }
	}

	/// Enqueues a deletion. Non-blocking: the queue is unbounded, so this only fails (and
	/// logs) if the pool has already been shut down.
	pub async fn queue_delete(&self, bucket: impl Into<String>, name: impl Into<String>) {
		let work = DeleteWork { bucket: bucket.into(), name: name.into() };
		if self.sender.send(work).is_err() {
			log::error!("delete worker pool is shut down, dropping queued delete");
		}
	}

	/// Closes the queue and waits for every worker to drain it.
	pub async fn shutdown(self) {
		drop(self.sender);
		for worker in self.workers {
			let _ = worker.await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::blob_store::FsBlobStore;
	use std::io::Cursor;

	#[tokio::test]
	async fn queued_delete_eventually_removes_the_object() {
		let dir = tempfile::tempdir().unwrap();
		let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path()).unwrap());
		store.put("notes", "f1", Box::new(Cursor::new(b"x".to_vec()))).await.unwrap();

		let pool = DeleteWorkerPool::spawn(store.clone(), 2);
		pool.queue_delete("notes", "f1").await;
		pool.shutdown().await;

		assert!(store.get("notes", "f1").await.is_err());
	}

	#[tokio::test]
	async fn failed_delete_does_not_take_down_the_pool() {
		let dir = tempfile::tempdir().unwrap();
		let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path()).unwrap());
		let pool = DeleteWorkerPool::spawn(store.clone(), 1);

		pool.queue_delete("notes", "never-existed").await;
		pool.queue_delete("notes", "also-missing").await;
		pool.shutdown().await;
	}
}
