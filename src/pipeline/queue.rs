//! In-process ingestion queue
//!
//! Bounded channel feeding a fixed set of worker tasks. Handlers enqueue
//! and return; a full queue is an observable failure (the route maps it
//! to 503) instead of unbounded memory growth. A worker that hits an
//! unexpected error logs it and moves to the next job.

use bson::oid::ObjectId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::db::schemas::ContentType;
use crate::pipeline::processor::Processor;
use crate::types::AtheneumError;

/// One ingestion run request
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub content_id: ObjectId,
    pub content_type: ContentType,
    /// File URL or external video URL to extract from
    pub source_url: String,
}

/// Handle to the running pipeline
#[derive(Clone)]
pub struct PipelineQueue {
    job_tx: mpsc::Sender<PipelineJob>,
    queued: Arc<AtomicUsize>,
    worker_count: usize,
}

impl PipelineQueue {
    /// Spawn the worker tasks and return the enqueue handle
    pub fn start(processor: Processor, worker_count: usize, queue_size: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<PipelineJob>(queue_size);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let queued = Arc::new(AtomicUsize::new(0));

        info!(
            "Starting pipeline with {} workers, queue size {}",
            worker_count, queue_size
        );

        for worker_id in 0..worker_count {
            let processor = processor.clone();
            let job_rx = Arc::clone(&job_rx);
            let queued = Arc::clone(&queued);

            tokio::spawn(async move {
                worker_task(worker_id, processor, job_rx, queued).await;
            });
        }

        Self {
            job_tx,
            queued,
            worker_count,
        }
    }

    /// Enqueue a job without blocking. Fails when the queue is full or
    /// the workers are gone.
    pub fn enqueue(&self, job: PipelineJob) -> Result<(), AtheneumError> {
        match self.job_tx.try_send(job) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(AtheneumError::Overloaded(
                "Content pipeline queue is full, try again later".into(),
            )),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(AtheneumError::Internal("Pipeline workers are down".into()))
            }
        }
    }

    /// Approximate number of jobs waiting or running
    pub fn depth(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Healthy while the channel still has receivers
    pub fn is_healthy(&self) -> bool {
        !self.job_tx.is_closed()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

async fn worker_task(
    worker_id: usize,
    processor: Processor,
    job_rx: Arc<Mutex<mpsc::Receiver<PipelineJob>>>,
    queued: Arc<AtomicUsize>,
) {
    info!("Pipeline worker {} starting", worker_id);

    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            match rx.recv().await {
                Some(job) => job,
                None => {
                    info!("Pipeline worker {} shutting down (channel closed)", worker_id);
                    return;
                }
            }
        };

        let content_id = job.content_id.to_hex();
        if let Err(e) = processor.process(job).await {
            // Persistence failures mid-run; the record keeps whatever
            // state the last successful write left.
            error!(worker = worker_id, content_id, "Pipeline run errored: {}", e);
        }
        queued.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_full_channel_is_overloaded() {
        // Channel with no consumers: capacity 1 fills after one send
        let (job_tx, _job_rx) = mpsc::channel::<PipelineJob>(1);
        let queue = PipelineQueue {
            job_tx,
            queued: Arc::new(AtomicUsize::new(0)),
            worker_count: 0,
        };

        let job = PipelineJob {
            content_id: ObjectId::new(),
            content_type: ContentType::Pdf,
            source_url: "https://cdn.example.com/a.pdf".into(),
        };

        assert!(queue.enqueue(job.clone()).is_ok());
        let err = queue.enqueue(job).unwrap_err();
        assert_eq!(err.code(), "OVERLOADED");
        assert_eq!(queue.depth(), 1);
    }

    #[test]
    fn enqueue_closed_channel_is_internal() {
        let (job_tx, job_rx) = mpsc::channel::<PipelineJob>(1);
        drop(job_rx);
        let queue = PipelineQueue {
            job_tx,
            queued: Arc::new(AtomicUsize::new(0)),
            worker_count: 0,
        };

        let job = PipelineJob {
            content_id: ObjectId::new(),
            content_type: ContentType::Code,
            source_url: "https://cdn.example.com/a.rs".into(),
        };
        let err = queue.enqueue(job).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!queue.is_healthy());
    }
}
