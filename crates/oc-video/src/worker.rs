//! Background pipeline builds
//!
//! Jobs carry environments captured on the submitting thread, so workers
//! never touch channel state. Finished pipelines wait in an inbox until the
//! cache collects them; collection never blocks on a busy worker.

use crate::builder::{GraphicsEnvironments, PipelineBuilder};
use crate::cache_key::{ComputePipelineCacheKey, GraphicsPipelineCacheKey};
use crate::compute_pipeline::ComputePipeline;
use crate::environment::GuestEnvironment;
use crate::graphics_pipeline::GraphicsPipeline;
use crossbeam::channel::{unbounded, Sender};
use oc_core::PipelineError;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub enum BuildJob {
    Graphics {
        key: GraphicsPipelineCacheKey,
        envs: Box<GraphicsEnvironments>,
    },
    Compute {
        key: ComputePipelineCacheKey,
        env: Box<GuestEnvironment>,
    },
}

pub enum BuildResult {
    Graphics {
        key: GraphicsPipelineCacheKey,
        result: Result<GraphicsPipeline, PipelineError>,
    },
    Compute {
        key: ComputePipelineCacheKey,
        result: Result<ComputePipeline, PipelineError>,
    },
}

#[derive(Default)]
struct Shared {
    inbox: Mutex<Vec<BuildResult>>,
    /// Jobs queued or running
    pending: Mutex<usize>,
    idle: Condvar,
}

pub struct PipelineWorker {
    sender: Option<Sender<BuildJob>>,
    threads: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl PipelineWorker {
    pub fn new(builder: Arc<PipelineBuilder>, num_threads: u32) -> Result<Self, PipelineError> {
        let (sender, receiver) = unbounded::<BuildJob>();
        let shared = Arc::new(Shared::default());

        let mut threads = Vec::new();
        for index in 0..num_threads.max(1) {
            let receiver = receiver.clone();
            let builder = builder.clone();
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("ShaderWorker{}", index))
                .spawn(move || {
                    for job in receiver.iter() {
                        let result = run_guarded(&builder, job);
                        shared.inbox.lock().push(result);

                        let mut pending = shared.pending.lock();
                        *pending -= 1;
                        if *pending == 0 {
                            shared.idle.notify_all();
                        }
                    }
                })?;
            threads.push(handle);
        }
        tracing::info!("PipelineWorker: started {} threads", threads.len());

        Ok(Self {
            sender: Some(sender),
            threads,
            shared,
        })
    }

    /// Queue a job; returns false when the workers are gone
    pub fn queue(&self, job: BuildJob) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        *self.shared.pending.lock() += 1;
        if sender.send(job).is_err() {
            *self.shared.pending.lock() -= 1;
            return false;
        }
        true
    }

    /// Take finished builds, or nothing if a worker is posting right now
    pub fn drain(&self) -> Vec<BuildResult> {
        match self.shared.inbox.try_lock() {
            Some(mut inbox) => std::mem::take(&mut *inbox),
            None => Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        *self.shared.pending.lock()
    }

    /// Block until every queued job has finished
    pub fn wait_idle(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        // Closing the queue ends the worker loops
        self.sender = None;
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("PipelineWorker: worker thread panicked");
            }
        }
    }
}

enum JobKey {
    Graphics(GraphicsPipelineCacheKey),
    Compute(ComputePipelineCacheKey),
}

impl JobKey {
    fn of(job: &BuildJob) -> Self {
        match job {
            BuildJob::Graphics { key, .. } => JobKey::Graphics(*key),
            BuildJob::Compute { key, .. } => JobKey::Compute(*key),
        }
    }

    fn failed(self, error: PipelineError) -> BuildResult {
        match self {
            JobKey::Graphics(key) => BuildResult::Graphics {
                key,
                result: Err(error),
            },
            JobKey::Compute(key) => BuildResult::Compute {
                key,
                result: Err(error),
            },
        }
    }
}

/// Run a job; a panic becomes a failed result for its key
fn run_guarded(builder: &PipelineBuilder, job: BuildJob) -> BuildResult {
    let key = JobKey::of(&job);
    match panic::catch_unwind(AssertUnwindSafe(|| run_job(builder, job))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("PipelineWorker: build panicked: {}", message);
            key.failed(PipelineError::BuildPanicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_job(builder: &PipelineBuilder, job: BuildJob) -> BuildResult {
    match job {
        BuildJob::Graphics { key, mut envs } => BuildResult::Graphics {
            key,
            result: builder.build_graphics(&key, &mut envs),
        },
        BuildJob::Compute { key, mut env } => BuildResult::Compute {
            key,
            result: builder.build_compute(&key, &mut env),
        },
    }
}
