//! Supervised Strategy
//!
//! Each collector lives on its own worker thread. The engine sends one job
//! at a time and waits for the reply with `recv_timeout`, so callbacks
//! still run in stream order while a hung callback cannot stall the pass.
//!
//! A thread cannot be killed: on timeout the worker is detached and its
//! channels dropped. The hung callback keeps its thread until it returns,
//! after which the worker finds its channel closed and exits. Bounding that
//! residue is left to the process supervisor.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;

use super::Offer;
use crate::collect::Collector;
use crate::error::DispatchError;
use crate::fault::FaultKind;
use crate::index::Document;

enum Job {
    Token { position: u32, ignore_mask: u8 },
    Finalize,
}

enum Reply {
    Token(Offer),
    Finalized(Result<Value, FaultKind>),
}

pub struct SupervisedRunner {
    name: String,
    jobs: Sender<Job>,
    replies: Receiver<Reply>,
    budget: Duration,
    handle: Option<JoinHandle<()>>,
}

impl SupervisedRunner {
    pub(crate) fn spawn(
        name: String,
        collector: Box<dyn Collector>,
        document: Arc<Document>,
        budget: Duration,
    ) -> Result<Self, DispatchError> {
        let (job_tx, job_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(format!("collector-{}", name))
            .spawn(move || worker_loop(worker_name, collector, document, job_rx, reply_tx))
            .map_err(|source| DispatchError::WorkerSpawn {
                collector: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            jobs: job_tx,
            replies: reply_rx,
            budget,
            handle: Some(handle),
        })
    }

    pub(crate) fn offer(&mut self, position: u32, ignore_mask: u8) -> Offer {
        match self.request(Job::Token {
            position,
            ignore_mask,
        })? {
            Reply::Token(offer) => offer,
            Reply::Finalized(_) => Err(FaultKind::Error {
                message: "worker answered out of turn".to_string(),
            }),
        }
    }

    pub(crate) fn finish(mut self) -> Result<Value, FaultKind> {
        let reply = self.request(Job::Finalize)?;
        if let Some(handle) = self.handle.take() {
            // the worker returns right after replying to Finalize
            if handle.join().is_err() {
                tracing::debug!(collector = %self.name, "worker exited abnormally");
            }
        }
        match reply {
            Reply::Finalized(result) => result,
            Reply::Token(_) => Err(FaultKind::Error {
                message: "worker answered out of turn".to_string(),
            }),
        }
    }

    /// Send one job and wait for its reply within the budget
    fn request(&mut self, job: Job) -> Result<Reply, FaultKind> {
        if self.jobs.send(job).is_err() {
            return Err(worker_gone());
        }
        match self.replies.recv_timeout(self.budget) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                // detach; dropping the runner closes the job channel
                self.handle.take();
                Err(FaultKind::Timeout {
                    budget_ms: self.budget.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(worker_gone()),
        }
    }
}

fn worker_gone() -> FaultKind {
    FaultKind::Panic {
        message: "collector worker exited".to_string(),
    }
}

fn worker_loop(
    name: String,
    mut collector: Box<dyn Collector>,
    document: Arc<Document>,
    jobs: Receiver<Job>,
    replies: Sender<Reply>,
) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Token {
                position,
                ignore_mask,
            } => {
                let offer = super::invoke(
                    collector.as_mut(),
                    &document,
                    &name,
                    position,
                    ignore_mask,
                );
                if replies.send(Reply::Token(offer)).is_err() {
                    return;
                }
            }
            Job::Finalize => {
                let result = super::finalize(collector.as_mut());
                let _ = replies.send(Reply::Finalized(result));
                return;
            }
        }
    }
}
