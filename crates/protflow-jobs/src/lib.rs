//! protflow-jobs: the job orchestration engine.
//!
//! A natural-language instruction becomes a batch of typed [`job::Job`]s
//! ([`planner`]), linked by single-predecessor data dependencies ([`dependency`]).
//! Confirmed jobs run on a bounded pool ([`executor`]) that drives the lifecycle
//! held by the [`registry::JobRegistry`] and routes each job through the
//! [`dispatcher::Dispatcher`] to a [`adapter::ToolAdapter`].

pub mod adapter;
pub mod adapters;
pub mod dependency;
pub mod dispatcher;
pub mod executor;
pub mod job;
pub mod operation;
pub mod planner;
pub mod registry;

pub use adapter::{AdapterKey, AdapterRegistry, ToolAdapter};
pub use dispatcher::Dispatcher;
pub use executor::JobExecutor;
pub use job::{Job, JobEvent, JobStatus, JobView};
pub use operation::{Operation, SimilarityBackend, StructureModel};
pub use planner::{plan, PlannedBatch};
pub use registry::{JobRegistry, NewJob};
