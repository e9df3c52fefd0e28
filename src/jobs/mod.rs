//! Durable job store, in-memory FIFO queue, and the cooperative worker that
//! drains it (spec §4.G–4.I).

pub mod job_queue;
pub mod job_store;
pub mod worker;

pub use job_queue::JobQueue;
pub use job_store::JobStore;
pub use worker::CategorizationWorker;
