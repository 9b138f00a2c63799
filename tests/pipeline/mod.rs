//! Ingestion pipeline tests over in-process backends

mod dispatcher_tests;
mod reconciler_tests;
mod worker_tests;
