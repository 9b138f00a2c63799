//! Application Layer
//!
//! Contains the ingestion pipeline, the business services that feed it,
//! and the data transfer objects (DTOs) of the HTTP surface.

pub mod dto;
pub mod pipeline;
pub mod services;
