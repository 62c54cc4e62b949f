//! # DTS Orchestration
//!
//! The transfer orchestration engine of the Data Transfer Service: a
//! long-running state machine that resolves file ids into descriptors,
//! coordinates staging at source databases, drives endpoint-to-endpoint
//! bulk transfers, delivers a Frictionless manifest at the destination, and
//! answers status queries until records age out.
//!
//! The public entry point is [`orchestration::TransferService`].

pub mod orchestration;

pub use orchestration::TransferService;
