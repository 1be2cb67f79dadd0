//! Exam room assignment engine.
//!
//! Groups scheduled exams into time-slot batches, normalizes a room
//! catalog, and assigns rooms so that every batch fits its rooms' capacity
//! and availability and no room is double-booked across overlapping
//! batches. Two strategies share the same hard constraints: an ILP model
//! solved by an external MILP backend (HiGHS via `good_lp`), and a
//! deterministic greedy fallback that needs no solver.

pub mod apply;
pub mod builder;
pub mod catalog;
pub mod data;
pub mod error;
pub mod greedy;
pub mod grouping;
pub mod inventory;
pub mod model;
pub mod pipeline;
pub mod server;
