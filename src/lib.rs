//! Delivery appointment engine for a single retail warehouse: capacity
//! shifts declare available work-minutes, forklifts and docks; bookings are
//! checked minute-by-minute against committed usage before they commit.

pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod timezone;
