//! Point-to-point replies addressed to a single requester.

mod ack;

pub use ack::AckResponse;
