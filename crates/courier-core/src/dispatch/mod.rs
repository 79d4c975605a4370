//! Batched outbound message delivery.

mod engine;
mod pacing;

pub use engine::{
    DispatchError, DispatchFailure, DispatchReport, Dispatcher, DISPATCH_PROGRESS_TOPIC,
};
pub use pacing::PacingPolicy;
