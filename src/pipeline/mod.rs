//! Swap step execution
//!
//! Runs individual swap steps through the chain scheduler and decides what
//! the swap state machine should do next: finish, requeue, refund or fail.

pub mod executor;

pub use executor::{StepDisposition, StepExecutor, SwapStep};
