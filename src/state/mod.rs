//! State module for tracking mirror progress
//!
//! # Components
//!
//! - `FrontierState`: persisted lifecycle of a frontier entry (pending, done, failed)
//! - `PageStage`: in-memory stage of the page currently being processed

mod frontier_state;
mod page_stage;

pub use frontier_state::FrontierState;
pub use page_stage::PageStage;
