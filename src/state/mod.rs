//! Runtime state for request interception
//!
//! # Components
//!
//! - `AppState`: the provider list, rewrite engine, frame tree and storage
//!   handle shared by the interceptor and background tasks
//! - `LogBuffer`: bounded rewrite log with batched persistence
//! - `Counters`: request counters

mod app;
mod counters;
mod log_buffer;

pub use app::{
    AppState, InterceptRequest, InterceptResponse, NoopNavigator, TabNavigator, MAIN_FRAME,
    SUB_FRAME,
};
pub use counters::Counters;
pub use log_buffer::LogBuffer;
