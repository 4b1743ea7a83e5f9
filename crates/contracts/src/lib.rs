//! # Contracts
//!
//! Types and traits shared by every ledsync crate. This crate depends on no
//! other workspace crate.
//!
//! ## Time Model
//! - Every view keeps its own clock (seconds, f64), derived from sample index
//!   and nominal sample rate
//! - Alignments map a view clock into the reference view clock:
//!   `t_ref = scale * t_view + offset`

mod alignment;
mod blueprint;
mod error;
mod frame;
mod pulse;
mod signal_source;
mod sink;
mod sync_engine_config;
mod view_id;

pub use alignment::*;
pub use blueprint::*;
pub use error::*;
pub use frame::*;
pub use pulse::*;
pub use signal_source::{FrameSource, SignalSource};
pub use sink::*;
pub use sync_engine_config::*;
pub use view_id::ViewId;
