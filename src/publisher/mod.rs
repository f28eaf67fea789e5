//! Periodic state publisher
//!
//! - [`toggle`] - The ON/OFF toggle and its labels
//! - [`lifecycle`] - The publisher actor driving a [`Transport`](crate::transport::Transport)

pub mod lifecycle;
pub mod toggle;

pub use lifecycle::{PeriodicPublisher, PublishStats};
pub use toggle::{SwitchState, ToggleState};
