//! Translates an IR function body into its SSA companion form
//! (`spec.md` §4.4).

pub mod frame;
pub mod lift;

pub use frame::FrameTracker;
pub use lift::lift;
