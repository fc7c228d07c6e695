//! peerbrief-web: browser front end for the review synthesis workflow.
//!   - Pick a collection run
//!   - Start the external synthesis pipeline and follow its progress
//!   - Browse and export the resulting editorial briefs

pub mod briefs;
pub mod error;
pub mod handlers;
pub mod report;
pub mod router;
pub mod runner;
pub mod sse;
pub mod state;
