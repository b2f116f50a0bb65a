//! UI module for build output
//!
//! Step banners, cache-hit notices and streamed container output go to
//! stdout with `console` styling; image pulls get an `indicatif` spinner in
//! interactive terminals and plain lines in CI.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    built, cache_hit, committed, output_begin, output_end, output_line, step, success, tagged,
    warn_hint,
};
pub use progress::PullProgress;
