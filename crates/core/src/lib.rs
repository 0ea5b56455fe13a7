pub mod action;
pub mod event;
pub mod normalize;
pub mod rewrite;
pub mod run;
pub mod timeline;

pub use event::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
