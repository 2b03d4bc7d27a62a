/// Render layer: figure drawing, output naming, collision handling, and the
/// plain-text sidecar written next to every plot.
pub mod figure;
pub mod naming;
pub mod registry;
pub mod style;
pub mod summary;
