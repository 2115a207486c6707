pub mod cross_planner;
pub mod graph;
pub mod toposort;
