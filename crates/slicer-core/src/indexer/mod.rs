pub mod callgraph;
pub mod filesystem;
pub mod hierarchy;
pub mod parser;
pub mod pipeline;
pub mod points;
pub mod resolver;
pub mod traversal;
