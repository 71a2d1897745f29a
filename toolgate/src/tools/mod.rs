//! Built-in tools exposed through the registry.

pub mod advanced_math;
pub mod tree_gen;

pub use advanced_math::AdvancedMathTool;
pub use tree_gen::TreeGenTool;
