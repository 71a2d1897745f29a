pub mod backend;
pub mod dispatch;
pub mod events;
pub mod model_routes;
pub mod protocol;
pub mod routes;
pub mod stream_assembly;
pub mod tool_parsing;
pub mod tool_registry;
pub mod toolchain;
pub mod tools;

#[cfg(test)]
mod tests;
