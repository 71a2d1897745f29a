//! Reassembly of fragmented streaming tool calls.
//!
//! In the OpenAI streaming format, tool calls arrive incrementally:
//! - the first fragment for an index carries `id` and `function.name`
//! - later fragments carry `function.arguments` text to append
//! - concurrent calls are distinguished by their `index` field, and fragments
//!   for different indices may interleave arbitrarily

use serde_json::Value;
use std::collections::BTreeMap;

use crate::protocol::{ToolCall, ToolCallMap};

/// Accumulator for index-addressed streaming tool call fragments.
#[derive(Debug, Default)]
pub struct ChunkAggregator {
    /// Map of index -> (id, name, accumulated arguments).
    calls: BTreeMap<usize, (String, String, String)>,
}

impl ChunkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw streaming chunk. Chunks without a `delta.tool_calls`
    /// array are ignored.
    pub fn add_chunk(&mut self, chunk: &Value) {
        if let Some(tool_calls) = chunk
            .pointer("/choices/0/delta/tool_calls")
            .and_then(|v| v.as_array())
        {
            self.add_fragments(tool_calls);
        }
    }

    /// Feed a `delta.tool_calls` fragment array directly.
    pub fn add_fragments(&mut self, fragments: &[Value]) {
        for fragment in fragments {
            let index = fragment["index"].as_u64().unwrap_or(0) as usize;
            let entry = self
                .calls
                .entry(index)
                .or_insert_with(|| (String::new(), String::new(), String::new()));

            // id/name are fixed at first occurrence; later fragments for
            // the same index must not rewrite them
            if entry.0.is_empty() {
                if let Some(id) = fragment["id"].as_str() {
                    entry.0 = id.to_string();
                }
            }
            if entry.1.is_empty() {
                if let Some(name) = fragment["function"]["name"].as_str() {
                    entry.1 = name.to_string();
                }
            }
            // Arguments text is appended across fragments
            if let Some(args) = fragment["function"]["arguments"].as_str() {
                entry.2.push_str(args);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Produce completed calls ordered by stream index. Entries that never
    /// received a name are dropped as incomplete.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|(_, (_, name, _))| !name.is_empty())
            .map(|(_, (id, name, arguments))| ToolCall {
                id,
                name,
                arguments,
            })
            .collect()
    }
}

/// Extract the text delta from a streaming chunk, if any.
pub fn extract_content_delta(chunk: &Value) -> Option<String> {
    chunk
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Key completed calls by tool name. Duplicate names are last-write-wins,
/// matching the shape downstream validation and execution expect.
pub fn map_by_name(calls: Vec<ToolCall>) -> ToolCallMap {
    let mut map = ToolCallMap::new();
    for call in calls {
        map.insert(call.name.clone(), call);
    }
    map
}
