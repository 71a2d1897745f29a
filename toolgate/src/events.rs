//! SSE encoding for stream events.
//!
//! Every event carries the caller's `stage_id` so multiplexed consumers can
//! correlate frames. Chunk-bearing events get sequence ids of the form
//! `{stage_id}-chunk-{n}`; terminal events use the conventions of the
//! upstream format (`done` carries the final count, `cancel`/`error` use 0).

use axum::response::sse::Event;
use serde::Serialize;

use crate::protocol::{CancelPayload, ChunkPayload, ContentPayload, DonePayload, ErrorPayload};

#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Raw upstream chunk, forwarded verbatim (stage one of the toolchain,
    /// or the whole of a plain streamed chat).
    Chunk { seq: u64, payload: ChunkPayload },
    /// Synthesized text delta (stage two of the toolchain).
    Content { seq: u64, payload: ContentPayload },
    Done { seq: u64, payload: DonePayload },
    Cancel(CancelPayload),
    Error(ErrorPayload),
}

impl StreamEvent {
    pub fn stage_id(&self) -> &str {
        match self {
            StreamEvent::Chunk { payload, .. } => &payload.stage_id,
            StreamEvent::Content { payload, .. } => &payload.stage_id,
            StreamEvent::Done { payload, .. } => &payload.stage_id,
            StreamEvent::Cancel(payload) => &payload.stage_id,
            StreamEvent::Error(payload) => &payload.stage_id,
        }
    }

    pub fn into_sse(self) -> Event {
        match self {
            StreamEvent::Chunk { seq, payload } => {
                let id = format!("{}-chunk-{}", payload.stage_id, seq);
                encode("chat_completion_chunk", &id, &payload)
            }
            StreamEvent::Content { seq, payload } => {
                let id = format!("{}-chunk-{}", payload.stage_id, seq);
                encode("content", &id, &payload)
            }
            StreamEvent::Done { seq, payload } => encode("done", &seq.to_string(), &payload),
            StreamEvent::Cancel(payload) => encode("cancel", "0", &payload),
            StreamEvent::Error(payload) => encode("error", "0", &payload),
        }
    }
}

fn encode<T: Serialize>(event: &str, id: &str, payload: &T) -> Event {
    match Event::default().event(event).id(id).json_data(payload) {
        Ok(ev) => ev,
        Err(e) => {
            println!("[StreamEvent] Failed to encode '{}' payload: {}", event, e);
            Event::default().event("error").id("0").data("{}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_id_is_reachable_on_every_variant() {
        let ev = StreamEvent::Chunk {
            seq: 3,
            payload: ChunkPayload {
                stage_id: "s1".to_string(),
                chunk: json!({}),
            },
        };
        assert_eq!(ev.stage_id(), "s1");

        let ev = StreamEvent::Cancel(CancelPayload {
            stage_id: "s2".to_string(),
        });
        assert_eq!(ev.stage_id(), "s2");
    }
}
