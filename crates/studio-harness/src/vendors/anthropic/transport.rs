//! Server-sent-event framing and Anthropic Messages event mapping.

use crate::ProviderId;
use crate::content::Usage;
use crate::errors::ProviderError;
use crate::provider::ProviderEvent;

/// One `event:`/`data:` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Splits a byte stream into frames. Bytes are buffered until a blank line,
/// so multi-byte characters split across network chunks decode intact.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, delimiter_len)) = frame_boundary(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end + delimiter_len).take(end).collect();
            frames.extend(parse_block(&block));
        }
        frames
    }

    /// Parses whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_block(&rest)
    }
}

// Position and length of the first blank-line delimiter.
fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|i| {
        let tail = &buf[i..];
        if tail.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if tail.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

fn parse_block(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}

/// Maps one frame to provider events.
///
/// Accepts both the raw Messages API stream and the slimmer relay form where
/// deltas carry only `{"delta":{"text":..}}` and errors are plain strings.
pub(crate) fn map_anthropic_frame(
    provider: &ProviderId,
    frame: &SseFrame,
) -> Result<Vec<ProviderEvent>, ProviderError> {
    let data = frame.data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::protocol(provider.clone(), format!("invalid SSE JSON frame: {e}"))
    })?;
    let kind = value
        .get("type")
        .and_then(|v| v.as_str())
        .or(frame.event.as_deref())
        .unwrap_or_default();
    map_anthropic_event(provider, kind, &value)
}

pub(crate) fn map_anthropic_event(
    provider: &ProviderId,
    kind: &str,
    value: &serde_json::Value,
) -> Result<Vec<ProviderEvent>, ProviderError> {
    let events = match kind {
        "content_block_delta" => {
            let delta = value.get("delta");
            let delta_type = delta.and_then(|d| d.get("type")).and_then(|t| t.as_str());
            let text = delta.and_then(|d| d.get("text")).and_then(|t| t.as_str());
            match (delta_type, text) {
                (None | Some("text_delta"), Some(text)) => vec![ProviderEvent::TextDelta {
                    text: text.to_string(),
                }],
                _ => Vec::new(),
            }
        }
        "message_start" => {
            let usage = value
                .get("message")
                .and_then(|m| m.get("usage"))
                .and_then(parse_usage);
            usage
                .map(|usage| ProviderEvent::MessageDelta {
                    finish_reason: None,
                    usage: Some(usage),
                })
                .into_iter()
                .collect()
        }
        "message_delta" => {
            let finish_reason = value
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|r| r.as_str())
                .map(ToOwned::to_owned);
            let usage = value.get("usage").and_then(parse_usage);
            vec![ProviderEvent::MessageDelta {
                finish_reason,
                usage,
            }]
        }
        "message_stop" => vec![ProviderEvent::Completed],
        "error" => {
            return Err(ProviderError::provider(
                provider.clone(),
                error_message(value).unwrap_or("Streaming failed"),
                None,
            ));
        }
        _ => Vec::new(),
    };
    Ok(events)
}

fn parse_usage(value: &serde_json::Value) -> Option<Usage> {
    let count = |key: &str| value.get(key).and_then(|v| v.as_u64());
    let input_tokens = count("input_tokens");
    let output_tokens = count("output_tokens");
    if input_tokens.is_none() && output_tokens.is_none() {
        return None;
    }
    Some(Usage {
        input_tokens: input_tokens.unwrap_or(0),
        output_tokens: output_tokens.unwrap_or(0),
    })
}

/// Message of an `error` event or error response body:
/// `{"error":{"message":..}}`, `{"error":".."}` or `{"message":..}`.
pub(crate) fn error_message(value: &serde_json::Value) -> Option<&str> {
    let error = value.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| error.and_then(|e| e.as_str()))
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderId {
        ProviderId::new("anthropic")
    }

    fn map(data: serde_json::Value) -> Result<Vec<ProviderEvent>, ProviderError> {
        map_anthropic_frame(
            &provider(),
            &SseFrame {
                event: None,
                data: data.to_string(),
            },
        )
    }

    #[test]
    fn frames_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        assert!(
            decoder
                .push_chunk(b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel")
                .is_empty()
        );
        let frames = decoder.push_chunk(b"lo\"}}\n\nevent: ping\ndata: {\"type\": \"ping\"}\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(
            map_anthropic_frame(&provider(), &frames[0]).unwrap(),
            vec![ProviderEvent::TextDelta {
                text: "Hello".into()
            }]
        );
        assert!(map_anthropic_frame(&provider(), &frames[1]).unwrap().is_empty());
    }

    #[test]
    fn crlf_delimiters_and_comments() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(b": keep-alive\r\n\r\ndata: {\"type\":\"message_stop\"}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"type\":\"message_stop\"}");
    }

    #[test]
    fn multibyte_text_split_across_chunks() {
        let payload = "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"caf\u{e9}\"}}\n\n";
        let bytes = payload.as_bytes();
        let split = payload.find('\u{e9}').unwrap() + 1;
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(&bytes[..split]).is_empty());
        let frames = decoder.push_chunk(&bytes[split..]);
        assert_eq!(
            map_anthropic_frame(&provider(), &frames[0]).unwrap(),
            vec![ProviderEvent::TextDelta {
                text: "caf\u{e9}".into()
            }]
        );
    }

    #[test]
    fn trailing_frame_without_blank_line_is_recovered() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"data: {\"type\":\"message_stop\"}").is_empty());
        let frame = decoder.finish().expect("frame");
        assert_eq!(
            map_anthropic_frame(&provider(), &frame).unwrap(),
            vec![ProviderEvent::Completed]
        );
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn relay_delta_without_type_is_text() {
        let events = map(serde_json::json!({"type":"content_block_delta","delta":{"text":"Hi"}})).unwrap();
        assert_eq!(events, vec![ProviderEvent::TextDelta { text: "Hi".into() }]);
    }

    #[test]
    fn tool_input_deltas_are_ignored() {
        let events = map(serde_json::json!({
            "type":"content_block_delta",
            "delta":{"type":"input_json_delta","partial_json":"{\"a\""}
        }))
        .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn usage_and_stop_reason_are_reported() {
        let start = map(serde_json::json!({
            "type":"message_start",
            "message":{"id":"msg_1","usage":{"input_tokens":25,"output_tokens":1}}
        }))
        .unwrap();
        assert_eq!(
            start,
            vec![ProviderEvent::MessageDelta {
                finish_reason: None,
                usage: Some(Usage {
                    input_tokens: 25,
                    output_tokens: 1
                }),
            }]
        );

        let delta = map(serde_json::json!({
            "type":"message_delta",
            "delta":{"stop_reason":"end_turn","stop_sequence":null},
            "usage":{"output_tokens":15}
        }))
        .unwrap();
        assert_eq!(
            delta,
            vec![ProviderEvent::MessageDelta {
                finish_reason: Some("end_turn".into()),
                usage: Some(Usage {
                    input_tokens: 0,
                    output_tokens: 15
                }),
            }]
        );
    }

    #[test]
    fn message_stop_completes_and_done_marker_is_ignored() {
        assert_eq!(
            map(serde_json::json!({"type":"message_stop"})).unwrap(),
            vec![ProviderEvent::Completed]
        );
        let done = SseFrame {
            event: None,
            data: "[DONE]".into(),
        };
        assert!(map_anthropic_frame(&provider(), &done).unwrap().is_empty());
    }

    #[test]
    fn event_name_is_used_when_type_is_missing() {
        let frame = SseFrame {
            event: Some("message_stop".into()),
            data: "{}".into(),
        };
        assert_eq!(
            map_anthropic_frame(&provider(), &frame).unwrap(),
            vec![ProviderEvent::Completed]
        );
    }

    #[test]
    fn error_object_and_string_forms() {
        let err = map(serde_json::json!({
            "type":"error",
            "error":{"type":"overloaded_error","message":"Overloaded"}
        }))
        .unwrap_err();
        assert_eq!(err.message(), "Overloaded");

        let err = map(serde_json::json!({"type":"error","error":"Streaming failed: quota"})).unwrap_err();
        assert_eq!(err.message(), "Streaming failed: quota");
    }

    #[test]
    fn malformed_json_is_a_protocol_error() {
        let frame = SseFrame {
            event: None,
            data: "{not json".into(),
        };
        assert!(matches!(
            map_anthropic_frame(&provider(), &frame),
            Err(ProviderError::Protocol { .. })
        ));
    }
}
