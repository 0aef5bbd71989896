use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SseEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
}

impl SseEvent {
    /// A bare data-only frame, the shape every status event uses.
    pub fn data_only(data: String) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buffer = BytesMut::new();

        if let Some(id) = &self.id {
            buffer.put_slice(b"id: ");
            buffer.put_slice(id.as_bytes());
            buffer.put_u8(b'\n');
        }

        if let Some(event) = &self.event {
            buffer.put_slice(b"event: ");
            buffer.put_slice(event.as_bytes());
            buffer.put_u8(b'\n');
        }

        if let Some(retry) = self.retry {
            buffer.put_slice(b"retry: ");
            buffer.put_slice(retry.to_string().as_bytes());
            buffer.put_u8(b'\n');
        }

        if !self.data.is_empty() {
            for line in self.data.split('\n') {
                buffer.put_slice(b"data: ");
                buffer.put_slice(line.as_bytes());
                buffer.put_u8(b'\n');
            }
        }

        buffer.put_u8(b'\n');
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_to_bytes() {
        let event = SseEvent {
            id: Some("1".to_string()),
            event: Some("message".to_string()),
            data: "hello\nworld".to_string(),
            retry: Some(123),
        };

        let expected = "id: 1\nevent: message\nretry: 123\ndata: hello\ndata: world\n\n";
        assert_eq!(event.to_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_data_only_frame() {
        let event = SseEvent::data_only("{\"status\":\"pending\"}".to_string());
        let expected = "data: {\"status\":\"pending\"}\n\n";
        assert_eq!(event.to_bytes(), expected.as_bytes());
    }
}
