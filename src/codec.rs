//! Message codec
//!
//! Newline-delimited JSON: one structured message is one JSON object on a
//! single line. Blank lines are skipped, `\r\n` is accepted.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::CodecError;
use crate::message::StructuredMessage;

/// Longest accepted line, excluding the terminator
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Read and decode one complete structured message
///
/// Waits until a full line is available. EOF at any point, including in
/// the middle of a line, is reported as [`CodecError::Closed`].
pub async fn read_message<R>(reader: &mut R) -> Result<StructuredMessage, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        // +2 leaves room for "\r\n" on a line of exactly MAX_MESSAGE_LEN bytes.
        let limit = (MAX_MESSAGE_LEN + 2) as u64;
        let bytes = (&mut *reader).take(limit).read_line(&mut line).await?;
        if bytes == 0 {
            return Err(CodecError::Closed);
        }

        if !line.ends_with('\n') {
            if bytes as u64 >= limit {
                return Err(CodecError::TooLarge {
                    limit: MAX_MESSAGE_LEN,
                });
            }
            return Err(CodecError::Closed);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.len() > MAX_MESSAGE_LEN {
            return Err(CodecError::TooLarge {
                limit: MAX_MESSAGE_LEN,
            });
        }

        return match serde_json::from_str::<Value>(trimmed)? {
            Value::Object(fields) => Ok(fields),
            other => Err(CodecError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        };
    }
}

/// Encode and send one message
///
/// The whole line is written with a single `write_all` and flushed so the
/// peer never sees a partial message from us.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncWriteExt, BufReader};

    use super::*;
    use crate::message::ServerMessage;

    #[tokio::test]
    async fn test_write_then_read_object() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = BufReader::new(reader);

        write_message(&mut writer, &ServerMessage::OkResponse)
            .await
            .unwrap();
        let fields = read_message(&mut reader).await.unwrap();

        assert_eq!(Value::Object(fields), json!({"response": 200}));
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = BufReader::new(reader);

        writer
            .write_all(b"\r\n\n{\"action\":\"presence\"}\r\n")
            .await
            .unwrap();
        let fields = read_message(&mut reader).await.unwrap();

        assert_eq!(fields.get("action"), Some(&json!("presence")));
    }

    #[tokio::test]
    async fn test_two_messages_in_one_write() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = BufReader::new(reader);

        writer.write_all(b"{\"n\":1}\n{\"n\":2}\n").await.unwrap();

        let first = read_message(&mut reader).await.unwrap();
        let second = read_message(&mut reader).await.unwrap();
        assert_eq!(first.get("n"), Some(&json!(1)));
        assert_eq!(second.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let (writer, reader) = tokio::io::duplex(64);
        let mut reader = BufReader::new(reader);
        drop(writer);

        let result = read_message(&mut reader).await;
        assert!(matches!(result, Err(CodecError::Closed)));
    }

    #[tokio::test]
    async fn test_eof_mid_message_is_closed() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut reader = BufReader::new(reader);
        writer.write_all(b"{\"action\":").await.unwrap();
        drop(writer);

        let result = read_message(&mut reader).await;
        assert!(matches!(result, Err(CodecError::Closed)));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut reader = BufReader::new(reader);
        writer.write_all(b"hello there\n").await.unwrap();

        let result = read_message(&mut reader).await;
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_non_object_is_malformed() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut reader = BufReader::new(reader);
        writer.write_all(b"[1, 2, 3]\n").await.unwrap();

        let result = read_message(&mut reader).await;
        match result {
            Err(CodecError::Malformed(reason)) => assert!(reason.contains("an array")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let (mut writer, reader) = tokio::io::duplex(MAX_MESSAGE_LEN * 2);
        let mut reader = BufReader::new(reader);
        let big = vec![b'x'; MAX_MESSAGE_LEN + 10];

        let write = tokio::spawn(async move {
            let _ = writer.write_all(&big).await;
            let _ = writer.write_all(b"\n").await;
            writer
        });

        let result = read_message(&mut reader).await;
        assert!(matches!(result, Err(CodecError::TooLarge { .. })));
        let _ = write.await;
    }
}
