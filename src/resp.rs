use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest bulk string payload accepted from the wire.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest element count accepted for an array header.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;
/// Longest type line (status text or length header) accepted before its CRLF.
const MAX_LINE_LEN: usize = 64 * 1024;

/// A RESP2 value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n  or  $-1\r\n (null)
    BulkString(Option<Vec<u8>>),
    /// *2\r\n...  or  *-1\r\n (null)
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Serialize this value to RESP bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Write RESP bytes into the given buffer.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.push(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.push(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(None) => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            RespValue::BulkString(Some(data)) => {
                buf.push(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Array(None) => {
                buf.extend_from_slice(b"*-1\r\n");
            }
            RespValue::Array(Some(items)) => {
                buf.push(b'*');
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }

    /// Try to interpret this value as a string (for command parsing).
    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(Some(data)) => Some(data),
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Convert to a UTF-8 string, if possible.
    pub fn to_string_lossy(&self) -> Option<String> {
        self.as_str()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// Streaming RESP parser.
///
/// Handles partial reads: call `parse()` again as more data arrives.
/// Returns `Ok(Some(value))` when a complete value is parsed,
/// `Ok(None)` when more data is needed.
///
/// Parsing works on offsets into the borrowed buffer; nothing is copied or
/// consumed until a whole value, nested elements included, is available.
pub struct RespParser;

type Parsed = Result<Option<(RespValue, usize)>, RespError>;

impl RespParser {
    /// Try to parse a complete RESP value from the buffer.
    /// On success, consumes the parsed bytes from `buf` and returns the value.
    /// Returns `Ok(None)` if the buffer doesn't contain a complete value yet.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match Self::parse_at(buf, 0)? {
            Some((value, next)) => {
                buf.advance(next);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse the value starting at `pos`. On success returns it together with
    /// the offset just past its last byte.
    fn parse_at(buf: &[u8], pos: usize) -> Parsed {
        if pos >= buf.len() {
            return Ok(None);
        }

        match buf[pos] {
            b'+' => Self::parse_simple_string(buf, pos),
            b'-' => Self::parse_error(buf, pos),
            b':' => Self::parse_integer(buf, pos),
            b'$' => Self::parse_bulk_string(buf, pos),
            b'*' => Self::parse_array(buf, pos),
            other => Err(RespError::InvalidByte(other)),
        }
    }

    fn parse_simple_string(buf: &[u8], pos: usize) -> Parsed {
        let Some(end) = find_line_end(buf, pos)? else {
            return Ok(None);
        };
        let s = String::from_utf8_lossy(&buf[pos + 1..end]).into_owned();
        Ok(Some((RespValue::SimpleString(s), end + 2)))
    }

    fn parse_error(buf: &[u8], pos: usize) -> Parsed {
        let Some(end) = find_line_end(buf, pos)? else {
            return Ok(None);
        };
        let s = String::from_utf8_lossy(&buf[pos + 1..end]).into_owned();
        Ok(Some((RespValue::Error(s), end + 2)))
    }

    fn parse_integer(buf: &[u8], pos: usize) -> Parsed {
        let Some(end) = find_line_end(buf, pos)? else {
            return Ok(None);
        };
        let n = parse_length(&buf[pos + 1..end], "invalid integer")?;
        Ok(Some((RespValue::Integer(n), end + 2)))
    }

    fn parse_bulk_string(buf: &[u8], pos: usize) -> Parsed {
        let Some(crlf) = find_line_end(buf, pos)? else {
            return Ok(None);
        };

        let len = parse_length(&buf[pos + 1..crlf], "invalid bulk length")?;

        if len == -1 {
            return Ok(Some((RespValue::BulkString(None), crlf + 2)));
        }

        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(RespError::InvalidData("invalid bulk length".into()));
        }
        let data_start = crlf + 2;
        let data_end = data_start + len as usize;

        // data + trailing \r\n
        if buf.len() < data_end + 2 {
            return Ok(None);
        }

        if buf[data_end] != b'\r' || buf[data_end + 1] != b'\n' {
            return Err(RespError::InvalidData(
                "Missing trailing CRLF after bulk string".into(),
            ));
        }

        let data = buf[data_start..data_end].to_vec();
        Ok(Some((RespValue::BulkString(Some(data)), data_end + 2)))
    }

    fn parse_array(buf: &[u8], pos: usize) -> Parsed {
        let Some(crlf) = find_line_end(buf, pos)? else {
            return Ok(None);
        };

        let len = parse_length(&buf[pos + 1..crlf], "invalid multibulk length")?;

        if len == -1 {
            return Ok(Some((RespValue::Array(None), crlf + 2)));
        }

        if !(0..=MAX_ARRAY_LEN).contains(&len) {
            return Err(RespError::InvalidData("invalid multibulk length".into()));
        }

        let mut next = crlf + 2;
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            match Self::parse_at(buf, next)? {
                Some((val, after)) => {
                    items.push(val);
                    next = after;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(Some(items)), next)))
    }
}

/// Reads whole RESP values off an async byte stream.
///
/// This is the blocking side of the codec: `read_value` waits until one
/// complete value has arrived and leaves any following bytes buffered for
/// the next call.
pub struct RespReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> RespReader<R> {
    pub fn new(inner: R) -> Self {
        RespReader {
            inner,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Read exactly one value.
    ///
    /// `Ok(None)` means the stream ended cleanly between values. A stream that
    /// ends part-way through a value is `RespError::Truncated`.
    pub async fn read_value(&mut self) -> Result<Option<RespValue>, RespError> {
        loop {
            if let Some(value) = RespParser::parse(&mut self.buf)? {
                return Ok(Some(value));
            }
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(RespError::Truncated);
            }
        }
    }
}

fn parse_length(raw: &[u8], what: &str) -> Result<i64, RespError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| RespError::InvalidData(what.to_string()))
}

/// End of the type line that starts at `pos`, i.e. the index of its CRLF.
///
/// Only the first `MAX_LINE_LEN` bytes after the type byte are searched; a
/// longer line without a terminator is rejected instead of buffered.
fn find_line_end(buf: &[u8], pos: usize) -> Result<Option<usize>, RespError> {
    let start = pos + 1;
    let window = buf.len().min(start + MAX_LINE_LEN + 2);
    if let Some(end) = find_crlf_from(&buf[..window], start) {
        return Ok(Some(end));
    }
    if buf.len().saturating_sub(start) > MAX_LINE_LEN + 1 {
        return Err(RespError::InvalidData("line too long".into()));
    }
    Ok(None)
}

/// Find \r\n starting from the given position.
fn find_crlf_from(buf: &[u8], start: usize) -> Option<usize> {
    if buf.len() < start + 2 {
        return None;
    }
    (start..buf.len() - 1).find(|&i| buf[i] == b'\r' && buf[i + 1] == b'\n')
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("unexpected type byte '{}'", *.0 as char)]
    InvalidByte(u8),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("stream ended in the middle of a value")]
    Truncated,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_string() {
        let mut buf = BytesMut::from("+OK\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::SimpleString("OK".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let mut buf = BytesMut::from("-ERR unknown command\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(
            result,
            RespValue::Error("ERR unknown command".to_string())
        );
    }

    #[test]
    fn test_parse_integer() {
        let mut buf = BytesMut::from(":-42\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::Integer(-42));
    }

    #[test]
    fn test_parse_bulk_string() {
        let mut buf = BytesMut::from("$6\r\nfoobar\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::BulkString(Some(b"foobar".to_vec())));
    }

    #[test]
    fn test_parse_bulk_string_with_crlf_inside() {
        let mut buf = BytesMut::from("$4\r\na\r\nb\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::bulk_string(b"a\r\nb".to_vec()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_null_bulk_string() {
        let mut buf = BytesMut::from("$-1\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::BulkString(None));
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        let mut buf = BytesMut::from("$0\r\n\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::BulkString(Some(vec![])));
    }

    #[test]
    fn test_parse_array() {
        let mut buf = BytesMut::from("*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(
            result,
            RespValue::Array(Some(vec![
                RespValue::BulkString(Some(b"foo".to_vec())),
                RespValue::BulkString(Some(b"bar".to_vec())),
            ]))
        );
    }

    #[test]
    fn test_parse_null_and_empty_array() {
        let mut buf = BytesMut::from("*-1\r\n*0\r\n");
        assert_eq!(
            RespParser::parse(&mut buf).unwrap().unwrap(),
            RespValue::Array(None)
        );
        assert_eq!(
            RespParser::parse(&mut buf).unwrap().unwrap(),
            RespValue::Array(Some(vec![]))
        );
    }

    #[test]
    fn test_parse_nested_array() {
        let mut buf = BytesMut::from("*2\r\n*1\r\n:1\r\n*1\r\n$-1\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(
            result,
            RespValue::Array(Some(vec![
                RespValue::Array(Some(vec![RespValue::Integer(1)])),
                RespValue::Array(Some(vec![RespValue::BulkString(None)])),
            ]))
        );
    }

    #[test]
    fn test_parse_partial_data() {
        let mut buf = BytesMut::from("$6\r\nfoo");
        let result = RespParser::parse(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(&buf[..], b"$6\r\nfoo");
    }

    #[test]
    fn test_parse_partial_array_keeps_buffer() {
        let mut buf = BytesMut::from("*2\r\n$3\r\nfoo\r\n$3\r\nba");
        assert!(RespParser::parse(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"*2\r\n$3\r\nfoo\r\n$3\r\nba");
        buf.extend_from_slice(b"r\r\n+next\r\n");
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(
            result,
            RespValue::array(vec![
                RespValue::bulk_string(b"foo".to_vec()),
                RespValue::bulk_string(b"bar".to_vec()),
            ])
        );
        assert_eq!(&buf[..], b"+next\r\n");
    }

    #[test]
    fn test_parse_rejects_unknown_type_byte() {
        let mut buf = BytesMut::from("PING\r\n");
        assert!(matches!(
            RespParser::parse(&mut buf),
            Err(RespError::InvalidByte(b'P'))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        for input in ["$abc\r\n", "$-2\r\n", "*-5\r\n", "$3\r\nfoobar\r\n"] {
            let mut buf = BytesMut::from(input);
            assert!(
                matches!(RespParser::parse(&mut buf), Err(RespError::InvalidData(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_unterminated_long_lines() {
        for prefix in ["*", "$", "+", "-", ":"] {
            let mut buf = BytesMut::from(prefix);
            buf.extend_from_slice(&vec![b'1'; MAX_LINE_LEN + 2]);
            assert!(
                matches!(RespParser::parse(&mut buf), Err(RespError::InvalidData(_))),
                "{prefix:?} line should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_accepts_line_at_limit() {
        let text = "x".repeat(MAX_LINE_LEN);
        let mut buf = BytesMut::from(format!("+{text}").as_str());
        assert!(RespParser::parse(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\r\n");
        assert_eq!(
            RespParser::parse(&mut buf).unwrap(),
            Some(RespValue::simple_string(text))
        );
    }

    #[test]
    fn test_serialize_simple_string() {
        let val = RespValue::SimpleString("OK".to_string());
        assert_eq!(val.serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_serialize_error() {
        let val = RespValue::Error("ERR bad".to_string());
        assert_eq!(val.serialize(), b"-ERR bad\r\n");
    }

    #[test]
    fn test_serialize_bulk_string() {
        let val = RespValue::BulkString(Some(b"hello".to_vec()));
        assert_eq!(val.serialize(), b"$5\r\nhello\r\n");
        assert_eq!(RespValue::null_bulk_string().serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_serialize_array() {
        let val = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(b"foo".to_vec())),
            RespValue::Integer(42),
        ]));
        assert_eq!(val.serialize(), b"*2\r\n$3\r\nfoo\r\n:42\r\n");
        assert_eq!(RespValue::null_array().serialize(), b"*-1\r\n");
    }

    #[test]
    fn test_round_trip() {
        let values = vec![
            RespValue::ok(),
            RespValue::simple_string(""),
            RespValue::error("ERR something"),
            RespValue::integer(i64::MIN),
            RespValue::bulk_string(b"binary\x00\xffdata".to_vec()),
            RespValue::bulk_string(Vec::new()),
            RespValue::null_bulk_string(),
            RespValue::null_array(),
            RespValue::array(vec![]),
            RespValue::array(vec![
                RespValue::bulk_string(b"SET".to_vec()),
                RespValue::array(vec![RespValue::null_array(), RespValue::integer(7)]),
                RespValue::error("nested"),
            ]),
        ];

        for value in values {
            let mut buf = BytesMut::from(&value.serialize()[..]);
            let decoded = RespParser::parse(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, value);
            assert!(buf.is_empty());
        }
    }

    #[tokio::test]
    async fn test_reader_reads_consecutive_values() {
        let input: &[u8] = b"*1\r\n$4\r\nPING\r\n+OK\r\n";
        let mut reader = RespReader::new(input);
        assert_eq!(
            reader.read_value().await.unwrap(),
            Some(RespValue::array(vec![RespValue::bulk_string(b"PING".to_vec())]))
        );
        assert_eq!(reader.read_value().await.unwrap(), Some(RespValue::ok()));
        assert_eq!(reader.read_value().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_truncated_value_is_an_error() {
        let input: &[u8] = b"*2\r\n$3\r\nfoo\r\n";
        let mut reader = RespReader::new(input);
        assert!(matches!(
            reader.read_value().await,
            Err(RespError::Truncated)
        ));
    }

    #[tokio::test]
    async fn test_reader_waits_for_split_frames() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut reader = RespReader::new(rx);

        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            tx.write_all(b"$5\r\nhel").await.unwrap();
            tokio::task::yield_now().await;
            tx.write_all(b"lo\r\n").await.unwrap();
        });

        let value = reader.read_value().await.unwrap();
        assert_eq!(value, Some(RespValue::bulk_string(b"hello".to_vec())));
        writer.await.unwrap();
        assert_eq!(reader.read_value().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_large_command_in_small_chunks() {
        let value = vec![b'v'; 8 * 1024 * 1024];
        let frame = RespValue::array(vec![
            RespValue::bulk_string(b"SET".to_vec()),
            RespValue::bulk_string(b"big".to_vec()),
            RespValue::bulk_string(value.clone()),
        ])
        .serialize();

        let (mut tx, rx) = tokio::io::duplex(16 * 1024);
        let mut reader = RespReader::new(rx);

        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for chunk in frame.chunks(16 * 1024) {
                tx.write_all(chunk).await.unwrap();
            }
        });

        let decoded = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            reader.read_value(),
        )
        .await
        .expect("decoding a chunked command took too long")
        .unwrap();
        writer.await.unwrap();

        match decoded {
            Some(RespValue::Array(Some(items))) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[2], RespValue::bulk_string(value));
            }
            other => panic!("expected a command array, got {other:?}"),
        }
    }
}
