// Line and block framing shared by the control and data connections.
use std::io::{BufRead, ErrorKind, Read};

use super::error::ProtoError;

/// Fixed-width little-endian sample as carried in binary blocks.
pub trait Sample: Copy {
    const WIDTH: usize;
    fn from_le(bytes: &[u8]) -> Self;
}

impl Sample for i32 {
    const WIDTH: usize = 4;
    fn from_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Sample for i16 {
    const WIDTH: usize = 2;
    fn from_le(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Serialize a command: every line newline-terminated, no escaping.
pub fn encode_command<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out
}

/// Longest reply line accepted, terminator included.
pub const MAX_LINE: usize = 4096;

/// Blocking read of one `\n`-terminated line, terminator stripped.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<String, ProtoError> {
    let mut raw = Vec::new();
    loop {
        let room = (MAX_LINE - raw.len()) as u64;
        match reader.by_ref().take(room).read_until(b'\n', &mut raw) {
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_disconnect(&e) => return Err(ProtoError::ConnectionClosed),
            Err(e) => return Err(e.into()),
        }
    }
    if raw.len() == MAX_LINE && raw.last() != Some(&b'\n') {
        return Err(ProtoError::LineTooLong { limit: MAX_LINE });
    }
    // EOF before the terminator, including a half-received line.
    if raw.last() != Some(&b'\n') {
        return Err(ProtoError::ConnectionClosed);
    }
    raw.pop();
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Read a line and parse it as a base-10 integer.
pub fn read_int_line<R: BufRead>(reader: &mut R, exchange: &'static str) -> Result<i64, ProtoError> {
    let line = read_line(reader)?;
    line.trim()
        .parse::<i64>()
        .map_err(|_| ProtoError::MalformedReply { exchange, line })
}

/// Read exactly `byte_count` bytes and reinterpret them as `T` samples.
pub fn read_block<T: Sample, R: Read>(reader: &mut R, byte_count: usize) -> Result<Vec<T>, ProtoError> {
    if byte_count % T::WIDTH != 0 {
        return Err(ProtoError::MisalignedBlock {
            bytes: byte_count,
            width: T::WIDTH,
        });
    }
    // grows with the bytes that actually arrive
    let mut buf = Vec::new();
    let res = reader.take(byte_count as u64).read_to_end(&mut buf);
    match res {
        Ok(_) => {}
        Err(e) if is_disconnect(&e) => {}
        Err(e) => return Err(e.into()),
    }
    if buf.len() < byte_count {
        return Err(ProtoError::ShortRead {
            expected: byte_count,
            got: buf.len(),
        });
    }
    Ok(buf.chunks_exact(T::WIDTH).map(T::from_le).collect())
}

fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encode_terminates_every_line() {
        let out = encode_command(&["function getHistogram", "0"]);
        assert_eq!(out, "function getHistogram\n0\n");
        assert_eq!(encode_command::<&str>(&[]), "");
    }

    #[test]
    fn read_line_strips_terminator() {
        let mut r = Cursor::new(b"hello there\r\nwelcome\n".to_vec());
        assert_eq!(read_line(&mut r).unwrap(), "hello there");
        assert_eq!(read_line(&mut r).unwrap(), "welcome");
        assert!(matches!(read_line(&mut r), Err(ProtoError::ConnectionClosed)));
    }

    #[test]
    fn partial_line_is_connection_closed() {
        let mut r = Cursor::new(b"12".to_vec());
        assert!(matches!(read_line(&mut r), Err(ProtoError::ConnectionClosed)));
    }

    #[test]
    fn int_line_parses_and_rejects() {
        let mut r = Cursor::new(b"4096\n-1\nabc\n".to_vec());
        assert_eq!(read_int_line(&mut r, "size").unwrap(), 4096);
        assert_eq!(read_int_line(&mut r, "size").unwrap(), -1);
        match read_int_line(&mut r, "size") {
            Err(ProtoError::MalformedReply { exchange, line }) => {
                assert_eq!(exchange, "size");
                assert_eq!(line, "abc");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn block_decodes_little_endian() {
        let mut bytes = Vec::new();
        for v in [1i32, -2, 70_000] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut r = Cursor::new(bytes);
        let bins: Vec<i32> = read_block(&mut r, 12).unwrap();
        assert_eq!(bins, vec![1, -2, 70_000]);

        let mut r = Cursor::new(vec![0xFF, 0xFF, 0x10, 0x00]);
        let samples: Vec<i16> = read_block(&mut r, 4).unwrap();
        assert_eq!(samples, vec![-1, 16]);
    }

    #[test]
    fn block_short_read() {
        let mut r = Cursor::new(vec![0u8; 6]);
        match read_block::<i32, _>(&mut r, 8) {
            Err(ProtoError::ShortRead { expected, got }) => {
                assert_eq!(expected, 8);
                assert_eq!(got, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn huge_block_size_is_short_read() {
        let mut r = Cursor::new(7i32.to_le_bytes().to_vec());
        match read_block::<i32, _>(&mut r, usize::MAX - 3) {
            Err(ProtoError::ShortRead { expected, got }) => {
                assert_eq!(expected, usize::MAX - 3);
                assert_eq!(got, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unterminated_line_is_bounded() {
        let mut r = Cursor::new(vec![b'a'; MAX_LINE * 3]);
        assert!(matches!(
            read_line(&mut r),
            Err(ProtoError::LineTooLong { limit: MAX_LINE })
        ));

        let mut line = vec![b'b'; MAX_LINE - 1];
        line.push(b'\n');
        let mut r = Cursor::new(line);
        assert_eq!(read_line(&mut r).unwrap().len(), MAX_LINE - 1);
    }

    #[test]
    fn block_rejects_partial_sample() {
        let mut r = Cursor::new(vec![0u8; 6]);
        assert!(matches!(
            read_block::<i32, _>(&mut r, 6),
            Err(ProtoError::MisalignedBlock { bytes: 6, width: 4 })
        ));
    }
}
