//! Decoder for the packed inotify record stream.
//!
//! Each record is a fixed 16-byte header followed by `len` bytes of
//! NUL-padded name:
//!
//! ```text
//! +--------+--------+--------+--------+----------------+
//! | wd i32 |mask u32|cookie  | len u32| name[len]      |
//! +--------+--------+--------+--------+----------------+
//! ```
//!
//! All header fields use native byte order. A single read returns one or
//! more whole records; the decoder walks them without copying the buffer.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use super::error::WatchError;
use super::kind::{MutationKind, MutationMask};
use super::registry::WatchHandle;

/// Size of the fixed record header in bytes.
pub const HEADER_SIZE: usize = 16;

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub handle: WatchHandle,
    pub mask: MutationMask,
    /// Correlates the MovedFrom/MovedTo halves of a rename.
    pub cookie: u32,
    /// Entry inside the watched directory; `None` when the event concerns
    /// the directory itself.
    pub name: Option<OsString>,
}

impl DecodedEvent {
    /// Mutation kinds carried by this record, lowest bit first.
    pub fn kinds(&self) -> impl Iterator<Item = MutationKind> + '_ {
        self.mask.kinds()
    }

    pub fn has_kind(&self, kind: MutationKind) -> bool {
        self.mask.contains(kind.mask())
    }

    /// Whether the name refers to a hidden entry.
    pub fn is_hidden(&self) -> bool {
        self.name
            .as_ref()
            .is_some_and(|name| name.as_bytes().first() == Some(&b'.'))
    }
}

/// Lazy iterator over the records in one read buffer.
///
/// Yields `Err(TruncatedRecord)` at most once, then stops.
#[derive(Debug)]
pub struct EventDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> EventDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn truncated(&mut self) -> WatchError {
        self.failed = true;
        WatchError::TruncatedRecord {
            offset: self.offset,
            remaining: self.buf.len() - self.offset,
        }
    }
}

impl Iterator for EventDecoder<'_> {
    type Item = Result<DecodedEvent, WatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset == self.buf.len() {
            return None;
        }

        let rest = &self.buf[self.offset..];
        let Some(header) = rest.get(..HEADER_SIZE) else {
            return Some(Err(self.truncated()));
        };

        let wd = i32::from_ne_bytes(field(header, 0));
        let mask = u32::from_ne_bytes(field(header, 4));
        let cookie = u32::from_ne_bytes(field(header, 8));
        let name_len = u32::from_ne_bytes(field(header, 12)) as usize;

        let Some(raw_name) = rest.get(HEADER_SIZE..HEADER_SIZE + name_len) else {
            return Some(Err(self.truncated()));
        };

        self.offset += HEADER_SIZE + name_len;

        Some(Ok(DecodedEvent {
            handle: WatchHandle::new(wd),
            mask: MutationMask::from_bits_retain(mask),
            cookie,
            name: decode_name(raw_name),
        }))
    }
}

fn field(header: &[u8], at: usize) -> [u8; 4] {
    [header[at], header[at + 1], header[at + 2], header[at + 3]]
}

fn decode_name(raw: &[u8]) -> Option<OsString> {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    if end == 0 {
        return None;
    }
    Some(OsStr::from_bytes(&raw[..end]).to_os_string())
}

/// Encode one record in the same layout the kernel uses.
///
/// The name is NUL-terminated and padded to a multiple of the header
/// alignment, as the kernel does.
pub fn encode_record(
    handle: WatchHandle,
    mask: MutationMask,
    cookie: u32,
    name: Option<&OsStr>,
) -> Vec<u8> {
    let name_bytes = name.map(OsStr::as_bytes).unwrap_or_default();
    let name_len = if name_bytes.is_empty() {
        0
    } else {
        (name_bytes.len() + 1).next_multiple_of(HEADER_SIZE)
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + name_len);
    out.extend_from_slice(&handle.raw().to_ne_bytes());
    out.extend_from_slice(&mask.bits().to_ne_bytes());
    out.extend_from_slice(&cookie.to_ne_bytes());
    out.extend_from_slice(&(name_len as u32).to_ne_bytes());
    out.extend_from_slice(name_bytes);
    out.resize(HEADER_SIZE + name_len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(wd: i32, mask: MutationMask, name: Option<&str>) -> Vec<u8> {
        encode_record(WatchHandle::new(wd), mask, 0, name.map(OsStr::new))
    }

    #[test]
    fn test_decode_sequence_in_order() {
        let input = vec![
            (WatchHandle::new(1), MutationMask::CREATE, Some(OsString::from("a.txt"))),
            (WatchHandle::new(5), MutationMask::DELETE, None),
            (
                WatchHandle::new(2),
                MutationMask::MOVED_TO | MutationMask::ISDIR,
                Some(OsString::from("a-much-longer-file-name.log")),
            ),
            (WatchHandle::new(5), MutationMask::IGNORED, None),
        ];
        let buf: Vec<u8> = input
            .iter()
            .flat_map(|(handle, mask, name)| encode_record(*handle, *mask, 0, name.as_deref()))
            .collect();

        let mut decoder = EventDecoder::new(&buf);
        let decoded: Vec<_> = decoder
            .by_ref()
            .map(Result::unwrap)
            .map(|event| (event.handle, event.mask, event.name))
            .collect();

        assert_eq!(decoded, input);
        assert_eq!(decoder.offset(), buf.len());
        assert!(decoded[2].1.contains(MutationMask::ISDIR));
    }

    #[test]
    fn test_multiple_kinds_in_one_record() {
        let buf = record(3, MutationMask::CREATE | MutationMask::ATTRIB, Some("f"));

        let events: Vec<_> = EventDecoder::new(&buf).map(Result::unwrap).collect();
        assert_eq!(events.len(), 1);

        let kinds: Vec<_> = events[0].kinds().collect();
        assert_eq!(
            kinds,
            vec![MutationKind::AttributeChange, MutationKind::Create]
        );
    }

    #[test]
    fn test_cookie_preserved() {
        let buf = encode_record(
            WatchHandle::new(1),
            MutationMask::MOVED_FROM,
            0xdead_beef,
            Some(OsStr::new("old")),
        );

        let event = EventDecoder::new(&buf).next().unwrap().unwrap();
        assert_eq!(event.cookie, 0xdead_beef);
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        assert!(EventDecoder::new(&[]).next().is_none());
    }

    #[test]
    fn test_partial_header_is_error() {
        let mut buf = record(1, MutationMask::CREATE, Some("ok"));
        let good_len = buf.len();
        buf.extend_from_slice(&[1, 0, 0, 0, 0, 1]);

        let mut decoder = EventDecoder::new(&buf);
        assert!(decoder.next().unwrap().is_ok());

        match decoder.next() {
            Some(Err(WatchError::TruncatedRecord { offset, remaining })) => {
                assert_eq!(offset, good_len);
                assert_eq!(remaining, 6);
            }
            other => panic!("expected truncated record, got {other:?}"),
        }
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_name_overrunning_buffer_is_error() {
        let mut buf = record(1, MutationMask::CREATE, Some("name"));
        buf.truncate(buf.len() - 4);

        let mut decoder = EventDecoder::new(&buf);
        assert!(matches!(
            decoder.next(),
            Some(Err(WatchError::TruncatedRecord { offset: 0, .. }))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_name_padding_stripped() {
        let buf = record(1, MutationMask::CREATE, Some("x"));
        assert_eq!(buf.len(), HEADER_SIZE * 2);

        let event = EventDecoder::new(&buf).next().unwrap().unwrap();
        assert_eq!(event.name.as_deref(), Some(OsStr::new("x")));
    }

    #[test]
    fn test_hidden_names() {
        let hidden = EventDecoder::new(&record(1, MutationMask::CREATE, Some(".swp")))
            .next()
            .unwrap()
            .unwrap();
        let visible = EventDecoder::new(&record(1, MutationMask::CREATE, Some("a.b")))
            .next()
            .unwrap()
            .unwrap();
        let unnamed = EventDecoder::new(&record(1, MutationMask::DELETE_SELF, None))
            .next()
            .unwrap()
            .unwrap();

        assert!(hidden.is_hidden());
        assert!(!visible.is_hidden());
        assert!(!unnamed.is_hidden());
    }

    #[test]
    fn test_non_utf8_name() {
        let raw = OsStr::from_bytes(b"caf\xe9");
        let buf = encode_record(WatchHandle::new(1), MutationMask::CREATE, 0, Some(raw));

        let event = EventDecoder::new(&buf).next().unwrap().unwrap();
        assert_eq!(event.name.as_deref(), Some(raw));
    }
}
