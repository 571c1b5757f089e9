//! Streaming decoder for TAQ record files.
//!
//! A [`TaqDecoder`] owns a byte stream positioned at the first byte of an
//! (already extracted) TAQ record file. It moves through
//! `Created -> HeaderRead -> Decoding -> Completed`; any error parks it in
//! `Failed`, and nothing decoded so far is returned.
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::num::NonZeroUsize;

use tracing::{debug, info, trace, warn};

use crate::config::DecoderConfig;
use crate::error::{Result, TaqError};
use crate::header::{BaseTimestamp, Header};
use crate::record::{RecordKind, RecordLayout, layout_for};
use crate::table::{DecodedTable, TableView};

/// Upper bound on rows pre-reserved from the header's declared count.
const MAX_PRESIZE_ROWS: u64 = 1 << 16;

/// Initial table capacity for a header declaring `declared` rows.
fn presize_rows(declared: u64) -> usize {
    declared.min(MAX_PRESIZE_ROWS) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Created,
    HeaderRead,
    Decoding,
    Completed,
    Failed,
}

pub struct TaqDecoder<R: Read> {
    layout: &'static RecordLayout,
    reader: BufReader<R>,
    chunk_rows: NonZeroUsize,
    state: DecoderState,
    header: Option<Header>,
}

impl<R: Read> TaqDecoder<R> {
    /// Fails with `UndefinedLayout` before touching the stream.
    pub fn open(kind: RecordKind, reader: R, chunk_rows: NonZeroUsize) -> Result<Self> {
        let layout = layout_for(kind)?;
        Ok(TaqDecoder {
            layout,
            reader: BufReader::new(reader),
            chunk_rows,
            state: DecoderState::Created,
            header: None,
        })
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn layout(&self) -> &'static RecordLayout {
        self.layout
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    fn expect_state(&self, op: &'static str, want: DecoderState) -> Result<()> {
        if self.state != want {
            return Err(TaqError::InvalidState { op, state: self.state });
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: TaqError) -> Result<T> {
        self.state = DecoderState::Failed;
        Err(err)
    }

    pub fn read_header(&mut self) -> Result<&Header> {
        self.expect_state("read_header", DecoderState::Created)?;
        let width = self.layout.width();
        let mut line = Vec::with_capacity(width);
        // A valid header is exactly one record line long.
        if let Err(e) = (&mut self.reader).take(width as u64).read_until(b'\n', &mut line) {
            return self.fail(e.into());
        }
        if line.is_empty() {
            return self.fail(TaqError::malformed("stream is empty"));
        }
        if line.len() == width && line.last() != Some(&b'\n') {
            return self.fail(TaqError::malformed(format!("no line terminator within the first {width} bytes")));
        }
        let header = match Header::parse(&line) {
            Ok(h) => h,
            Err(e) => return self.fail(e),
        };
        if header.line_length != self.layout.width() {
            let err = TaqError::LineLengthMismatch { line_length: header.line_length, layout_width: self.layout.width() };
            return self.fail(err);
        }
        debug!(
            kind = %self.layout.kind(),
            date = %format_args!("{}-{:02}-{:02}", header.year, header.month, header.day),
            record_count = header.record_count,
            line_length = header.line_length,
            "parsed TAQ header"
        );
        self.state = DecoderState::HeaderRead;
        Ok(self.header.insert(header))
    }

    /// US Eastern midnight of the header's trading date.
    pub fn compute_base_time(&self) -> Result<BaseTimestamp> {
        let header = self
            .header
            .as_ref()
            .ok_or(TaqError::InvalidState { op: "compute_base_time", state: self.state })?;
        let base = header.base_time()?;
        debug!(epoch_seconds = base.epoch_seconds, utc_offset_seconds = base.utc_offset_seconds, "base time");
        Ok(base)
    }

    /// Read `buf.len()` bytes unless the stream ends first.
    fn fill_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    pub fn decode_all(&mut self) -> Result<DecodedTable> {
        self.expect_state("decode_all", DecoderState::HeaderRead)?;
        self.state = DecoderState::Decoding;
        match self.decode_chunks() {
            Ok(table) => {
                self.state = DecoderState::Completed;
                Ok(table)
            }
            Err(e) => self.fail(e),
        }
    }

    fn decode_chunks(&mut self) -> Result<DecodedTable> {
        let (line_length, declared) = match &self.header {
            Some(h) => (h.line_length, h.record_count),
            None => return Err(TaqError::InvalidState { op: "decode_all", state: self.state }),
        };
        let layout = self.layout;
        let mut table = DecodedTable::with_layout(layout, presize_rows(declared));
        let mut buf = vec![0u8; self.chunk_rows.get() * line_length];
        let mut offset = line_length as u64;
        loop {
            let n = self.fill_chunk(&mut buf)?;
            if n == 0 {
                break;
            }
            if n % line_length != 0 {
                return Err(TaqError::TruncatedRecord { offset, len: n, line_length });
            }
            trace!(offset, rows = n / line_length, "chunk");
            for line in buf[..n].chunks_exact(line_length) {
                table.push_line(layout, line)?;
            }
            offset += n as u64;
        }
        if table.is_empty() {
            return Err(TaqError::EmptyResult);
        }
        if table.len() as u64 != declared {
            warn!(declared, decoded = table.len(), "decoded row count differs from header");
        }
        info!(kind = %layout.kind(), rows = table.len(), "decoded TAQ file");
        Ok(table)
    }
}

/// Result of [`load`]: the header, its base time and the decoded table.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub header: Header,
    pub base_time: BaseTimestamp,
    pub table: DecodedTable,
    processed: bool,
}

impl LoadedFile {
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Numeric projection; `None` unless loaded in processed mode.
    pub fn numeric(&self) -> Option<TableView<'_>> {
        if !self.processed {
            return None;
        }
        self.table.numeric_view().ok()
    }

    /// Categorical projection; `None` unless loaded in processed mode.
    pub fn categorical(&self) -> Option<TableView<'_>> {
        if !self.processed {
            return None;
        }
        self.table.categorical_view().ok()
    }

    pub fn timestamps_ms(&self) -> Option<Vec<i64>> {
        self.table.timestamps_ms(&self.base_time)
    }
}

/// Decode a whole TAQ record stream in one call.
pub fn load<R: Read>(reader: R, config: &DecoderConfig) -> Result<LoadedFile> {
    let mut decoder = TaqDecoder::open(config.kind, reader, config.chunk_rows)?;
    let header = decoder.read_header()?.clone();
    let base_time = decoder.compute_base_time()?;
    let table = decoder.decode_all()?;
    Ok(LoadedFile { header, base_time, table, processed: config.processed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldKind;
    use std::cell::Cell;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn header(count: usize) -> Vec<u8> {
        let mut h = format!("QB06152023:{count}").into_bytes();
        h.resize(96, b' ');
        h.extend_from_slice(b"\r\n");
        h
    }

    fn record(seq: u64) -> Vec<u8> {
        let layout = layout_for(RecordKind::Bbo).unwrap();
        let mut out = Vec::new();
        for f in layout.fields() {
            match (f.name, f.kind) {
                ("Sequence_Number", _) => out.extend_from_slice(format!("{seq:016}").as_bytes()),
                ("Line_Change", _) => out.extend_from_slice(b"\r\n"),
                (_, FieldKind::NumericText) => out.extend(std::iter::repeat_n(b'0', f.byte_width)),
                (_, FieldKind::Categorical) => out.extend(std::iter::repeat_n(b'A', f.byte_width)),
            }
        }
        out
    }

    fn file(rows: usize) -> Vec<u8> {
        let mut out = header(rows);
        for i in 0..rows {
            out.extend(record(i as u64));
        }
        out
    }

    /// Returns at most `step` bytes per read call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn state_machine_walk() {
        let data = file(5);
        let mut d = TaqDecoder::open(RecordKind::Bbo, &data[..], nz(2)).unwrap();
        assert_eq!(d.state(), DecoderState::Created);
        assert!(matches!(d.decode_all(), Err(TaqError::InvalidState { .. })));
        assert_eq!(d.read_header().unwrap().record_count, 5);
        assert_eq!(d.state(), DecoderState::HeaderRead);
        let t = d.decode_all().unwrap();
        assert_eq!(d.state(), DecoderState::Completed);
        assert_eq!(t.len(), 5);
        let seq = t.column("Sequence_Number").unwrap().numeric().unwrap();
        assert_eq!(seq, &[0, 1, 2, 3, 4]);
        assert!(matches!(d.decode_all(), Err(TaqError::InvalidState { .. })));
    }

    #[test]
    fn short_reads_are_not_truncation() {
        let data = file(7);
        let t = load(Trickle { data: &data, step: 13 }, &DecoderConfig::default()).unwrap().table;
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn chunk_size_does_not_change_result() {
        let data = file(9);
        let tables: Vec<_> = [1, 2, 4, 9, 100]
            .into_iter()
            .map(|rows| {
                let cfg = DecoderConfig { chunk_rows: nz(rows), ..DecoderConfig::default() };
                load(&data[..], &cfg).unwrap().table
            })
            .collect();
        assert!(tables.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn truncated_tail() {
        let mut data = file(3);
        data.pop();
        let mut d = TaqDecoder::open(RecordKind::Bbo, &data[..], nz(2)).unwrap();
        d.read_header().unwrap();
        match d.decode_all() {
            Err(TaqError::TruncatedRecord { offset, len, line_length }) => {
                assert_eq!((offset, len, line_length), (98 * 3, 97, 98));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(d.state(), DecoderState::Failed);
    }

    #[test]
    fn header_only_is_empty_result() {
        let data = header(0);
        assert!(matches!(load(&data[..], &DecoderConfig::default()), Err(TaqError::EmptyResult)));
    }

    #[test]
    fn header_length_must_match_layout() {
        let data = b"QB06152023:1\n".to_vec();
        let mut d = TaqDecoder::open(RecordKind::Bbo, &data[..], nz(1)).unwrap();
        assert!(matches!(
            d.read_header(),
            Err(TaqError::LineLengthMismatch { line_length: 13, layout_width: 98 })
        ));
        assert_eq!(d.state(), DecoderState::Failed);
    }

    #[test]
    fn undefined_kind_never_reads() {
        struct Untouchable;
        impl Read for Untouchable {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                panic!("stream must not be read");
            }
        }
        for kind in [RecordKind::Master, RecordKind::Quotes, RecordKind::Trades] {
            assert!(matches!(
                TaqDecoder::open(kind, Untouchable, nz(1)),
                Err(TaqError::UndefinedLayout { .. })
            ));
        }
    }

    #[test]
    fn header_read_stops_at_line_width() {
        struct Endless<'a> {
            served: &'a Cell<usize>,
        }
        impl Read for Endless<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                buf.fill(b'A');
                self.served.set(self.served.get() + buf.len());
                Ok(buf.len())
            }
        }
        let served = Cell::new(0);
        let mut d = TaqDecoder::open(RecordKind::Bbo, Endless { served: &served }, nz(1)).unwrap();
        assert!(matches!(d.read_header(), Err(TaqError::MalformedHeader { .. })));
        assert_eq!(d.state(), DecoderState::Failed);
        assert!(served.get() <= 16 * 1024, "read {} bytes", served.get());
    }

    #[test]
    fn declared_count_only_hints_capacity() {
        assert_eq!(presize_rows(3), 3);
        assert_eq!(presize_rows(u64::MAX), MAX_PRESIZE_ROWS as usize);

        let mut data = header(999_999_999);
        data.extend(record(0));
        assert_eq!(load(&data[..], &DecoderConfig::default()).unwrap().table.len(), 1);
    }

    #[test]
    fn processed_mode_exposes_views() {
        let data = file(2);
        let raw = load(&data[..], &DecoderConfig { processed: false, ..DecoderConfig::default() }).unwrap();
        assert!(raw.numeric().is_none());
        let done = load(&data[..], &DecoderConfig::default()).unwrap();
        assert_eq!(done.numeric().unwrap().len(), 2);
        assert_eq!(done.categorical().unwrap().schema().len(), 17);
        assert_eq!(done.base_time.epoch_seconds, 1_686_801_600);
    }
}
