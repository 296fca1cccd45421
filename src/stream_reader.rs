//! Per-CPU record stream reader
//!
//! Each processor's records come as a header line followed by rows of
//! `opcode_token,timestamp,task_token`, in capture order. The reader forwards
//! every row exactly once, in order, to the reconstruction engine and closes
//! the processor's stream when input is exhausted.

use crate::classifier::{EventClassifier, UnknownOpcode};
use crate::engine::ReconstructionEngine;
use crate::error::{ReconError, Result};
use crate::event::{CpuId, Timestamp};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace};

/// One unclassified row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based data row index (the header is not counted)
    pub row: usize,
    pub opcode: String,
    pub time: Timestamp,
    pub task: String,
}

/// Parse one data row
///
/// Fields beyond the third are ignored.
pub fn parse_row(cpu: CpuId, row: usize, line: &str) -> Result<RawRecord> {
    let mut fields = line.split(',');
    let (opcode, time, task) = match (fields.next(), fields.next(), fields.next()) {
        (Some(opcode), Some(time), Some(task)) => (opcode, time, task),
        _ => {
            return Err(ReconError::MalformedRow {
                cpu,
                row,
                fields: line.split(',').count(),
            })
        }
    };

    let time = time
        .trim()
        .parse::<Timestamp>()
        .map_err(|_| ReconError::InvalidTimestamp {
            cpu,
            row,
            value: time.trim().to_string(),
        })?;

    Ok(RawRecord {
        row,
        opcode: opcode.trim().to_string(),
        time,
        task: task.trim().to_string(),
    })
}

/// Sequential reader over one processor's record source
#[derive(Debug)]
pub struct CpuStreamReader<R> {
    cpu: CpuId,
    reader: R,
    row: usize,
    line: String,
}

impl CpuStreamReader<BufReader<File>> {
    /// Open a record file for `cpu`
    pub fn open<P: AsRef<Path>>(cpu: CpuId, path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(cpu, BufReader::new(file))
    }
}

impl<R: BufRead> CpuStreamReader<R> {
    /// Wrap a source and consume its header line
    pub fn new(cpu: CpuId, mut reader: R) -> Result<Self> {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(ReconError::MissingHeader { cpu });
        }
        trace!(cpu, header = header.trim_end(), "read stream header");
        Ok(Self {
            cpu,
            reader,
            row: 0,
            line: String::new(),
        })
    }

    pub fn cpu(&self) -> CpuId {
        self.cpu
    }

    /// Next data row, skipping blank lines; `None` at end of input
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|source| ReconError::UnreadableRow {
                    cpu: self.cpu,
                    row: self.row + 1,
                    source,
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.row += 1;
            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return parse_row(self.cpu, self.row, line).map(Some);
        }
    }

    /// Classify every row and forward it to `engine`, then close the stream
    ///
    /// Returns the number of records forwarded. On error the stream is left
    /// open; the run is expected to abort.
    pub fn feed(mut self, classifier: &EventClassifier, engine: &mut ReconstructionEngine) -> Result<usize> {
        let cpu = self.cpu;
        engine.begin_stream(cpu);

        let mut forwarded = 0;
        while let Some(record) = self.next_record()? {
            let classified = classifier
                .classify(&record.opcode, &record.task)
                .map_err(|UnknownOpcode(token)| ReconError::UnknownOpcode {
                    cpu,
                    row: record.row,
                    token,
                })?;
            trace!(
                cpu,
                row = record.row,
                time = record.time,
                evt = classified.kind.as_str(),
                "record"
            );
            engine.process(cpu, record.time, classified.kind, classified.task);
            forwarded += 1;
        }

        engine.end_stream(cpu);
        debug!(cpu, records = forwarded, "forwarded stream");
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, UNKNOWN_TASK};
    use std::collections::BTreeMap;
    use std::io::Cursor;

    fn classifier() -> EventClassifier {
        let mut opcodes = BTreeMap::new();
        opcodes.insert("0x10".to_string(), EventKind::Jmp);
        opcodes.insert("0x20".to_string(), EventKind::Yield);
        let mut tasks = BTreeMap::new();
        tasks.insert("aa".to_string(), 1);
        EventClassifier::new(&opcodes, &tasks)
    }

    #[test]
    fn test_parse_row() {
        let rec = parse_row(0, 1, "0x10,1234,aa").unwrap();
        assert_eq!(
            rec,
            RawRecord {
                row: 1,
                opcode: "0x10".to_string(),
                time: 1234,
                task: "aa".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_row_too_few_fields() {
        let err = parse_row(4, 9, "0x10,1234").unwrap_err();
        assert!(matches!(
            err,
            ReconError::MalformedRow {
                cpu: 4,
                row: 9,
                fields: 2
            }
        ));
    }

    #[test]
    fn test_parse_row_bad_timestamp() {
        let err = parse_row(0, 2, "0x10,12ab,aa").unwrap_err();
        assert!(matches!(err, ReconError::InvalidTimestamp { row: 2, .. }));
    }

    #[test]
    fn test_reader_skips_header_and_blank_lines() {
        let input = "pc,tsc,val\n0x10,10,aa\n\n0x20,20,aa\r\n";
        let mut reader = CpuStreamReader::new(0, Cursor::new(input)).unwrap();
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.row, 1);
        let second = reader.next_record().unwrap().unwrap();
        assert_eq!(second.row, 3);
        assert_eq!(second.task, "aa");
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_reports_non_utf8_row() {
        let input = b"pc,tsc,val\n0x10,10,aa\n0x10,\xff\xfe,aa\n".to_vec();
        let mut reader = CpuStreamReader::new(6, Cursor::new(input)).unwrap();
        assert!(reader.next_record().unwrap().is_some());

        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, ReconError::UnreadableRow { cpu: 6, row: 2, .. }));
        assert_eq!(err.location(), Some((6, 2)));
    }

    #[test]
    fn test_reader_requires_header() {
        let err = CpuStreamReader::new(7, Cursor::new("")).unwrap_err();
        assert!(matches!(err, ReconError::MissingHeader { cpu: 7 }));
    }

    #[test]
    fn test_feed_forwards_every_record() {
        let input = "pc,tsc,val\n0x10,10,zz\n0x20,20,aa\n0x10,30,zz\n";
        let reader = CpuStreamReader::new(2, Cursor::new(input)).unwrap();
        let mut engine = ReconstructionEngine::new();
        let forwarded = reader.feed(&classifier(), &mut engine).unwrap();
        assert_eq!(forwarded, 3);

        let cpu = engine.model().cpu_timeline(2).unwrap();
        assert_eq!(cpu.len(), 3);
        assert_eq!(cpu[0].tid, 1);
        assert_eq!(cpu[2].tid, UNKNOWN_TASK);
    }

    #[test]
    fn test_feed_unknown_opcode_identifies_row() {
        let input = "pc,tsc,val\n0x10,10,aa\n0x99,20,aa\n";
        let reader = CpuStreamReader::new(5, Cursor::new(input)).unwrap();
        let mut engine = ReconstructionEngine::new();
        let err = reader.feed(&classifier(), &mut engine).unwrap_err();
        assert_eq!(err.location(), Some((5, 2)));
    }
}
