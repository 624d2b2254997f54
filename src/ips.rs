//! IPS record decoding, application and listing.
//!
//! An IPS file is the literal `PATCH`, a run of records and the literal `EOF`. Each record is a
//! 24-bit big-endian offset and a 16-bit big-endian size followed by `size` bytes of data. A size
//! of zero switches to the run-length form: a 16-bit run count and a single fill byte.

use crate::error::{Field, IpsError, Result};
use log::{debug, info, trace};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::iter::FusedIterator;
use std::path::Path;

pub const HEADER: &[u8; 5] = b"PATCH";
pub const FOOTER: &[u8; 3] = b"EOF";

/// Largest offset a record can address.
pub const MAX_OFFSET: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Literal,
    RunLengthEncoded { count: u16, value: u8 },
}

/// A single decoded write. `payload` is always expanded and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub offset: u32,
    pub payload: Vec<u8>,
    pub kind: RecordKind,
}

/// Outcome of one successful decode step.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Record(PatchRecord),
    End,
}

/// Pull-based IPS decoder.
///
/// The header is checked when the decoder is created. Records are then read one at a time, either
/// through [`Decoder::step`] or the `Iterator` impl. Once the end marker or an error has been
/// reached the decoder yields nothing more.
#[derive(Debug)]
pub struct Decoder<R> {
    reader: R,
    position: u64,
    done: bool,
}

impl Decoder<BufReader<File>> {
    /// Opens an `.ips` file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IpsError::NotFound(path.to_path_buf()));
        }
        let is_ips = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("ips"));
        if !is_ips {
            return Err(IpsError::NotIpsFile(path.to_path_buf()));
        }

        debug!("Opening patch {}", path.display());
        Decoder::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> Decoder<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 5];
        let n = read_up_to(&mut reader, &mut header)?;
        if header[..n] != HEADER[..] {
            return Err(IpsError::MalformedHeader {
                found: header[..n].to_vec(),
            });
        }

        Ok(Decoder {
            reader,
            position: n as u64,
            done: false,
        })
    }

    /// Bytes of the patch stream consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Decodes the next record.
    pub fn step(&mut self) -> Result<Step> {
        if self.done {
            return Ok(Step::End);
        }

        let step = self.decode_record();
        if !matches!(step, Ok(Step::Record(_))) {
            self.done = true;
        }
        step
    }

    fn decode_record(&mut self) -> Result<Step> {
        let start = self.position;
        let mut offset = [0u8; 3];
        let n = self.fill(&mut offset)?;
        if n == 0 {
            trace!("Patch ended without an EOF marker at byte {}", start);
            return Ok(Step::End);
        }
        if n < offset.len() {
            return Err(IpsError::TruncatedStream {
                field: Field::Offset,
                position: start,
                expected: offset.len(),
                actual: n,
            });
        }
        if offset == *FOOTER {
            trace!("EOF marker at byte {}", start);
            return Ok(Step::End);
        }
        let offset = u32::from_be_bytes([0, offset[0], offset[1], offset[2]]);

        let size = self.read_u16(Field::Length)?;
        if size != 0 {
            let mut payload = vec![0u8; usize::from(size)];
            self.read_field(Field::Payload, &mut payload)?;
            return Ok(Step::Record(PatchRecord {
                offset,
                payload,
                kind: RecordKind::Literal,
            }));
        }

        let count = self.read_u16(Field::RunCount)?;
        let mut value = [0u8; 1];
        self.read_field(Field::FillByte, &mut value)?;
        if count == 0 {
            return Err(IpsError::EmptyRun { offset });
        }

        Ok(Step::Record(PatchRecord {
            offset,
            payload: vec![value[0]; usize::from(count)],
            kind: RecordKind::RunLengthEncoded {
                count,
                value: value[0],
            },
        }))
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = read_up_to(&mut self.reader, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn read_field(&mut self, field: Field, buf: &mut [u8]) -> Result<()> {
        let position = self.position;
        let n = self.fill(buf)?;
        if n < buf.len() {
            return Err(IpsError::TruncatedStream {
                field,
                position,
                expected: buf.len(),
                actual: n,
            });
        }
        Ok(())
    }

    fn read_u16(&mut self, field: Field) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_field(field, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = Result<PatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Step::Record(record)) => Some(Ok(record)),
            Ok(Step::End) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: Read> FusedIterator for Decoder<R> {}

/// Like `read_exact`, but reports how much was read instead of failing on a short stream.
fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub records: usize,
    pub bytes_written: u64,
}

/// Writes every record into `target`, in order.
///
/// `observer` is told the offset and length of each record once it has been written. Writing past
/// the end of the target extends it. On error the records already written stay written.
pub fn apply<I, T, O>(records: I, target: &mut T, mut observer: O) -> Result<ApplySummary>
where
    I: IntoIterator<Item = Result<PatchRecord>>,
    T: Write + Seek + ?Sized,
    O: FnMut(u32, usize),
{
    let mut summary = ApplySummary::default();

    for record in records {
        let record = record?;
        target
            .seek(SeekFrom::Start(u64::from(record.offset)))
            .map_err(|source| IpsError::SeekFailure {
                offset: record.offset,
                source,
            })?;
        target.write_all(&record.payload)?;

        debug!(
            "{} bytes written at offset {:#x}",
            record.payload.len(),
            record.offset
        );
        observer(record.offset, record.payload.len());
        summary.records += 1;
        summary.bytes_written += record.payload.len() as u64;
    }

    Ok(summary)
}

/// Applies an in-memory patch to an in-memory image.
pub fn apply_to_buffer(patch: &[u8], target: &mut Vec<u8>) -> Result<ApplySummary> {
    let decoder = Decoder::new(patch)?;
    apply(decoder, &mut io::Cursor::new(target), |_, _| {})
}

/// Applies the patch file `ips` to the file `rom` in place.
///
/// The patch header is validated before the ROM is opened for writing.
pub fn patch<O>(rom: &Path, ips: &Path, observer: O) -> Result<ApplySummary>
where
    O: FnMut(u32, usize),
{
    let decoder = Decoder::open(ips)?;
    if !rom.exists() {
        return Err(IpsError::NotFound(rom.to_path_buf()));
    }
    let mut target = OpenOptions::new().read(true).write(true).open(rom)?;

    info!("Applying {} to {}", ips.display(), rom.display());
    let summary = apply(decoder, &mut target, observer)?;
    target.flush()?;
    info!(
        "Applied {} records, {} bytes written",
        summary.records, summary.bytes_written
    );

    Ok(summary)
}

/// Writes a human readable listing of `records` and returns how many there were.
pub fn show_patches<I, W>(records: I, out: &mut W) -> Result<usize>
where
    I: IntoIterator<Item = Result<PatchRecord>>,
    W: Write + ?Sized,
{
    let mut total = 0;

    for record in records {
        let record = record?;
        total += 1;

        writeln!(out, "Offset {:#x}", record.offset)?;
        match record.kind {
            RecordKind::Literal => {
                for line in record.payload.chunks(8) {
                    let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
                    writeln!(out, "{}", hex.join(" "))?;
                }
            }
            RecordKind::RunLengthEncoded { count, value } => {
                writeln!(out, "Fill {:#04x} x {}", value, count)?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "Total patches: {}", total)?;
    Ok(total)
}
