//! Text-format readers and writers: BEDGRAPH tracks, BED interval
//! files and RefSeq-style gene tables.
//!
//! These are the collaborators around the signal engine: they produce
//! validated [`Regions`]/[`BedGraph`]/[`Genes`] values and serialize the
//! engine's output. Formatting uses itoa/ryu buffers to stay out of the
//! allocator on the hot path.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use memchr::memchr;
use rustc_hash::FxHashMap;

use crate::bedgraph::{BedGraph, Track};
use crate::error::{Result, TrackError};
use crate::regions::{Regions, Strand};
use crate::splitregions::{Genes, SplitRegions};

fn parse_error(line: usize, message: impl Into<String>) -> TrackError {
    TrackError::Parse {
        line,
        message: message.into(),
    }
}

/// Split a line into tab-separated byte fields.
fn split_fields<'a>(mut line: &'a [u8], fields: &mut Vec<&'a [u8]>) {
    fields.clear();
    while let Some(tab) = memchr(b'\t', line) {
        fields.push(&line[..tab]);
        line = &line[tab + 1..];
    }
    fields.push(line);
}

fn parse_i64(field: &[u8], line: usize, what: &str) -> Result<i64> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            parse_error(
                line,
                format!("invalid {}: '{}'", what, String::from_utf8_lossy(field)),
            )
        })
}

fn parse_f64(field: &[u8], line: usize, what: &str) -> Result<f64> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            parse_error(
                line,
                format!("invalid {}: '{}'", what, String::from_utf8_lossy(field)),
            )
        })
}

fn skip_line(line: &str) -> bool {
    let line = line.trim();
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

/// Accumulates one chromosome's BEDGRAPH segments into a signal,
/// filling gaps between segments with 0-valued runs.
struct ChromBuilder {
    chrom: String,
    indices: Vec<i64>,
    values: Vec<f64>,
    expected: i64,
    gaps: usize,
}

impl ChromBuilder {
    fn new(chrom: String) -> Self {
        Self {
            chrom,
            indices: Vec::new(),
            values: Vec::new(),
            expected: 0,
            gaps: 0,
        }
    }

    fn push(&mut self, start: i64, end: i64, value: f64, line: usize) -> Result<()> {
        if end <= start {
            return Err(parse_error(
                line,
                format!("empty or inverted segment [{}, {})", start, end),
            ));
        }
        if start < self.expected {
            return Err(parse_error(
                line,
                format!(
                    "segment start {} before previous end {} on {}",
                    start, self.expected, self.chrom
                ),
            ));
        }
        if start > self.expected {
            self.indices.push(self.expected);
            self.values.push(0.0);
            self.gaps += 1;
        }
        self.indices.push(start);
        self.values.push(value);
        self.expected = end;
        Ok(())
    }

    fn finish(self) -> Result<(String, BedGraph)> {
        if self.gaps > 0 {
            eprintln!(
                "warning: {} uncovered gap(s) on {} filled with 0",
                self.gaps, self.chrom
            );
        }
        let signal = BedGraph::new(self.indices, self.values, self.expected)?;
        Ok((self.chrom, signal))
    }
}

/// Read a 4-column BEDGRAPH into one finalized signal per chromosome,
/// in file order. Segments must be sorted and non-overlapping within a
/// chromosome; uncovered gaps become explicit 0-valued runs and the
/// chromosome's domain ends at its last segment.
pub fn read_bedgraph<R: BufRead>(reader: R) -> Result<Vec<(String, BedGraph)>> {
    let mut out = Vec::new();
    let mut current: Option<ChromBuilder> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = lineno + 1;
        if skip_line(&line) {
            continue;
        }
        let mut fields: Vec<&[u8]> = Vec::with_capacity(4);
        split_fields(line.as_bytes(), &mut fields);
        if fields.len() < 4 {
            return Err(parse_error(
                lineno,
                format!("expected 4 BEDGRAPH columns, got {}", fields.len()),
            ));
        }
        let chrom = String::from_utf8_lossy(fields[0]).into_owned();
        let start = parse_i64(fields[1], lineno, "start")?;
        let end = parse_i64(fields[2], lineno, "end")?;
        let value = parse_f64(fields[3], lineno, "value")?;

        let switch = current.as_ref().map(|b| b.chrom != chrom).unwrap_or(true);
        if switch {
            if let Some(done) = current.take() {
                out.push(done.finish()?);
            }
            current = Some(ChromBuilder::new(chrom));
        }
        if let Some(builder) = current.as_mut() {
            builder.push(start, end, value, lineno)?;
        }
    }
    if let Some(done) = current.take() {
        out.push(done.finish()?);
    }
    Ok(out)
}

pub fn read_bedgraph_path<P: AsRef<Path>>(path: P) -> Result<Vec<(String, BedGraph)>> {
    read_bedgraph(BufReader::new(File::open(path)?))
}

/// Read a BED3/BED6 file into per-chromosome interval collections,
/// sorted by start within each chromosome. With fewer than 6 columns
/// every interval is forward.
pub fn read_bed<R: BufRead>(reader: R) -> Result<FxHashMap<String, Regions>> {
    let mut rows: Vec<(String, i64, i64, Strand)> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = lineno + 1;
        if skip_line(&line) {
            continue;
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 3 {
            return Err(parse_error(
                lineno,
                format!("expected at least 3 BED columns, got {}", fields.len()),
            ));
        }
        let start = parse_i64(fields[1].as_bytes(), lineno, "start")?;
        let end = parse_i64(fields[2].as_bytes(), lineno, "end")?;
        let strand = if fields.len() >= 6 {
            fields[5]
                .chars()
                .next()
                .map(Strand::from_char)
                .unwrap_or(Strand::Forward)
        } else {
            Strand::Forward
        };
        rows.push((fields[0].to_string(), start, end, strand));
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut out = FxHashMap::default();
    let mut i = 0;
    while i < rows.len() {
        let chrom = rows[i].0.clone();
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        let mut directions = Vec::new();
        while i < rows.len() && rows[i].0 == chrom {
            starts.push(rows[i].1);
            ends.push(rows[i].2);
            directions.push(rows[i].3);
            i += 1;
        }
        out.insert(chrom, Regions::new(starts, ends, directions)?);
    }
    Ok(out)
}

pub fn read_bed_path<P: AsRef<Path>>(path: P) -> Result<FxHashMap<String, Regions>> {
    read_bed(BufReader::new(File::open(path)?))
}

struct RefSeqRow {
    chrom: String,
    strand: Strand,
    tx_start: i64,
    cds_start: i64,
    cds_end: i64,
    exon_starts: Vec<i64>,
    exon_ends: Vec<i64>,
}

fn parse_int_list(field: &str, line: usize, what: &str) -> Result<Vec<i64>> {
    field
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| parse_error(line, format!("invalid {}: '{}'", what, s)))
        })
        .collect()
}

/// Read a RefSeq/refGene-style transcript table (columns: bin, name,
/// chrom, strand, txStart, txEnd, cdsStart, cdsEnd, exonCount,
/// exonStarts, exonEnds) into per-chromosome gene models.
///
/// Transcripts without a proper coding region strictly inside the
/// transcript (non-coding, or CDS touching either transcript edge) are
/// skipped; the remaining genes carry exon rows ordered 5' to 3' in
/// transcript orientation and a transcript-local CDS interval.
pub fn read_refseq<R: BufRead>(reader: R) -> Result<FxHashMap<String, Genes>> {
    let mut rows: Vec<RefSeqRow> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = lineno + 1;
        if skip_line(&line) {
            continue;
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 11 {
            return Err(parse_error(
                lineno,
                format!("expected at least 11 RefSeq columns, got {}", fields.len()),
            ));
        }
        let strand = fields[3]
            .chars()
            .next()
            .map(Strand::from_char)
            .unwrap_or(Strand::Forward);
        let row = RefSeqRow {
            chrom: fields[2].to_string(),
            strand,
            tx_start: parse_i64(fields[4].as_bytes(), lineno, "txStart")?,
            cds_start: parse_i64(fields[6].as_bytes(), lineno, "cdsStart")?,
            cds_end: parse_i64(fields[7].as_bytes(), lineno, "cdsEnd")?,
            exon_starts: parse_int_list(fields[9], lineno, "exonStarts")?,
            exon_ends: parse_int_list(fields[10], lineno, "exonEnds")?,
        };
        if row.exon_starts.is_empty() || row.exon_starts.len() != row.exon_ends.len() {
            return Err(parse_error(lineno, "malformed exon lists"));
        }
        // Keep only transcripts whose CDS sits strictly inside the
        // transcript: both UTRs non-empty.
        let first = row.exon_starts[0];
        let last = row.exon_ends[row.exon_ends.len() - 1];
        if row.cds_start > first && row.cds_end > row.cds_start && last > row.cds_end {
            rows.push(row);
        }
    }
    rows.sort_by(|a, b| a.chrom.cmp(&b.chrom).then(a.tx_start.cmp(&b.tx_start)));

    let mut out = FxHashMap::default();
    let mut i = 0;
    while i < rows.len() {
        let chrom = rows[i].chrom.clone();
        let mut exon_starts = Vec::new();
        let mut exon_ends = Vec::new();
        let mut directions = Vec::new();
        let mut offsets = vec![0usize];
        let mut cds_local_starts = Vec::new();
        let mut cds_local_ends = Vec::new();
        while i < rows.len() && rows[i].chrom == chrom {
            let row = &rows[i];
            // Exons in transcript orientation: reversed for minus-strand.
            let order: Vec<usize> = if row.strand.is_forward() {
                (0..row.exon_starts.len()).collect()
            } else {
                (0..row.exon_starts.len()).rev().collect()
            };
            let mut local_a = None;
            let mut local_b = None;
            let mut cum = 0i64;
            for &e in &order {
                let (s, en) = (row.exon_starts[e], row.exon_ends[e]);
                exon_starts.push(s);
                exon_ends.push(en);
                directions.push(row.strand);
                for (genomic, slot) in [
                    (row.cds_start, &mut local_a),
                    (row.cds_end, &mut local_b),
                ] {
                    if slot.is_none() && s <= genomic && genomic <= en {
                        let within = if row.strand.is_forward() {
                            genomic - s
                        } else {
                            en - genomic
                        };
                        *slot = Some(cum + within);
                    }
                }
                cum += en - s;
            }
            let (local_a, local_b) = match (local_a, local_b) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(TrackError::invariant(format!(
                        "CDS bounds outside exons on {}",
                        chrom
                    )))
                }
            };
            // On the minus strand the genomic CDS end is the local start.
            let (cds_start, cds_end) = if row.strand.is_forward() {
                (local_a, local_b)
            } else {
                (local_b, local_a)
            };
            cds_local_starts.push(cds_start);
            cds_local_ends.push(cds_end);
            offsets.push(exon_starts.len());
            i += 1;
        }
        let exons = Regions::new(exon_starts, exon_ends, directions)?;
        let split = SplitRegions::new(exons, offsets)?;
        let coding = Regions::forward(cds_local_starts, cds_local_ends)?;
        out.insert(chrom, Genes::new(split, coding)?);
    }
    Ok(out)
}

pub fn read_refseq_path<P: AsRef<Path>>(path: P) -> Result<FxHashMap<String, Genes>> {
    read_refseq(BufReader::new(File::open(path)?))
}

/// Tab-separated writer with zero-allocation number formatting.
pub struct TrackWriter<W: Write> {
    writer: W,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
}

impl<W: Write> TrackWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        self.writer
            .write_all(self.itoa_buf.format(n).as_bytes())
            .map_err(TrackError::Io)
    }

    #[inline]
    pub fn write_float(&mut self, f: f64) -> Result<()> {
        self.writer
            .write_all(self.ryu_buf.format(f).as_bytes())
            .map_err(TrackError::Io)
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(TrackError::Io)
    }

    #[inline]
    pub fn write_tab(&mut self) -> Result<()> {
        self.write_bytes(b"\t")
    }

    #[inline]
    pub fn write_newline(&mut self) -> Result<()> {
        self.write_bytes(b"\n")
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(TrackError::Io)
    }
}

/// Write per-chromosome signals as 4-column BEDGRAPH. Finalized signals
/// emit their implicit final segment; open-ended signals emit segments
/// between consecutive breakpoints only.
pub fn write_bedgraph<W: Write>(writer: W, tracks: &[(String, BedGraph)]) -> Result<()> {
    let mut w = TrackWriter::new(writer);
    for (chrom, signal) in tracks {
        let indices = signal.indices();
        let values = signal.values();
        let last = match signal.size() {
            Some(_) => indices.len(),
            None => indices.len().saturating_sub(1),
        };
        for k in 0..last {
            let end = if k + 1 < indices.len() {
                indices[k + 1]
            } else {
                // Finalized signal: close the last segment at the size.
                match signal.size() {
                    Some(size) => size,
                    None => break,
                }
            };
            w.write_bytes(chrom.as_bytes())?;
            w.write_tab()?;
            w.write_int(indices[k])?;
            w.write_tab()?;
            w.write_int(end)?;
            w.write_tab()?;
            w.write_float(values[k])?;
            w.write_newline()?;
        }
    }
    w.flush()
}
