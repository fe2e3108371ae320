//! End-to-end tests: files on disk through readers, aggregation
//! commands, and writers.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;

use bgat::aggregate::{GeneProfile, TssProfile};
use bgat::coverage::coverage;
use bgat::io::{read_bed_path, read_bedgraph_path, read_refseq_path, write_bedgraph};
use bgat::{BedGraph, Regions, Track};

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).expect("Failed to create test file");
    file.write_all(content.as_bytes())
        .expect("Failed to write test file");
    path
}

const FIXTURE_BEDGRAPH: &str = "\
chr1\t0\t10\t0
chr1\t10\t15\t1
chr1\t15\t25\t2
chr1\t25\t40\t3
chr1\t40\t50\t4
";

#[test]
fn test_tss_profile_from_files() {
    let dir = TempDir::new().unwrap();
    let bedgraph = write_file(&dir, "signal.bedgraph", FIXTURE_BEDGRAPH);
    let bed = write_file(
        &dir,
        "anchors.bed",
        "chr1\t7\t8\ta\t0\t+\nchr1\t18\t19\tb\t0\t-\nchr1\t22\t23\tc\t0\t+\n",
    );

    let tracks = read_bedgraph_path(bedgraph).unwrap();
    let regions = read_bed_path(bed).unwrap();
    let cmd = TssProfile {
        figure_width: 10,
        region_size: 10,
        normalize: false,
    };
    let table = cmd.run(&tracks, &regions).unwrap();
    let want: Vec<f64> = (0..10)
        .map(|i| if i < 8 { 4.0 / 3.0 } else { 5.0 / 3.0 })
        .collect();
    assert_eq!(table.y, want);

    let mut tsv = Vec::new();
    table.write_tsv(&mut tsv).unwrap();
    let text = String::from_utf8(tsv).unwrap();
    assert!(text.starts_with("x\ty\n-5.0\t"));
    assert_eq!(text.lines().count(), 11);
}

#[test]
fn test_gene_profile_from_refseq_file() {
    let dir = TempDir::new().unwrap();
    let bedgraph = write_file(&dir, "signal.bedgraph", FIXTURE_BEDGRAPH);
    // One coding transcript: exons [10,20) and [30,40), genomic CDS
    // [15,35), which is [5,15) in transcript coordinates.
    let refseq = write_file(
        &dir,
        "genes.txt",
        "0\tNM_1\tchr1\t+\t10\t40\t15\t35\t2\t10,30,\t20,40,\n",
    );

    let tracks = read_bedgraph_path(bedgraph).unwrap();
    let genes = read_refseq_path(refseq).unwrap();
    assert_eq!(genes["chr1"].num_features(), 1);

    let cmd = GeneProfile {
        figure_width: 8,
        normalize: false,
    };
    let table = cmd.run(&tracks, &genes).unwrap();
    assert_eq!(table.y, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0]);
}

#[test]
fn test_coverage_bedgraph_roundtrip() {
    let dir = TempDir::new().unwrap();
    let reads = Regions::forward(vec![0, 5, 20], vec![10, 15, 30]).unwrap();
    let depth = coverage(&reads).unwrap().finalize(40).unwrap();

    let path = dir.path().join("depth.bedgraph");
    let file = File::create(&path).unwrap();
    write_bedgraph(file, &[("chr1".to_string(), depth.clone())]).unwrap();

    let back = read_bedgraph_path(&path).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].0, "chr1");
    let restored = &back[0].1;
    assert_eq!(restored.size(), Some(40));
    for x in 0..40 {
        assert_eq!(restored.value_at(x), depth.value_at(x), "at {}", x);
    }
}

#[test]
fn test_malformed_bedgraph_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "bad.bedgraph",
        "chr1\t0\t10\t1.0\nchr1\t5\t15\t2.0\n",
    );
    assert!(read_bedgraph_path(path).is_err());
}

#[test]
fn test_open_ended_pileup_written_without_trailing_run() {
    // An unfinalized pileup has no domain end; the writer emits only
    // the segments between breakpoints.
    let reads = Regions::forward(vec![100], vec![200]).unwrap();
    let depth = coverage(&reads).unwrap();
    let mut out = Vec::new();
    write_bedgraph(&mut out, &[("chr1".to_string(), depth)]).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "chr1\t0\t100\t0.0\nchr1\t100\t200\t1.0\n"
    );
}

#[test]
fn test_minus_strand_refseq_cds_placement() {
    let dir = TempDir::new().unwrap();
    let refseq = write_file(
        &dir,
        "genes.txt",
        "0\tNM_2\tchr2\t-\t10\t40\t15\t35\t2\t10,30,\t20,40,\n",
    );
    let genes = read_refseq_path(refseq).unwrap();
    let gene = &genes["chr2"];
    // Transcript runs right to left; genomic CDS end 35 is 5 bases into
    // the transcript, genomic CDS start 15 is 15 bases in.
    assert_eq!(gene.coding().starts(), &[5]);
    assert_eq!(gene.coding().ends(), &[15]);
}

#[test]
fn test_depth_written_then_aggregated() {
    // Pileup output is itself a signal: feed it straight back into an
    // aggregation command.
    let reads = Regions::forward(vec![0, 5, 20], vec![10, 15, 30]).unwrap();
    let depth = coverage(&reads).unwrap().finalize(40).unwrap();
    let tracks: Vec<(String, BedGraph)> = vec![("chr1".to_string(), depth)];

    let mut anchors = rustc_hash::FxHashMap::default();
    anchors.insert(
        "chr1".to_string(),
        Regions::forward(vec![7], vec![8]).unwrap(),
    );
    let cmd = TssProfile {
        figure_width: 10,
        region_size: 10,
        normalize: false,
    };
    let table = cmd.run(&tracks, &anchors).unwrap();
    // Window [2,12): depth 1 on [2,5), 2 on [5,10), 1 on [10,12).
    assert_eq!(table.y[0], 1.0);
    assert_eq!(table.y[4], 2.0);
    assert_eq!(table.y[9], 1.0);
}
