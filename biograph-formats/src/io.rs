//! Shared file I/O: compression-aware readers and archive handling
//!
//! Plain and gzip inputs stream through `BufRead`. Tar archives are a
//! packaging convenience: members are buffered whole on open (an archive
//! entry cannot outlive its archive reader), then streamed line-by-line.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;

use crate::options::Compression;
use biograph_core::{Error, Result};

/// Open one input path as a buffered reader, decompressing gzip either
/// when configured or when the extension says so.
pub fn open_reader(path: &Path, compression: Compression) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .map_err(|e| Error::config(format!("cannot open {}: {}", path.display(), e)))?;
    let gz = compression == Compression::Gz
        || path.extension().is_some_and(|ext| ext == "gz");
    if gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A buffered archive member: file name plus contents.
pub struct ArchiveMember {
    pub name: String,
    pub content: String,
}

/// Read every regular-file member of a tar / tar.gz archive.
pub fn read_archive(path: &Path, compression: Compression) -> Result<Vec<ArchiveMember>> {
    let file = File::open(path)
        .map_err(|e| Error::config(format!("cannot open {}: {}", path.display(), e)))?;
    let reader: Box<dyn Read> = match compression {
        Compression::TarGz => Box::new(MultiGzDecoder::new(file)),
        Compression::Tar => Box::new(file),
        _ => {
            return Err(Error::config(format!(
                "{} is not an archive compression",
                path.display()
            )))
        }
    };
    let mut archive = tar::Archive::new(reader);
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()?
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        members.push(ArchiveMember { name, content });
    }
    Ok(members)
}

/// Combine finished output files into `<base>.tar` / `<base>.tar.gz`,
/// removing the originals (the archive replaces them).
pub fn archive_outputs(
    base: &Path,
    files: &[PathBuf],
    compression: Compression,
) -> Result<()> {
    let (suffix, gz) = match compression {
        Compression::Tar => ("tar", false),
        Compression::TarGz => ("tar.gz", true),
        _ => return Ok(()),
    };
    let archive_path = PathBuf::from(format!("{}.{}", base.display(), suffix));
    let out = File::create(&archive_path)?;
    let writer: Box<dyn std::io::Write> = if gz {
        Box::new(GzEncoder::new(out, GzLevel::default()))
    } else {
        Box::new(out)
    };
    let mut builder = tar::Builder::new(writer);
    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::config(format!("bad output name: {}", file.display())))?;
        let mut fh = File::open(file)?;
        builder.append_file(name, &mut fh)?;
    }
    builder.into_inner()?.flush()?;
    for file in files {
        let _ = std::fs::remove_file(file);
    }
    Ok(())
}

/// Derive the sibling `<base>_nodes.<ext>` / `<base>_edges.<ext>` pair a
/// two-file format writes.
pub fn node_edge_paths(base: &Path, extension: &str) -> (PathBuf, PathBuf) {
    let stem = base.to_string_lossy();
    (
        PathBuf::from(format!("{}_nodes.{}", stem, extension)),
        PathBuf::from(format!("{}_edges.{}", stem, extension)),
    )
}

/// Does this file name look like a node file / an edge file of the
/// given extension? Used to classify multi-file inputs.
pub fn classify_input(name: &str) -> Option<RecordFileKind> {
    if name.contains("nodes") {
        Some(RecordFileKind::Nodes)
    } else if name.contains("edges") {
        Some(RecordFileKind::Edges)
    } else {
        None
    }
}

/// Whether a file carries node records or edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFileKind {
    Nodes,
    Edges,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_reader_gz_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), GzLevel::default());
        enc.write_all(b"hello\nworld\n").unwrap();
        enc.finish().unwrap();

        let reader = open_reader(&path, Compression::None).unwrap();
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn test_archive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("g_nodes.tsv");
        let b = dir.path().join("g_edges.tsv");
        std::fs::write(&a, "id\nX:1\n").unwrap();
        std::fs::write(&b, "id\ne1\n").unwrap();

        let base = dir.path().join("g");
        archive_outputs(&base, &[a.clone(), b.clone()], Compression::TarGz).unwrap();
        assert!(!a.exists());

        let members =
            read_archive(&dir.path().join("g.tar.gz"), Compression::TarGz).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "g_nodes.tsv");
        assert!(members[0].content.starts_with("id"));
    }

    #[test]
    fn test_classify_input() {
        assert_eq!(classify_input("g_nodes.tsv"), Some(RecordFileKind::Nodes));
        assert_eq!(classify_input("g_edges.tsv"), Some(RecordFileKind::Edges));
        assert_eq!(classify_input("other.tsv"), None);
    }
}
