use anyhow::Context;
use std::io::{BufRead, BufReader, BufWriter, Write};

/// Opens `input` for buffered reading; `stdin` reads standard input and a
/// `.gz` extension is decompressed on the fly.
///
/// ```
/// use std::io::BufRead;
/// let reader = lexichain::reader("tests/chain/anchors.tsv").unwrap();
/// assert!(reader.lines().count() > 0);
///
/// assert!(lexichain::reader("tests/chain/missing.tsv").is_err());
/// ```
pub fn reader(input: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = std::path::Path::new(input);
        let file = std::fs::File::open(path)
            .with_context(|| format!("could not open {}", path.display()))?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

pub fn writer(output: &str) -> anyhow::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        let file = std::fs::File::create(output)
            .with_context(|| format!("could not create {}", output))?;
        Box::new(BufWriter::new(file))
    };

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn test_gz_roundtrip() -> anyhow::Result<()> {
        let tempdir = tempfile::TempDir::new()?;
        let path = tempdir.path().join("a.tsv.gz");
        let file = std::fs::File::create(&path)?;
        let mut gz = GzEncoder::new(file, Compression::default());
        gz.write_all(b"line1\nline2\n")?;
        gz.finish()?;

        let lines: Vec<String> = reader(path.to_str().unwrap())?
            .lines()
            .collect::<Result<_, _>>()?;
        assert_eq!(lines, vec!["line1", "line2"]);
        Ok(())
    }

    #[test]
    fn test_writer_file() -> anyhow::Result<()> {
        let tempdir = tempfile::TempDir::new()?;
        let path = tempdir.path().join("out.txt");
        {
            let mut w = writer(path.to_str().unwrap())?;
            w.write_all(b"hello\n")?;
        }
        assert_eq!(std::fs::read_to_string(&path)?, "hello\n");
        Ok(())
    }
}
