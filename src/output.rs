//! Band-state records, one JSON object per line.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::engine::bands::BandState;

#[derive(Serialize)]
struct BandRecord<'a> {
    tick: u64,
    time: f32,
    bands: &'a [BandState],
}

pub struct BandLineWriter<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> BandLineWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    pub fn write(&mut self, tick: u64, time: f32, bands: &[BandState]) -> Result<()> {
        serde_json::to_writer(&mut self.out, &BandRecord { tick, time, bands })
            .context("Failed to serialise band states")?;
        self.out.write_all(b"\n").context("Failed to write band states")?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush().context("Failed to flush band states")?;
        Ok(self.out)
    }
}

/// `-` writes to stdout, anything else creates a file.
pub fn open_band_output(path: &Path) -> Result<BandLineWriter<Box<dyn Write>>> {
    let out: Box<dyn Write> = if path.as_os_str() == "-" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Box::new(BufWriter::new(file))
    };
    Ok(BandLineWriter::new(out))
}
