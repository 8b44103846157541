use anyhow::{Context, Result};
use memmap2::Mmap;
use serde::{Serialize, de::DeserializeOwned};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl FileContent {
    fn bytes(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => &mmap[..],
            FileContent::Buffered(buf) => buf.as_slice(),
        }
    }

    /// Decode as UTF-8, replacing invalid sequences rather than failing.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: the mapping is read-only and dropped before the run ends
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Read a source file as text, or `None` when it is missing or unreadable.
/// Invalid UTF-8 sequences are dropped, so `caf\xe9(` reads as `caf(`.
pub fn read_source_lossy(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match read_file_smart(path) {
        Ok(content) => Some(match content.text() {
            Cow::Borrowed(text) => text.to_owned(),
            // Only decoding errors allocate; strip their replacement marks
            Cow::Owned(text) => text.replace(char::REPLACEMENT_CHARACTER, ""),
        }),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "source unreadable");
            None
        }
    }
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))
}

/// Write `value` as pretty-printed JSON (2-space indent).
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to serialize JSON to {}", path.display()))?;
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
