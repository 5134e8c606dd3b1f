/*!
 * JSON writer for snapshots and change sets
 */

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Pretty-printing JSON writer
///
/// Documents are always written whole: a snapshot with skipped nodes is
/// still a complete, valid array.
pub struct JsonWriter<W: Write> {
    inner: W,
}

impl JsonWriter<BufWriter<File>> {
    /// Writer targeting a newly created file
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl JsonWriter<io::StdoutLock<'static>> {
    /// Writer targeting stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout().lock())
    }
}

impl<W: Write> JsonWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serialize one document with two-space indentation and a trailing newline
    pub fn write<T: Serialize + ?Sized>(&mut self, document: &T) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.inner, document)?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entry;

    #[test]
    fn test_snapshot_document_is_an_indented_array() {
        let entries = vec![Entry {
            path: "/a".to_string(),
            size: 1,
            mode: "-rw-r--r--".to_string(),
            mod_time: None,
            is_dir: false,
            symlink_target: None,
            owner: "(0)".to_string(),
            group: "(0)".to_string(),
            content_hash: None,
        }];

        let mut writer = JsonWriter::new(Vec::new());
        writer.write(&entries).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();

        assert!(output.starts_with("[\n  {\n    \"path\": \"/a\""));
        assert!(output.ends_with("]\n"));
    }
}
