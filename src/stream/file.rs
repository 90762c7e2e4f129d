//! Memory-mapped file source. Mapping instead of buffered reads keeps
//! record access zero-copy all the way from the page cache, the same
//! trick the sort engine plays with its spilled chunk files.

use std::fs::File;
use std::path::Path;

use eyre::{bail, Result, WrapErr};
use memmap2::Mmap;

use crate::record::{Heading, RecordView};

use super::{RecordIter, RecordSource};

#[derive(Debug)]
pub struct MmapSource {
    mmap: Mmap,
    data_start: Option<usize>,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> Result<MmapSource> {
        let path = path.as_ref();
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open record file {}", path.display()))?;
        MmapSource::from_file(&file)
    }

    pub fn from_file(file: &File) -> Result<MmapSource> {
        // Safety: the map is read-only and private; a concurrent writer
        // would corrupt the stream no matter how we read it.
        let mmap = unsafe { Mmap::map(file) }.wrap_err("failed to map record file")?;
        Ok(MmapSource {
            mmap,
            data_start: None,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl RecordSource for MmapSource {
    fn heading(&mut self) -> Result<Heading> {
        let mut iter = RecordIter::new(&self.mmap, 1);
        let Some(view) = iter.next()? else {
            bail!("record file is empty, no heading record");
        };
        let heading = Heading::parse(&view)?;
        self.data_start = Some(view.byte_len());
        Ok(heading)
    }

    fn for_each_record(&mut self, f: &mut dyn FnMut(&RecordView<'_>) -> bool) -> Result<bool> {
        let Some(start) = self.data_start else {
            bail!("records requested before the heading was read");
        };
        let mut iter = RecordIter::new(&self.mmap[start..], 1);
        while let Some(view) = iter.next()? {
            if !f(&view) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::write_record;
    use std::io::Write;

    #[test]
    fn reads_records_through_the_map() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, &[b"string:name"]);
        write_record(&mut bytes, &[b"Bach"]);
        write_record(&mut bytes, &[b"Abel"]);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let mut source = MmapSource::open(file.path()).unwrap();
        let heading = source.heading().unwrap();
        assert_eq!(heading.column(0).name, "name");

        let mut names = Vec::new();
        source
            .for_each_record(&mut |view| {
                names.push(view.field(0).unwrap().to_vec());
                true
            })
            .unwrap();
        assert_eq!(names, vec![b"Bach".to_vec(), b"Abel".to_vec()]);
    }

    #[test]
    fn missing_file_fails_with_path() {
        let err = MmapSource::open("/nonexistent/records.bin").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/records.bin"));
    }
}
