use std::fs::File;
use std::io;
use std::sync::Mutex;




/**
 * A file that many ranks may write to concurrently, each at explicit byte
 * offsets. Writes to disjoint ranges never interfere.
 */
pub trait SharedFile: Send + Sync {

    /**
     * Write as much of `bytes` as possible at `offset`, returning the number
     * of bytes written. A count smaller than `bytes.len()` means the device
     * accepted no more.
     */
    fn write_at(&self, bytes: &[u8], offset: u64) -> io::Result<usize>;

    /**
     * Flush written data to the storage device.
     */
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}




// ============================================================================
impl SharedFile for File {

    fn write_at(&self, bytes: &[u8], offset: u64) -> io::Result<usize> {
        let mut written = 0;

        while written < bytes.len() {
            match write_some_at(self, &bytes[written..], offset + written as u64) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_all()
    }
}

#[cfg(unix)]
fn write_some_at(file: &File, bytes: &[u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, bytes, offset)
}

#[cfg(windows)]
fn write_some_at(file: &File, bytes: &[u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, bytes, offset)
}




/**
 * An in-memory shared file, optionally limited to a maximum size so that
 * writes past the limit come up short, as on a full device.
 */
#[derive(Debug, Default)]
pub struct MemoryFile {
    bytes: Mutex<Vec<u8>>,
    capacity: Option<usize>,
}




// ============================================================================
impl MemoryFile {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self { bytes: Mutex::new(Vec::new()), capacity: Some(capacity) }
    }

    /**
     * Return a copy of the file contents.
     */
    pub fn contents(&self) -> Vec<u8> {
        match self.bytes.lock() {
            Ok(bytes) => bytes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SharedFile for MemoryFile {

    fn write_at(&self, bytes: &[u8], offset: u64) -> io::Result<usize> {
        let mut data = self.bytes.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?;
        let offset = offset as usize;
        let limit = self.capacity.unwrap_or(usize::MAX);
        let count = bytes.len().min(limit.saturating_sub(offset));

        if count == 0 {
            return Ok(0)
        }
        if data.len() < offset + count {
            data.resize(offset + count, 0)
        }
        data[offset..offset + count].copy_from_slice(&bytes[..count]);
        Ok(count)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{MemoryFile, SharedFile};

    #[test]
    fn out_of_order_writes_assemble() {
        let file = MemoryFile::new();
        file.write_at(&[4, 5], 3).unwrap();
        file.write_at(&[0, 1, 2], 0).unwrap();
        assert_eq!(file.contents(), vec![0, 1, 2, 4, 5]);
    }

    #[test]
    fn writes_past_capacity_are_short() {
        let file = MemoryFile::with_capacity_limit(4);
        assert_eq!(file.write_at(&[1, 2, 3], 2).unwrap(), 2);
        assert_eq!(file.write_at(&[1], 9).unwrap(), 0);
    }

    #[test]
    fn positional_writes_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let file = std::fs::File::create(&path).unwrap();
        file.write_at(b"world", 6).unwrap();
        file.write_at(b"hello ", 0).unwrap();
        file.sync().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }
}
