use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

/// Random-access byte stream a region lives in. Beyond plain I/O the
/// allocator needs to truncate the stream after packing.
pub trait RegionStream: Read + Write + Seek {
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl RegionStream for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl RegionStream for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }
}
