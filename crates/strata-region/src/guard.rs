use log::warn;
use std::io::{self, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

/// Scoped cursor guard: remembers the stream position on creation and seeks
/// back to it when dropped, on success and error paths alike.
pub struct RetainPosition<'a, S: Seek> {
    stream: &'a mut S,
    pos: u64,
}

impl<'a, S: Seek> RetainPosition<'a, S> {
    pub fn new(stream: &'a mut S) -> io::Result<Self> {
        let pos = stream.stream_position()?;
        Ok(RetainPosition { stream, pos })
    }

    /// Position that will be restored.
    pub fn retained(&self) -> u64 {
        self.pos
    }
}

impl<S: Seek> Deref for RetainPosition<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: Seek> DerefMut for RetainPosition<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: Seek> Drop for RetainPosition<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.stream.seek(SeekFrom::Start(self.pos)) {
            warn!("Failed to restore stream position {}: {}", self.pos, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};

    #[test]
    fn test_restores_after_io() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        cursor.set_position(10);
        {
            let mut guard = RetainPosition::new(&mut cursor).unwrap();
            guard.seek(SeekFrom::Start(40)).unwrap();
            guard.write_all(&[1, 2, 3]).unwrap();
            assert_eq!(guard.retained(), 10);
        }
        assert_eq!(cursor.position(), 10);
        assert_eq!(&cursor.get_ref()[40..43], &[1, 2, 3]);
    }

    #[test]
    fn test_restores_on_error_path() {
        fn failing(cursor: &mut Cursor<Vec<u8>>) -> io::Result<()> {
            let mut guard = RetainPosition::new(cursor)?;
            guard.seek(SeekFrom::Start(60))?;
            let mut buf = [0u8; 16];
            guard.read_exact(&mut buf)?;
            Ok(())
        }

        let mut cursor = Cursor::new(vec![0u8; 64]);
        cursor.set_position(5);
        assert!(failing(&mut cursor).is_err());
        assert_eq!(cursor.position(), 5);
    }
}
