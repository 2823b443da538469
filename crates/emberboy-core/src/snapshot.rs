//! Flat save-state format.
//!
//! A snapshot is a magic/version header followed by every piece of mutable
//! machine state in one fixed order: CPU, interrupt controller, timer,
//! serial, joypad, fabric RAM, cartridge (RAM + mapper registers + RTC),
//! PPU, then APU. The field order is the format contract; reordering any
//! field is a breaking format change. Derived caches (tile pixels, APU
//! output stages, the matched-IRQ byte) are not stored and are rebuilt on
//! decode. Snapshots are only taken and restored at instruction boundaries.

use thiserror::Error;

use crate::gameboy::GameBoy;

pub(crate) const MAGIC: &[u8; 4] = b"EMBS";
pub(crate) const VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("not a snapshot (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),
    #[error("snapshot truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("snapshot does not match the loaded machine ({0})")]
    Mismatch(&'static str),
}

/// Sequential little-endian field writer.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(0x20000);
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        Self { buf }
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn words(&mut self, v: &[u32]) {
        for w in v {
            self.u32(*w);
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequential field reader over a snapshot payload.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, SnapshotError> {
        if data.len() < 5 || &data[..4] != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        if data[4] != VERSION {
            return Err(SnapshotError::UnsupportedVersion(data[4]));
        }
        Ok(Self { data, pos: 5 })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(SnapshotError::Truncated { offset: self.pos }),
        }
    }

    pub fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, SnapshotError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> Result<u16, SnapshotError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn u32(&mut self) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> Result<u64, SnapshotError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn i32(&mut self) -> Result<i32, SnapshotError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        self.take(len)
    }

    pub fn words(&mut self, out: &mut [u32]) -> Result<(), SnapshotError> {
        for w in out.iter_mut() {
            *w = self.u32()?;
        }
        Ok(())
    }
}

/// Encode the full machine state.
pub fn save(gb: &GameBoy) -> Vec<u8> {
    let mut w = Writer::new();
    gb.save_state(&mut w);
    w.finish()
}

/// Restore machine state in place. The same cartridge must already be
/// loaded; ROM bytes are not part of the snapshot.
pub fn load(gb: &mut GameBoy, data: &[u8]) -> Result<(), SnapshotError> {
    let mut r = Reader::new(data)?;
    gb.load_state(&mut r)
}
