use ringbuffer::{AllocRingBuffer, RingBuffer};

use std::{
    hash::Hasher,
    io::{self, ErrorKind},
};

pub trait Serializable {
    fn serialize<TWriter: io::Write>(&self, output_stream: &mut TWriter) -> io::Result<()>;
    fn deserialize<TReader: io::Seek + io::Read>(input_stream: &mut TReader) -> io::Result<Self>
    where
        Self: Sized;
}

// Common binary helpers (little-endian)
pub fn write_u8(w: &mut dyn io::Write, v: u8) -> io::Result<()> {
    w.write_all(&[v])
}
pub fn write_u64(w: &mut dyn io::Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}
pub fn write_var_u64(w: &mut dyn io::Write, mut v: u64) -> io::Result<()> {
    while v >= 0x80 {
        // Set continuation bit
        let b = ((v as u8) & 0x7F) | 0x80;
        w.write_all(&[b])?;
        v >>= 7;
    }
    w.write_all(&[v as u8])?;
    Ok(())
}
pub fn write_len_prefixed_bytes(w: &mut dyn io::Write, bytes: &[u8]) -> io::Result<()> {
    write_var_u64(w, bytes.len() as u64)?;
    w.write_all(bytes)
}
pub fn write_len_prefixed_str(w: &mut dyn io::Write, s: &str) -> io::Result<()> {
    write_len_prefixed_bytes(w, s.as_bytes())
}

pub fn read_u8(r: &mut dyn io::Read) -> io::Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}
pub fn read_u64(r: &mut dyn io::Read) -> io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}
pub fn read_var_u64(r: &mut dyn io::Read) -> io::Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Varint too long",
            ));
        }
        let byte = read_u8(r)?;
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}
pub fn read_exact_array<const N: usize>(r: &mut dyn io::Read) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
pub fn read_len_prefixed_vec(r: &mut dyn io::Read) -> io::Result<Vec<u8>> {
    let len = read_var_u64(r)? as usize;
    let mut v = vec![0u8; len];
    r.read_exact(&mut v)?;
    Ok(v)
}
pub fn read_len_prefixed_string(r: &mut dyn io::Read) -> io::Result<String> {
    let v = read_len_prefixed_vec(r)?;
    String::from_utf8(v).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid UTF-8"))
}

// Magic identifiers for binary blobs (4 bytes)
pub enum Magic {
    ReadingDictionary,
}

impl Magic {
    pub fn as_bytes(&self) -> &'static [u8; 4] {
        match self {
            Magic::ReadingDictionary => b"RD01",
        }
    }

    pub fn write(&self, w: &mut dyn io::Write) -> io::Result<()> {
        w.write_all(self.as_bytes())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
}

impl Version {
    pub fn write_version(&self, w: &mut dyn io::Write) -> io::Result<()> {
        write_u8(w, 1)
    }
    pub fn read_version(r: &mut dyn io::Read) -> io::Result<Self> {
        let v = read_u8(r)?;
        if v == 1 {
            Ok(Version::V1)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Unsupported version",
            ))
        }
    }
}

pub struct ChecksumedWriter<'a> {
    backing_writer: &'a mut dyn io::Write,
    hasher: fnv::FnvHasher,
}

impl<'a> ChecksumedWriter<'a> {
    pub fn create(backing_writer: &'a mut dyn io::Write) -> Self {
        ChecksumedWriter {
            backing_writer,
            hasher: fnv::FnvHasher::default(),
        }
    }

    pub fn current_hash(&self) -> u64 {
        self.hasher.finish()
    }
}

impl<'a> io::Write for ChecksumedWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.write(buf);

        self.backing_writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.backing_writer.flush()
    }
}

/// Checks the trailing whole-file fnv hash and rewinds the reader.
///
/// The file length is not known upfront, so the scan keeps the last 8 bytes
/// (the stored hash) and the hash state as it was 8 bytes earlier.
pub fn validate_hash<T: io::Seek + io::Read>(reader: &mut T) -> io::Result<bool> {
    let mut hasher = fnv::FnvHasher::default();

    let mut tail_bytes = AllocRingBuffer::new(8);
    let mut tail_hashes = AllocRingBuffer::new(9);
    let mut b = [0u8; 1];
    loop {
        match reader.read_exact(&mut b) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        }

        tail_bytes.enqueue(b[0]);
        hasher.write(&b);
        tail_hashes.enqueue(hasher.finish());
    }

    reader.seek(io::SeekFrom::Start(0))?;

    if tail_bytes.len() < 8 || tail_hashes.len() < 9 {
        return Err(io::Error::new(ErrorKind::InvalidData, "Not enough data"));
    }

    let stored_hash = u64::from_le_bytes(
        tail_bytes
            .into_iter()
            .collect::<Vec<_>>()
            .try_into()
            .unwrap(), // Capacity is exactly 8 and fill was checked above
    );
    let computed_hash = *tail_hashes.front().unwrap(); // Fill checked above

    Ok(stored_hash == computed_hash)
}
