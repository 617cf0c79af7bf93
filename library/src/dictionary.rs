use std::collections::BTreeMap;
use std::io::{self, Cursor};

use crate::serialization::{
    ChecksumedWriter, Magic, Serializable, Version, read_exact_array, read_len_prefixed_string,
    read_len_prefixed_vec, read_u64, read_var_u64, validate_hash, write_len_prefixed_bytes,
    write_len_prefixed_str, write_u64, write_var_u64,
};

pub mod import;
pub mod store;

/// Persistent surface→reading dictionary feeding the offline reading
/// provider.
pub struct ReadingDictionary {
    pub language: String,
    readings: BTreeMap<String, String>,
}

impl ReadingDictionary {
    pub fn create(language: String) -> Self {
        Self {
            language,
            readings: BTreeMap::new(),
        }
    }

    /// Registers a reading. The first registered reading for a surface form
    /// wins; returns whether the entry was new.
    pub fn add_reading(&mut self, surface: &str, reading: &str) -> bool {
        if self.readings.contains_key(surface) {
            return false;
        }
        self.readings.insert(surface.to_owned(), reading.to_owned());
        true
    }

    pub fn merge(&mut self, other: Self) {
        for (surface, reading) in other.readings {
            self.readings.entry(surface).or_insert(reading);
        }
    }

    pub fn reading(&self, surface: &str) -> Option<&str> {
        self.readings.get(surface).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.readings
            .iter()
            .map(|(surface, reading)| (surface.as_str(), reading.as_str()))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl Serializable for ReadingDictionary {
    fn serialize<TWriter: io::Write>(&self, output_stream: &mut TWriter) -> io::Result<()> {
        // Binary format RD01 v1 (little-endian):
        // magic[4] = RD01
        // u8 version = 1
        // Metadata section
        //   u64 metadata hash
        //   metadata payload (len-prefixed):
        //     language (len-prefixed string)
        //     u64 entries_count
        // Data section (len-prefixed, zstd compressed):
        //   repeat entries_count times:
        //     surface (len-prefixed string)
        //     reading (len-prefixed string)
        // u64 fnv1 hash of the entire file except the hash itself

        let mut hashing_stream = ChecksumedWriter::create(output_stream);

        Magic::ReadingDictionary.write(&mut hashing_stream)?;
        Version::V1.write_version(&mut hashing_stream)?;

        let mut metadata_buf = Vec::new();
        let mut metadata_hasher = ChecksumedWriter::create(&mut metadata_buf);
        write_len_prefixed_str(&mut metadata_hasher, &self.language)?;
        write_var_u64(&mut metadata_hasher, self.readings.len() as u64)?;

        let metadata_hash = metadata_hasher.current_hash();
        write_u64(&mut hashing_stream, metadata_hash)?;
        write_len_prefixed_bytes(&mut hashing_stream, &metadata_buf)?;

        // Entries; BTreeMap iteration keeps the blob deterministic
        let mut entries_buf = Vec::new();
        for (surface, reading) in &self.readings {
            write_len_prefixed_str(&mut entries_buf, surface)?;
            write_len_prefixed_str(&mut entries_buf, reading)?;
        }
        let encoded = zstd::stream::encode_all(entries_buf.as_slice(), 5)?;
        write_len_prefixed_bytes(&mut hashing_stream, &encoded)?;

        let hash = hashing_stream.current_hash();
        write_u64(output_stream, hash)?;

        output_stream.flush()?;

        Ok(())
    }

    fn deserialize<TReader: io::Seek + io::Read>(input_stream: &mut TReader) -> io::Result<Self>
    where
        Self: Sized,
    {
        let hash_valid = validate_hash(input_stream)?;
        if !hash_valid {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Invalid hash"));
        }

        let magic = read_exact_array::<4>(input_stream)?;
        if &magic != Magic::ReadingDictionary.as_bytes() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Invalid magic"));
        }
        Version::read_version(input_stream)?; // ensure supported

        // Metadata hash only matters for metadata-only readers
        _ = read_u64(input_stream)?;

        let metadata_buf = read_len_prefixed_vec(input_stream)?;
        let mut metadata = Cursor::new(metadata_buf);
        let language = read_len_prefixed_string(&mut metadata)?;
        let entries_count = read_var_u64(&mut metadata)? as usize;

        let encoded = read_len_prefixed_vec(input_stream)?;
        let entries_buf = zstd::stream::decode_all(encoded.as_slice())?;
        let mut entries = Cursor::new(entries_buf);

        let mut readings = BTreeMap::new();
        for _ in 0..entries_count {
            let surface = read_len_prefixed_string(&mut entries)?;
            let reading = read_len_prefixed_string(&mut entries)?;
            readings.insert(surface, reading);
        }

        Ok(ReadingDictionary { language, readings })
    }
}

#[cfg(test)]
mod dictionary_tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn first_reading_wins() {
        let mut d = ReadingDictionary::create("jpn".to_owned());
        assert!(d.add_reading("猫", "ねこ"));
        assert!(!d.add_reading("猫", "ネコ"));
        assert_eq!(d.reading("猫"), Some("ねこ"));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn merge_keeps_own_entries() {
        let mut d = ReadingDictionary::create("jpn".to_owned());
        d.add_reading("猫", "ねこ");

        let mut other = ReadingDictionary::create("jpn".to_owned());
        other.add_reading("猫", "ネコ");
        other.add_reading("犬", "いぬ");

        d.merge(other);
        assert_eq!(d.len(), 2);
        assert_eq!(d.reading("猫"), Some("ねこ"));
        assert_eq!(d.reading("犬"), Some("いぬ"));
    }

    #[test]
    fn serialize_deserialize_round_trip() {
        let mut d = ReadingDictionary::create("jpn".to_owned());
        d.add_reading("電車", "でんしゃ");
        d.add_reading("日本語", "にほんご");
        d.add_reading("猫", "ねこ");

        let mut buffer: Vec<u8> = vec![];
        d.serialize(&mut buffer).unwrap();

        let mut cursor = Cursor::new(buffer);
        let d2 = ReadingDictionary::deserialize(&mut cursor).unwrap();

        assert_eq!(d2.language, "jpn");
        assert_eq!(d2.len(), 3);
        assert_eq!(d2.reading("電車"), Some("でんしゃ"));
        assert_eq!(d2.reading("日本語"), Some("にほんご"));
        assert_eq!(d2.reading("猫"), Some("ねこ"));
    }

    #[test]
    fn empty_dictionary_round_trip() {
        let d = ReadingDictionary::create("jpn".to_owned());
        let mut buffer: Vec<u8> = vec![];
        d.serialize(&mut buffer).unwrap();

        let mut cursor = Cursor::new(buffer);
        let d2 = ReadingDictionary::deserialize(&mut cursor).unwrap();
        assert!(d2.is_empty());
        assert_eq!(d2.language, "jpn");
    }

    #[test]
    fn corruption_is_detected() {
        let mut d = ReadingDictionary::create("jpn".to_owned());
        d.add_reading("電車", "でんしゃ");

        let mut buffer: Vec<u8> = vec![];
        d.serialize(&mut buffer).unwrap();

        buffer[12] ^= 0xFF;

        let mut cursor = Cursor::new(buffer);
        assert!(ReadingDictionary::deserialize(&mut cursor).is_err());
    }
}
