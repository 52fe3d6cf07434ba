use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use cairn_types::ObjectId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::reader::VerifyingReader;
use crate::traits::{ObjectStore, ReadMode};

const MAGIC: &[u8; 4] = b"CRN1";

/// Header size: 4 magic + 1 kind + 8 length + 4 CRC.
pub const HEADER_SIZE: usize = 17;

/// Decoded object file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ObjectHeader {
    kind: ObjectKind,
    length: u64,
}

impl ObjectHeader {
    /// On-disk format:
    /// ```text
    /// [4 bytes: magic "CRN1"]
    /// [1 byte: object kind tag]
    /// [8 bytes: content length (little-endian u64)]
    /// [4 bytes: CRC32 of the preceding 13 bytes (little-endian u32)]
    /// ```
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[4] = self.kind.tag();
        buf[5..13].copy_from_slice(&self.length.to_le_bytes());
        let crc = crc32fast::hash(&buf[..13]);
        buf[13..].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    fn decode(id: &ObjectId, buf: &[u8; HEADER_SIZE]) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::CorruptObject { id: *id, reason };

        if &buf[..4] != MAGIC {
            return Err(corrupt("bad object header magic".into()));
        }
        let expected_crc = u32::from_le_bytes([buf[13], buf[14], buf[15], buf[16]]);
        let actual_crc = crc32fast::hash(&buf[..13]);
        if expected_crc != actual_crc {
            return Err(corrupt(format!(
                "header CRC mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
            )));
        }
        let kind = ObjectKind::from_tag(buf[4])
            .ok_or_else(|| corrupt(format!("unknown object kind tag {}", buf[4])))?;
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&buf[5..13]);
        Ok(Self {
            kind,
            length: u64::from_le_bytes(len_bytes),
        })
    }
}

/// Loose-object store on the local filesystem.
///
/// Each object lives in its own file at `<root>/<first 2 hex>/<remaining 62
/// hex>`, prefixed by a CRC-protected header recording kind and length.
/// Writes go through a temporary file and an atomic rename, so a reader
/// never observes a partially written object.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) an object directory.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file that holds `id`.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// Open an object file and decode its header, leaving the file
    /// positioned at the first content byte.
    fn open_object(&self, id: &ObjectId) -> StoreResult<(File, ObjectHeader)> {
        let mut file = match File::open(self.object_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*id))
            }
            Err(e) => return Err(e.into()),
        };
        let mut buf = [0u8; HEADER_SIZE];
        match file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(StoreError::CorruptObject {
                    id: *id,
                    reason: "truncated object header".into(),
                })
            }
            Err(e) => return Err(e.into()),
        }
        let header = ObjectHeader::decode(id, &buf)?;
        Ok((file, header))
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let (file, header) = match self.open_object(id) {
            Ok(opened) => opened,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut data = Vec::with_capacity(header.length as usize);
        file.take(header.length).read_to_end(&mut data)?;
        Ok(Some(StoredObject {
            kind: header.kind,
            data,
            size: header.length,
        }))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Serialization(format!("no parent for {path:?}")))?;
        fs::create_dir_all(dir)?;

        let header = ObjectHeader {
            kind: object.kind,
            length: object.data.len() as u64,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&header.encode())?;
        tmp.write_all(&object.data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(%id, kind = %object.kind, len = object.data.len(), "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn verify_object(&self, id: &ObjectId) -> StoreResult<u64> {
        let (file, header) = self.open_object(id)?;
        let on_disk = file.metadata()?.len();
        let expected = HEADER_SIZE as u64 + header.length;
        if on_disk != expected {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!(
                    "file holds {} content bytes, header records {}",
                    on_disk.saturating_sub(HEADER_SIZE as u64),
                    header.length
                ),
            });
        }
        Ok(header.length)
    }

    fn open(&self, id: &ObjectId, _mode: ReadMode) -> StoreResult<Box<dyn Read + Send + '_>> {
        let (file, header) = self.open_object(id)?;
        let content = BufReader::new(file).take(header.length);
        Ok(Box::new(VerifyingReader::new(
            content,
            header.kind,
            *id,
            header.length,
        )))
    }
}
