//! Bulk export/import to a fixed-layout binary format (§4.H, §6).
//!
//! Little-endian throughout, written by hand with `to_le_bytes`/`read_exact`
//! rather than a serde format — the header is a fixed 40-byte packed struct
//! and vector records are fixed-width, so there is nothing a schema-aware
//! serializer buys us here; this mirrors how the closest reference
//! implementation in the retrieved corpus hand-rolls its binary HNSW dump.
//!
//! Only vectors are persisted — graph topology is rebuilt by re-inserting on
//! import (see the design notes' open question on HNSW topology
//! persistence).

use std::io::{BufReader, BufWriter, Read, Write};

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::vector::VectorRecord;

pub const MAGIC_FLAT: u32 = 0x464C_5449;
pub const MAGIC_HNSW: u32 = 0x484E_5357;
pub const MAGIC_VECTORS_ONLY: u32 = 0x464C_5000;

const HEADER_LEN: u16 = 40;
const FORMAT_VERSION: (u8, u8, u8) = (1, 0, 0);

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub magic: u32,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub hsize: u8,
    pub elements: u32,
    pub method: u16,
    pub dims: u16,
    pub only_vectors: u16,
    pub dims_aligned: u16,
    pub vsize: u16,
    pub nsize: u16,
    pub voff: u64,
    pub noff: u64,
}

impl Header {
    fn for_vectors_only(magic: u32, metric: Metric, dims: usize, dims_aligned: usize, elements: u32) -> Self {
        let vsize = 16 + dims_aligned as u16 * 4;
        Self {
            magic,
            major: FORMAT_VERSION.0,
            minor: FORMAT_VERSION.1,
            patch: FORMAT_VERSION.2,
            hsize: 0,
            elements,
            method: metric.code(),
            dims: dims as u16,
            only_vectors: 1,
            dims_aligned: dims_aligned as u16,
            vsize,
            nsize: 0,
            voff: HEADER_LEN as u64,
            noff: 0,
        }
    }

    fn write(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(&self.magic.to_le_bytes())?;
        w.write_all(&[self.major, self.minor, self.patch, self.hsize])?;
        w.write_all(&self.elements.to_le_bytes())?;
        w.write_all(&self.method.to_le_bytes())?;
        w.write_all(&self.dims.to_le_bytes())?;
        w.write_all(&self.only_vectors.to_le_bytes())?;
        w.write_all(&self.dims_aligned.to_le_bytes())?;
        w.write_all(&self.vsize.to_le_bytes())?;
        w.write_all(&self.nsize.to_le_bytes())?;
        w.write_all(&self.voff.to_le_bytes())?;
        w.write_all(&self.noff.to_le_bytes())?;
        Ok(())
    }

    fn read(r: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        let magic = u32::from_le_bytes(magic);

        let mut version_hsize = [0u8; 4];
        r.read_exact(&mut version_hsize)?;
        let [major, minor, patch, hsize] = version_hsize;

        let mut u32buf = [0u8; 4];
        r.read_exact(&mut u32buf)?;
        let elements = u32::from_le_bytes(u32buf);

        let mut u16buf = [0u8; 2];
        let mut read_u16 = |r: &mut _| -> Result<u16> {
            r.read_exact(&mut u16buf)?;
            Ok(u16::from_le_bytes(u16buf))
        };
        let method = read_u16(r)?;
        let dims = read_u16(r)?;
        let only_vectors = read_u16(r)?;
        let dims_aligned = read_u16(r)?;
        let vsize = read_u16(r)?;
        let nsize = read_u16(r)?;

        let mut u64buf = [0u8; 8];
        r.read_exact(&mut u64buf)?;
        let voff = u64::from_le_bytes(u64buf);
        r.read_exact(&mut u64buf)?;
        let noff = u64::from_le_bytes(u64buf);

        Ok(Self {
            magic,
            major,
            minor,
            patch,
            hsize,
            elements,
            method,
            dims,
            only_vectors,
            dims_aligned,
            vsize,
            nsize,
            voff,
            noff,
        })
    }
}

fn write_record(w: &mut impl Write, record: &VectorRecord, dims_aligned: usize) -> Result<()> {
    w.write_all(&record.id.to_le_bytes())?;
    w.write_all(&record.tag.to_le_bytes())?;
    debug_assert_eq!(record.values.len(), dims_aligned);
    for &v in &record.values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_record(r: &mut impl Read, dims_aligned: usize) -> Result<VectorRecord> {
    let mut u64buf = [0u8; 8];
    r.read_exact(&mut u64buf)?;
    let id = u64::from_le_bytes(u64buf);
    r.read_exact(&mut u64buf)?;
    let tag = u64::from_le_bytes(u64buf);

    let mut values = Vec::with_capacity(dims_aligned);
    let mut f32buf = [0u8; 4];
    for _ in 0..dims_aligned {
        r.read_exact(&mut f32buf)?;
        values.push(f32::from_le_bytes(f32buf));
    }
    Ok(VectorRecord::new(id, tag, values))
}

/// Write every record in `records` to `w` as a vectors-only export.
pub fn export_vectors(
    w: impl Write,
    magic: u32,
    metric: Metric,
    dims: usize,
    dims_aligned: usize,
    records: &[VectorRecord],
) -> Result<()> {
    let mut bw = BufWriter::new(w);
    let header = Header::for_vectors_only(magic, metric, dims, dims_aligned, records.len() as u32);
    header.write(&mut bw)?;
    for record in records {
        write_record(&mut bw, record, dims_aligned)?;
    }
    bw.flush()?;
    Ok(())
}

/// Parsed result of [`import_vectors`]: the file's declared metric/dims plus
/// every vector record it contained.
pub struct Imported {
    pub metric: Metric,
    pub dims: usize,
    pub dims_aligned: usize,
    pub records: Vec<VectorRecord>,
}

/// Read a vectors-only export back out. Accepts any of the three magic
/// values as long as `only_vectors` is set — this crate never writes
/// topology, so a `FLAT` or `HNSW` tagged file and a generic
/// `VECTORS-ONLY` one are interchangeable on import.
pub fn import_vectors(r: impl Read) -> Result<Imported> {
    let mut br = BufReader::new(r);
    let header = Header::read(&mut br)?;

    if header.magic != MAGIC_FLAT && header.magic != MAGIC_HNSW && header.magic != MAGIC_VECTORS_ONLY {
        return Err(Error::InvalidFile(format!("unrecognized magic {:#x}", header.magic)));
    }
    if header.only_vectors == 0 {
        return Err(Error::InvalidFile("file contains graph topology, which this crate cannot load".into()));
    }
    let metric = Metric::from_code(header.method)
        .ok_or_else(|| Error::InvalidFile(format!("unrecognized metric code {}", header.method)))?;

    let dims = header.dims as usize;
    let dims_aligned = header.dims_aligned as usize;
    let expected_vsize = 16 + dims_aligned as u16 * 4;
    if header.vsize != expected_vsize {
        return Err(Error::InvalidFile(format!(
            "record size mismatch: header says {}, expected {expected_vsize}",
            header.vsize
        )));
    }

    let mut records = Vec::with_capacity(header.elements as usize);
    for _ in 0..header.elements {
        records.push(read_record(&mut br, dims_aligned)?);
    }

    Ok(Imported {
        metric,
        dims,
        dims_aligned,
        records,
    })
}
