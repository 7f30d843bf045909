//! Little-endian parameter dump shared by every layer.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

pub fn write_matrix(out: &mut dyn Write, m: &Matrix) -> Result<()> {
    for v in &m.data {
        out.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Fills `m` in place; its shape decides how many values are read.
pub fn read_matrix(input: &mut dyn Read, m: &mut Matrix) -> Result<()> {
    let mut buf = [0u8; 8];
    for v in m.data.iter_mut() {
        input.read_exact(&mut buf).map_err(truncated)?;
        *v = f64::from_le_bytes(buf);
    }
    Ok(())
}

pub fn write_u32(out: &mut dyn Write, v: u32) -> Result<()> {
    out.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_u32(input: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u64(out: &mut dyn Write, v: u64) -> Result<()> {
    out.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_u64(input: &mut dyn Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf).map_err(truncated)?;
    Ok(u64::from_le_bytes(buf))
}

fn truncated(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::weights("unexpected end of weights data")
    } else {
        Error::Io(e)
    }
}
