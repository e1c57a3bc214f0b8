// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Dense numeric arrays and their binary container.
//!
//! Layout of an encoded array (all integers little-endian):
//!
//! ```text
//! magic    "LABARR"      6 bytes
//! version  u8            currently 1
//! dtype    u8            see `DType`
//! ndim     u32
//! shape    u64 * ndim
//! data     elements in row-major order
//! ```

use std::fmt;

use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};

const MAGIC: &[u8; 6] = b"LABARR";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2 + 4;

/// Element type of an [`ArrayValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl DType {
    fn code(self) -> u8 {
        match self {
            DType::I8 => 1,
            DType::I16 => 2,
            DType::I32 => 3,
            DType::I64 => 4,
            DType::U8 => 5,
            DType::U16 => 6,
            DType::U32 => 7,
            DType::U64 => 8,
            DType::F32 => 9,
            DType::F64 => 10,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            1 => DType::I8,
            2 => DType::I16,
            3 => DType::I32,
            4 => DType::I64,
            5 => DType::U8,
            6 => DType::U16,
            7 => DType::U32,
            8 => DType::U64,
            9 => DType::F32,
            10 => DType::F64,
            other => return Err(Error::ArrayCodec(format!("unknown dtype code {other}"))),
        })
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F32 => "float32",
            DType::F64 => "float64",
        };
        f.write_str(name)
    }
}

macro_rules! array_value {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// A dense n-dimensional numeric array.
        #[derive(Debug, Clone, PartialEq)]
        pub enum ArrayValue {
            $($variant(ArrayD<$ty>),)*
        }

        impl ArrayValue {
            /// Element type.
            pub fn dtype(&self) -> DType {
                match self {
                    $(ArrayValue::$variant(_) => DType::$variant,)*
                }
            }

            /// Array shape.
            pub fn shape(&self) -> &[usize] {
                match self {
                    $(ArrayValue::$variant(a) => a.shape(),)*
                }
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                match self {
                    $(ArrayValue::$variant(a) => a.len(),)*
                }
            }

            /// Whether the array holds no elements.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            fn write_data(&self, out: &mut Vec<u8>) {
                match self {
                    // `iter` walks in logical row-major order regardless of
                    // the memory layout.
                    $(ArrayValue::$variant(a) => {
                        for v in a.iter() {
                            out.extend_from_slice(&v.to_le_bytes());
                        }
                    })*
                }
            }

            fn read_data(dtype: DType, shape: IxDyn, data: &[u8]) -> Result<Self> {
                let shape_err = |e: ndarray::ShapeError| Error::ArrayCodec(e.to_string());
                match dtype {
                    $(DType::$variant => {
                        let values = data
                            .chunks_exact(std::mem::size_of::<$ty>())
                            .map(|c| {
                                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                                buf.copy_from_slice(c);
                                <$ty>::from_le_bytes(buf)
                            })
                            .collect();
                        ArrayD::from_shape_vec(shape, values)
                            .map(ArrayValue::$variant)
                            .map_err(shape_err)
                    })*
                }
            }
        }

        $(
            impl From<ArrayD<$ty>> for ArrayValue {
                fn from(a: ArrayD<$ty>) -> Self {
                    ArrayValue::$variant(a)
                }
            }
        )*
    };
}

array_value! {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ArrayValue {
    /// Serialize into the self-describing container.
    pub fn encode(&self) -> Vec<u8> {
        let shape = self.shape();
        let mut out =
            Vec::with_capacity(HEADER_LEN + shape.len() * 8 + self.len() * self.dtype().size());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(self.dtype().code());
        out.extend_from_slice(&(shape.len() as u32).to_le_bytes());
        for dim in shape {
            out.extend_from_slice(&(*dim as u64).to_le_bytes());
        }
        self.write_data(&mut out);
        out
    }

    /// Reconstruct an array from [`ArrayValue::encode`] output.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC[..] {
            return Err(Error::ArrayCodec("missing array header".into()));
        }
        let mut pos = MAGIC.len();
        let version = bytes[pos];
        if version != VERSION {
            return Err(Error::ArrayCodec(format!(
                "unsupported container version {version}"
            )));
        }
        let dtype = DType::from_code(bytes[pos + 1])?;
        pos += 2;
        let ndim = read_u32(bytes, pos)? as usize;
        pos += 4;

        let mut shape = Vec::with_capacity(ndim.min(64));
        let mut count: usize = 1;
        for _ in 0..ndim {
            let dim = usize::try_from(read_u64(bytes, pos)?)
                .map_err(|_| Error::ArrayCodec("dimension too large".into()))?;
            pos += 8;
            count = count
                .checked_mul(dim)
                .ok_or_else(|| Error::ArrayCodec("element count overflows".into()))?;
            shape.push(dim);
        }

        let data = &bytes[pos..];
        let expected = count
            .checked_mul(dtype.size())
            .ok_or_else(|| Error::ArrayCodec("payload size overflows".into()))?;
        if data.len() != expected {
            return Err(Error::ArrayCodec(format!(
                "expected {expected} payload bytes for {dtype} {shape:?}, found {}",
                data.len()
            )));
        }
        Self::read_data(dtype, IxDyn(&shape), data)
    }
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    bytes
        .get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::ArrayCodec("truncated header".into()))
}

fn read_u64(bytes: &[u8], pos: usize) -> Result<u64> {
    bytes
        .get(pos..pos + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| Error::ArrayCodec("truncated header".into()))
}
