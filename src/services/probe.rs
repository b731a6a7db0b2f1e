//! Image dimension probe.
//!
//! Reads just enough of an image container's header to recover the encoded
//! pixel size. Nothing is decoded, so probing stays cheap and does not depend
//! on which codec the service used to produce the bytes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const VP8_START_CODE: &[u8] = &[0x9d, 0x01, 0x2a];
const VP8L_SIGNATURE: u8 = 0x2f;

/// Container formats the service can return (it echoes the source format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Webp,
}

/// Pixel size read from a container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbedDimensions {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for ProbedDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Unrecognized image container")]
    Unrecognized,

    #[error("{format} data truncated before dimension fields")]
    Truncated { format: ImageFormat },

    #[error("Invalid {format} header: {reason}")]
    Invalid {
        format: ImageFormat,
        reason: &'static str,
    },
}

/// Detect the container and read its encoded width and height.
pub fn probe(bytes: &[u8]) -> Result<ProbedDimensions, ProbeError> {
    let format = sniff(bytes).ok_or(ProbeError::Unrecognized)?;
    let (width, height) = match format {
        ImageFormat::Png => png(bytes)?,
        ImageFormat::Jpeg => jpeg(bytes)?,
        ImageFormat::Gif => gif(bytes)?,
        ImageFormat::Bmp => bmp(bytes)?,
        ImageFormat::Webp => webp(bytes)?,
    };

    if width == 0 || height == 0 {
        return Err(ProbeError::Invalid {
            format,
            reason: "zero-sized image",
        });
    }

    Ok(ProbedDimensions {
        format,
        width,
        height,
    })
}

/// Identify the container from its magic bytes.
pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(&[0xff, 0xd8]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if bytes.starts_with(b"BM") {
        Some(ImageFormat::Bmp)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

fn slice(bytes: &[u8], at: usize, len: usize, format: ImageFormat) -> Result<&[u8], ProbeError> {
    bytes
        .get(at..at + len)
        .ok_or(ProbeError::Truncated { format })
}

fn u16_be(bytes: &[u8], at: usize, format: ImageFormat) -> Result<u16, ProbeError> {
    let b = slice(bytes, at, 2, format)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn u16_le(bytes: &[u8], at: usize, format: ImageFormat) -> Result<u16, ProbeError> {
    let b = slice(bytes, at, 2, format)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn u32_be(bytes: &[u8], at: usize, format: ImageFormat) -> Result<u32, ProbeError> {
    let b = slice(bytes, at, 4, format)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn u32_le(bytes: &[u8], at: usize, format: ImageFormat) -> Result<u32, ProbeError> {
    let b = slice(bytes, at, 4, format)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn u24_le(bytes: &[u8], at: usize, format: ImageFormat) -> Result<u32, ProbeError> {
    let b = slice(bytes, at, 3, format)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

/// IHDR must be the first chunk: length, type, then width and height.
fn png(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    let format = ImageFormat::Png;
    if slice(bytes, 12, 4, format)? != b"IHDR" {
        return Err(ProbeError::Invalid {
            format,
            reason: "first chunk is not IHDR",
        });
    }
    Ok((u32_be(bytes, 16, format)?, u32_be(bytes, 20, format)?))
}

/// Walk marker segments until the first start-of-frame.
fn jpeg(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    let format = ImageFormat::Jpeg;
    let mut pos = 2;

    loop {
        if slice(bytes, pos, 1, format)?[0] != 0xff {
            return Err(ProbeError::Invalid {
                format,
                reason: "expected marker",
            });
        }
        // Any number of 0xFF fill bytes may precede a marker code.
        while slice(bytes, pos, 1, format)?[0] == 0xff {
            pos += 1;
        }
        let marker = bytes[pos];
        pos += 1;

        match marker {
            // Standalone markers carry no length.
            0x01 | 0xd0..=0xd7 => continue,
            0xd9 | 0xda => {
                return Err(ProbeError::Invalid {
                    format,
                    reason: "no frame header before scan data",
                })
            }
            // SOF0..SOF15, excluding DHT (C4), JPG (C8) and DAC (CC).
            0xc0..=0xcf if !matches!(marker, 0xc4 | 0xc8 | 0xcc) => {
                // length(2) precision(1) height(2) width(2)
                let height = u16_be(bytes, pos + 3, format)?;
                let width = u16_be(bytes, pos + 5, format)?;
                return Ok((u32::from(width), u32::from(height)));
            }
            _ => {
                let len = usize::from(u16_be(bytes, pos, format)?);
                if len < 2 {
                    return Err(ProbeError::Invalid {
                        format,
                        reason: "segment length too small",
                    });
                }
                pos += len;
            }
        }
    }
}

/// Logical screen descriptor follows the 6-byte signature.
fn gif(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    let format = ImageFormat::Gif;
    Ok((
        u32::from(u16_le(bytes, 6, format)?),
        u32::from(u16_le(bytes, 8, format)?),
    ))
}

fn bmp(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    let format = ImageFormat::Bmp;
    let header_size = u32_le(bytes, 14, format)?;

    if header_size == 12 {
        // BITMAPCOREHEADER stores unsigned 16-bit sizes.
        return Ok((
            u32::from(u16_le(bytes, 18, format)?),
            u32::from(u16_le(bytes, 20, format)?),
        ));
    }
    if header_size < 16 {
        return Err(ProbeError::Invalid {
            format,
            reason: "unknown DIB header",
        });
    }

    let width = u32_le(bytes, 18, format)? as i32;
    let height = u32_le(bytes, 22, format)? as i32;
    if width < 0 {
        return Err(ProbeError::Invalid {
            format,
            reason: "negative width",
        });
    }
    // Negative height marks a top-down bitmap.
    Ok((width.unsigned_abs(), height.unsigned_abs()))
}

fn webp(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    let format = ImageFormat::Webp;
    match slice(bytes, 12, 4, format)? {
        b"VP8 " => {
            if slice(bytes, 23, 3, format)? != VP8_START_CODE {
                return Err(ProbeError::Invalid {
                    format,
                    reason: "missing VP8 start code",
                });
            }
            let width = u16_le(bytes, 26, format)? & 0x3fff;
            let height = u16_le(bytes, 28, format)? & 0x3fff;
            Ok((u32::from(width), u32::from(height)))
        }
        b"VP8L" => {
            if slice(bytes, 20, 1, format)?[0] != VP8L_SIGNATURE {
                return Err(ProbeError::Invalid {
                    format,
                    reason: "missing VP8L signature",
                });
            }
            // 14 bits width-1, then 14 bits height-1.
            let bits = u32_le(bytes, 21, format)?;
            Ok(((bits & 0x3fff) + 1, ((bits >> 14) & 0x3fff) + 1))
        }
        b"VP8X" => Ok((
            u24_le(bytes, 24, format)? + 1,
            u24_le(bytes, 27, format)? + 1,
        )),
        _ => Err(ProbeError::Invalid {
            format,
            reason: "unknown WebP chunk",
        }),
    }
}
