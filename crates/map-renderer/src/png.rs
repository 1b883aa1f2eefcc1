//! PNG encoding tuned for weather maps.
//!
//! Maps with flat fills and few colors compress far better as indexed PNG,
//! so encoding first attempts to build a palette and only falls back to
//! RGBA when the image has more than 256 distinct colors. Chunks are
//! written directly; the zlib stream comes from flate2 at the fast level.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;

use crate::{RenderError, RenderResult};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;

/// Below this many pixels the palette index pass runs sequentially.
const PARALLEL_THRESHOLD: usize = 4096;
const INDEX_CHUNK: usize = 4096;

/// Encode RGBA8 pixels as a PNG, choosing indexed or truecolor
/// automatically.
pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(RenderError::Encoding(format!(
            "pixel buffer is {} bytes, expected {} for {}x{}",
            pixels.len(),
            expected,
            width,
            height
        )));
    }
    if width == 0 || height == 0 {
        return Err(RenderError::Encoding("zero-sized image".to_string()));
    }

    match try_build_palette(pixels) {
        Some((palette, indices)) => encode_indexed(&palette, &indices, width, height),
        None => encode_rgba(pixels, width, height),
    }
}

/// Collect unique colors and per-pixel palette indices. Returns None as
/// soon as the image exceeds the palette limit.
fn try_build_palette(pixels: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut palette: Vec<[u8; 4]> = Vec::new();
    let mut color_map: HashMap<[u8; 4], u8> = HashMap::new();

    for chunk in pixels.chunks_exact(4) {
        let color = [chunk[0], chunk[1], chunk[2], chunk[3]];
        if !color_map.contains_key(&color) {
            if palette.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            color_map.insert(color, palette.len() as u8);
            palette.push(color);
        }
    }

    let n = pixels.len() / 4;
    let mut indices = vec![0u8; n];
    if n >= PARALLEL_THRESHOLD {
        indices
            .par_chunks_mut(INDEX_CHUNK)
            .enumerate()
            .for_each(|(chunk_i, out)| {
                let base = chunk_i * INDEX_CHUNK;
                for (j, index) in out.iter_mut().enumerate() {
                    let p = (base + j) * 4;
                    let color = [pixels[p], pixels[p + 1], pixels[p + 2], pixels[p + 3]];
                    *index = color_map.get(&color).copied().unwrap_or(0);
                }
            });
    } else {
        for (j, index) in indices.iter_mut().enumerate() {
            let p = j * 4;
            let color = [pixels[p], pixels[p + 1], pixels[p + 2], pixels[p + 3]];
            *index = color_map.get(&color).copied().unwrap_or(0);
        }
    }

    Some((palette, indices))
}

fn encode_indexed(
    palette: &[[u8; 4]],
    indices: &[u8],
    width: u32,
    height: u32,
) -> RenderResult<Vec<u8>> {
    let mut out = Vec::with_capacity(indices.len() / 4 + 1024);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr(width, height, 3));

    let mut plte = Vec::with_capacity(palette.len() * 3);
    for color in palette {
        plte.extend_from_slice(&color[..3]);
    }
    write_chunk(&mut out, b"PLTE", &plte);

    if palette.iter().any(|c| c[3] != 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut out, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width as usize)?;
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

fn encode_rgba(pixels: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let mut out = Vec::with_capacity(pixels.len() / 2 + 1024);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr(width, height, 6));

    let idat = deflate_scanlines(pixels, width as usize * 4)?;
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

fn ihdr(width: u32, height: u32, color_type: u8) -> [u8; 13] {
    let mut data = [0u8; 13];
    data[0..4].copy_from_slice(&width.to_be_bytes());
    data[4..8].copy_from_slice(&height.to_be_bytes());
    data[8] = 8; // bit depth
    data[9] = color_type;
    // compression, filter and interlace stay 0
    data
}

/// Zlib-compress the raw image rows, each prefixed with filter type 0.
fn deflate_scanlines(data: &[u8], bytes_per_row: usize) -> RenderResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 4),
        Compression::fast(),
    );
    for row in data.chunks_exact(bytes_per_row) {
        encoder
            .write_all(&[0])
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        encoder
            .write_all(row)
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
    }
    encoder
        .finish()
        .map_err(|e| RenderError::Encoding(e.to_string()))
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_chunk(png: &[u8], kind: &[u8; 4]) -> bool {
        png.windows(4).any(|w| w == kind)
    }

    fn checkerboard(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if (x + y) % 2 == 0 {
                    pixels.extend_from_slice(&[20, 60, 200, 255]);
                } else {
                    pixels.extend_from_slice(&[255, 255, 255, 255]);
                }
            }
        }
        pixels
    }

    #[test]
    fn test_signature_and_dimensions() {
        let png = encode_png(&checkerboard(40, 25), 40, 25).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(&png[16..20], &40u32.to_be_bytes());
        assert_eq!(&png[20..24], &25u32.to_be_bytes());
    }

    #[test]
    fn test_few_colors_use_palette() {
        let png = encode_png(&checkerboard(100, 100), 100, 100).unwrap();
        assert_eq!(png[25], 3, "expected indexed color type");
        assert!(has_chunk(&png, b"PLTE"));
        assert!(!has_chunk(&png, b"tRNS"), "opaque palette needs no tRNS");
    }

    #[test]
    fn test_transparency_adds_trns() {
        let mut pixels = checkerboard(16, 16);
        pixels[3] = 0;
        let png = encode_png(&pixels, 16, 16).unwrap();
        assert_eq!(png[25], 3);
        assert!(has_chunk(&png, b"tRNS"));
    }

    #[test]
    fn test_many_colors_fall_back_to_rgba() {
        // 1025 distinct colors.
        let mut pixels = Vec::new();
        for i in 0u32..1025 {
            pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 7, 255]);
        }
        let png = encode_png(&pixels, 25, 41).unwrap();
        assert_eq!(png[25], 6, "expected RGBA color type");
        assert!(!has_chunk(&png, b"PLTE"));
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        let err = encode_png(&[0u8; 10], 4, 4);
        assert!(err.is_err());
    }

    #[test]
    fn test_indexed_is_smaller_than_rgba() {
        let pixels = checkerboard(200, 200);
        let indexed = encode_png(&pixels, 200, 200).unwrap();
        let rgba = encode_rgba(&pixels, 200, 200).unwrap();
        assert!(indexed.len() < rgba.len());
    }
}
