//! BMP screenshot encoding, matching `vi_screenshot_write`'s on-disk
//! layout exactly (so existing screenshot viewers/tooling built against
//! the original need no changes).

use std::io::{self, Write};

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;

/// `off_bits` carries an extra 10 bytes beyond the two headers, matching
/// the original's `sizeof(fhdr) + sizeof(ihdr) + 10` (an apparent
/// historical padding quirk, preserved for byte-identical output).
const OFF_BITS: u32 = FILE_HEADER_SIZE + INFO_HEADER_SIZE + 10;

/// Encode a 32-bit-per-pixel BMP of the active region, rescaling rows
/// nearest-neighbor when `height != output_height`.
///
/// `buffer` holds `0x00RRGGBB`-packed pixels; `pitch` is the stride (in
/// pixels) between source rows, which may exceed `width` when the buffer
/// is a crop of a larger surface.
pub fn write_bmp<W: Write>(
    out: &mut W,
    buffer: &[u32],
    width: i32,
    height: i32,
    pitch: i32,
    output_height: i32,
) -> io::Result<()> {
    let size_image = (width as u32) * (output_height as u32) * 4;
    let size = size_image + OFF_BITS;

    // File header: type, size, reserved1, reserved2, off_bits.
    out.write_all(&[b'B', b'M'])?;
    out.write_all(&size.to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?;
    out.write_all(&OFF_BITS.to_le_bytes())?;

    // Info header: size, width, height, planes, bit_count, compression,
    // size_image, res_x, res_y, colors_used, colors_important.
    out.write_all(&INFO_HEADER_SIZE.to_le_bytes())?;
    out.write_all(&width.to_le_bytes())?;
    out.write_all(&output_height.to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?;
    out.write_all(&32u16.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;
    out.write_all(&size_image.to_le_bytes())?;
    out.write_all(&0i32.to_le_bytes())?;
    out.write_all(&0i32.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;

    // Pad to off_bits (the extra 10 bytes beyond the two headers).
    out.write_all(&[0u8; 10])?;

    if height != output_height {
        for y in (0..output_height).rev() {
            let src_y = y * height / output_height;
            write_row(out, buffer, src_y, width, pitch)?;
        }
    } else {
        for y in (0..height).rev() {
            write_row(out, buffer, y, width, pitch)?;
        }
    }

    Ok(())
}

fn write_row<W: Write>(out: &mut W, buffer: &[u32], row: i32, width: i32, pitch: i32) -> io::Result<()> {
    let start = (row * pitch) as usize;
    for &pixel in &buffer[start..start + width as usize] {
        out.write_all(&pixel.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_matches_the_original_byte_offsets() {
        let buffer = vec![0u32; 4];
        let mut out = Vec::new();
        write_bmp(&mut out, &buffer, 2, 2, 2, 2).unwrap();

        assert_eq!(&out[0..2], b"BM");
        let off_bits = u32::from_le_bytes(out[10..14].try_into().unwrap());
        assert_eq!(off_bits, OFF_BITS);
        assert_eq!(off_bits, 64);
        let ihdr_size = u32::from_le_bytes(out[14..18].try_into().unwrap());
        assert_eq!(ihdr_size, INFO_HEADER_SIZE);
    }

    #[test]
    fn rows_are_emitted_bottom_up() {
        let buffer = vec![0x0000_00AAu32, 0x0000_00BB];
        let mut out = Vec::new();
        write_bmp(&mut out, &buffer, 1, 2, 1, 2).unwrap();
        let pixel_data = &out[OFF_BITS as usize..];
        let first = u32::from_le_bytes(pixel_data[0..4].try_into().unwrap());
        assert_eq!(first, 0x0000_00BB);
    }

    #[test]
    fn nearest_neighbor_duplicates_rows_when_upscaling() {
        let buffer = vec![0x0000_0011u32, 0x0000_0022];
        let mut out = Vec::new();
        write_bmp(&mut out, &buffer, 1, 2, 1, 4).unwrap();
        let pixel_data = &out[OFF_BITS as usize..];
        assert_eq!(pixel_data.len(), 4 * 4);
    }

    #[test]
    fn respects_pitch_wider_than_width() {
        let buffer = vec![0x0000_0001u32, 0x0000_0002, 0x0000_0003, 0x0000_0004];
        let mut out = Vec::new();
        write_bmp(&mut out, &buffer, 1, 2, 2, 2).unwrap();
        let pixel_data = &out[OFF_BITS as usize..];
        let last_row_pixel = u32::from_le_bytes(pixel_data[4..8].try_into().unwrap());
        assert_eq!(last_row_pixel, 0x0000_0001);
    }
}
