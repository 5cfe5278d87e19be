// License: MIT

//! Shared-memory backing buffers for the solid-colour paints. One anonymous
//! tempfile per buffer; the mapping is dropped right after the fill since the
//! compositor holds its own reference once the buffer is attached. The
//! wl_buffer itself is destroyed when the compositor releases it.

use std::os::fd::AsFd;

use anyhow::{Context, Result};
use memmap2::MmapMut;
use tempfile::tempfile;

use wayland_client::{
    QueueHandle,
    protocol::{
        wl_buffer::WlBuffer,
        wl_shm::{Format, WlShm},
    },
};

use crate::shell::engine::Engine;

/// Fill `dst` with the 32-bit pixel pattern, a word at a time, then byte by
/// byte for any trailing remainder shorter than a word group.
pub(crate) fn fill_xrgb(dst: &mut [u8], colour: u32) {
    let px = colour.to_le_bytes();
    let head_len = dst.len() & !7;

    let (head, tail) = dst.split_at_mut(head_len);
    for chunk in head.chunks_exact_mut(4) {
        chunk.copy_from_slice(&px);
    }
    for (i, b) in tail.iter_mut().enumerate() {
        *b = px[(head_len + i) & 3];
    }
}

/// Build an XRGB8888 wl_buffer of `width`x`height` filled with `colour`.
pub(crate) fn create_solid_buffer(
    shm: &WlShm,
    qh: &QueueHandle<Engine>,
    width: i32,
    height: i32,
    colour: u32,
) -> Result<WlBuffer> {
    let stride = width * 4;
    let size_bytes = (stride as usize) * height as usize;

    let file = tempfile().context("tempfile for shm")?;
    file.set_len(size_bytes as u64).context("set_len shm file")?;
    let mut mmap = unsafe { MmapMut::map_mut(&file).context("mmap shm")? };

    fill_xrgb(&mut mmap[..], colour);

    let pool = shm.create_pool(file.as_fd(), size_bytes as i32, qh, ());
    let buffer = pool.create_buffer(0, width, height, stride, Format::Xrgb8888, qh, ());
    // The pool object is no longer needed once the buffer exists.
    pool.destroy();

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::fill_xrgb;

    #[test]
    fn solid_fill_round_trip() {
        // 3x1 panel at 4 bytes/pixel: 12 bytes, not a multiple of 8.
        let colour: u32 = 0xFF00_FF00;
        let mut buf = vec![0u8; 12];
        fill_xrgb(&mut buf, colour);

        let px = colour.to_le_bytes();
        for group in buf.chunks(4) {
            assert_eq!(group, px);
        }
    }

    #[test]
    fn fill_handles_trailing_bytes() {
        let colour: u32 = 0x1122_3344;
        let px = colour.to_le_bytes();

        for len in [1usize, 3, 7, 8, 9, 15, 16, 21] {
            let mut buf = vec![0u8; len];
            fill_xrgb(&mut buf, colour);
            for (i, b) in buf.iter().enumerate() {
                assert_eq!(*b, px[i & 3], "len={len} byte={i}");
            }
        }
    }
}
