// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DMA address translation.
//!
//! Callers address device memory either with an explicit frame number or
//! with frame 0 plus an absolute byte offset (the audio paths do the
//! latter). Both forms are reduced to a frame-aligned base, looked up in
//! the frame-base table, and forwarded with the sub-frame offset intact.
//! Bases outside the table pass through unchanged.

use crate::dispatch::Translator;
use crate::regs;
use crate::PhysResult;
use crate::PhysicalDevice;

impl<D: PhysicalDevice> Translator<D> {
    pub(crate) fn dma_transfer(
        &mut self,
        engine: u32,
        is_read: bool,
        frame: u32,
        buffer: &mut [u8],
        card_offset: u64,
        num_segments: u32,
        host_pitch: u32,
        card_pitch: u32,
        sync: bool,
    ) -> PhysResult<()> {
        let (frame, card_offset) = self.translate_dma_window(frame, card_offset);
        self.dev.dma_transfer(
            engine,
            is_read,
            frame,
            buffer,
            card_offset,
            num_segments,
            host_pitch,
            card_pitch,
            sync,
        )
    }

    fn translate_dma_window(&self, frame: u32, card_offset: u64) -> (u32, u64) {
        let mut frame = frame;
        let mut card_offset = card_offset;
        if frame == 0 {
            frame = (card_offset / regs::DMA_FRAME_SIZE) as u32;
            card_offset %= regs::DMA_FRAME_SIZE;
        }
        let addr = u64::from(frame) * regs::DMA_FRAME_SIZE + card_offset;
        let base = addr & regs::DMA_BASE_MASK;
        if let Some(card_base) = self.tables.card_frame_base(base) {
            frame = (card_base / regs::DMA_FRAME_SIZE) as u32;
            card_offset = addr - base;
        }
        (frame, card_offset)
    }
}
