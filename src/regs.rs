// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The register map shared by the logical device model and the physical
//! boards it is backed by.
//!
//! The map is irregular: the first two channels use the legacy low
//! register block, later channels were added in banks as boards grew.
//! Every table in this module is indexed by 0-based channel (or mixer, or
//! audio-system) index, so the dispatcher never hardcodes a bank split.

use crate::types::Channel;

pub const REG_GLOBAL_CONTROL: u32 = 0;
pub const REG_BOARD_ID: u32 = 50;
pub const REG_GLOBAL_CONTROL2: u32 = 267;

pub const REG_CH_CONTROL: [u32; 8] = [1, 5, 257, 260, 384, 388, 392, 396];
pub const REG_CH_OUTPUT_FRAME: [u32; 8] = [3, 7, 258, 261, 385, 389, 393, 397];
pub const REG_CH_INPUT_FRAME: [u32; 8] = [4, 8, 259, 262, 386, 390, 394, 398];

/// Reference-clock selector field of the global control register.
pub const GC_REF_SOURCE_MASK: u32 = 0x0000_3C00;
pub const GC_REF_SOURCE_SHIFT: u32 = 10;

pub const GC2_INDEPENDENT_MODE: u32 = 1 << 2;
pub const GC2_QUAD_MODE: u32 = 1 << 3;
pub const GC2_QUAD_MODE2: u32 = 1 << 4;
pub const GC2_425_FB12: u32 = 1 << 10;
pub const GC2_425_FB34: u32 = 1 << 11;
pub const GC2_425_FB56: u32 = 1 << 12;
pub const GC2_425_FB78: u32 = 1 << 13;

/// Mode bits the logical device never advertises; reads of global control 2
/// always show them as zero.
pub const GC2_MULTIFORMAT_BITS: u32 = GC2_INDEPENDENT_MODE
    | GC2_QUAD_MODE
    | GC2_QUAD_MODE2
    | GC2_425_FB12
    | GC2_425_FB34
    | GC2_425_FB56
    | GC2_425_FB78;

/// Intrinsic frame-buffer-size field of the per-channel control registers.
/// The hardware keeps the authoritative copy in channel 1's register.
pub const CH_FRAME_SIZE_MASK: u32 = 0x0030_0000;

pub const REG_AUD_CONTROL: [u32; 8] = [24, 240, 512, 528, 544, 560, 576, 592];
pub const REG_AUD_SOURCE_SELECT: [u32; 8] = [25, 241, 513, 529, 545, 561, 577, 593];
pub const REG_AUD_DETECT: [u32; 8] = [26, 242, 514, 530, 546, 562, 578, 594];
pub const REG_AUD_OUTPUT_LAST_ADDR: [u32; 8] = [27, 243, 515, 531, 547, 563, 579, 595];
pub const REG_AUD_INPUT_LAST_ADDR: [u32; 8] = [28, 244, 516, 532, 548, 564, 580, 596];
pub const REG_AUD_DELAY: [u32; 8] = [190, 191, 517, 533, 549, 565, 581, 597];

/// Non-PCM flags for audio systems 1-4, one byte per system, one bit per
/// stereo pair. Systems 5-8 live in the second register.
pub const REG_PCM_CONTROL_4321: u32 = 380;
pub const REG_PCM_CONTROL_8765: u32 = 381;

pub const REG_SDI_TRANSMIT_CONTROL: u32 = 256;
/// Per-spigot transmit-enable bits. The layout grew in two steps, hence
/// the out-of-order upper spigots.
pub const SDI_XMIT_ENABLE_MASK: [u32; 8] = [
    1 << 24,
    1 << 25,
    1 << 28,
    1 << 29,
    1 << 30,
    1 << 31,
    1 << 26,
    1 << 27,
];
pub const SDI_XMIT_ENABLE_SHIFT: [u32; 8] = [24, 25, 28, 29, 30, 31, 26, 27];

pub const REG_SDI_OUT_CONTROL: [u32; 8] = [129, 130, 169, 170, 337, 475, 476, 477];

/// The SDI output audio-system index is a 3-bit value scattered over the
/// control register: bit 18 is the MSB, bit 30 the LSB for data stream 1;
/// bits 19/29/31 hold the same for data stream 2.
pub const SDI_OUT_DS1_AUDSYS_BITS: u32 = (1 << 18) | (1 << 28) | (1 << 30);
pub const SDI_OUT_DS2_AUDSYS_BITS: u32 = (1 << 19) | (1 << 29) | (1 << 31);

pub fn sdi_out_ds1_audsys(val: u32) -> u32 {
    (((val >> 18) & 1) << 2) | (((val >> 28) & 1) << 1) | ((val >> 30) & 1)
}

pub fn sdi_out_with_ds1_audsys(val: u32, idx: u32) -> u32 {
    (val & !SDI_OUT_DS1_AUDSYS_BITS)
        | (((idx >> 2) & 1) << 18)
        | (((idx >> 1) & 1) << 28)
        | ((idx & 1) << 30)
}

pub fn sdi_out_ds2_audsys(val: u32) -> u32 {
    (((val >> 19) & 1) << 2) | (((val >> 29) & 1) << 1) | ((val >> 31) & 1)
}

pub fn sdi_out_with_ds2_audsys(val: u32, idx: u32) -> u32 {
    (val & !SDI_OUT_DS2_AUDSYS_BITS)
        | (((idx >> 2) & 1) << 19)
        | (((idx >> 1) & 1) << 29)
        | ((idx & 1) << 31)
}

pub const REG_OUTPUT_TIMING_CONTROL: [u32; 8] = [12, 370, 371, 372, 373, 374, 375, 376];

pub const REG_VIDPROC_CONTROL: [u32; 4] = [9, 131, 419, 420];
pub const REG_MIXER_COEFFICIENT: [u32; 4] = [10, 133, 421, 423];
pub const REG_FLAT_MATTE_VALUE: [u32; 4] = [13, 134, 422, 424];

pub const REG_RXSDI_STATUS: [u32; 8] = [2048, 2112, 2176, 2240, 2304, 2368, 2432, 2496];
pub const REG_RXSDI_CRC_ERROR_COUNT: [u32; 8] =
    [2050, 2114, 2178, 2242, 2306, 2370, 2434, 2498];
pub const REG_SDI_IN_VPID_A: [u32; 8] = [2051, 2115, 2179, 2243, 2307, 2371, 2435, 2499];
pub const REG_SDI_IN_VPID_B: [u32; 8] = [2052, 2116, 2180, 2244, 2308, 2372, 2436, 2500];

/// Input status is packed two channels per register; the per-channel tables
/// repeat the shared register number.
pub const REG_INPUT_STATUS_FOR_CHANNEL: [u32; 8] = [22, 22, 288, 288, 458, 458, 459, 459];
/// Field positions within an input-status register, indexed by the
/// channel's slot (even channel = slot 0, odd = slot 1).
pub const IN_FRAME_RATE_MASK: [u32; 2] = [0x0000_0007, 0x0000_0700];
pub const IN_FRAME_RATE_SHIFT: [u32; 2] = [0, 8];
pub const IN_FRAME_RATE_HIGH_MASK: [u32; 2] = [1 << 22, 1 << 23];
pub const IN_FRAME_RATE_HIGH_SHIFT: [u32; 2] = [22, 23];
pub const IN_PROGRESSIVE_MASK: [u32; 2] = [1 << 7, 1 << 15];
pub const IN_PROGRESSIVE_SHIFT: [u32; 2] = [7, 15];

/// 3G input status: channels 1-2 and 3-4 share a register with one byte
/// per channel; channels 5-8 share a third register with four byte slices.
pub const REG_SDI_IN_3G_STATUS_FOR_CHANNEL: [u32; 8] =
    [232, 232, 233, 233, 269, 269, 269, 269];
pub const SDI_IN_3G_MODE_BIT: u32 = 1 << 0;
pub const SDI_IN_3GB_MODE_BIT: u32 = 1 << 1;
pub const SDI_IN_VPID_A_VALID_BIT: u32 = 1 << 4;

/// Byte slice a channel occupies within its 3G status register.
pub fn sdi_in_3g_slice(ch: Channel) -> u32 {
    if ch.idx() < 4 {
        ch.0 % 2
    } else {
        ch.0 - 4
    }
}

/// Ancillary-data register blocks: one 64-register window per channel,
/// extractors first, inserters above them. Only the leading registers of
/// each window are populated.
pub const REG_ANC_EXT_BASE: [u32; 8] = [4096, 4160, 4224, 4288, 4352, 4416, 4480, 4544];
pub const REG_ANC_INS_BASE: [u32; 8] = [4608, 4672, 4736, 4800, 4864, 4928, 4992, 5056];
pub const ANC_EXT_NUM_REGS: u32 = 22;
pub const ANC_INS_NUM_REGS: u32 = 19;
pub const ANC_CHANNEL_STRIDE: u32 = 64;

/// Fixed properties of the logical device model presented to clients.
pub const VIRT_ACTIVE_MEMORY_SIZE: u64 = 0x4000_0000;
pub const VIRT_NUM_AUDIO_SYSTEMS: u32 = 2;

/// DMA frame geometry: frames are 8 MiB apart and address translation
/// operates on 8 MiB-aligned bases.
pub const DMA_FRAME_SIZE: u64 = 0x0080_0000;
pub const DMA_BASE_MASK: u64 = 0xFF80_0000;

/// Read-path convention: mask first, then shift, where a shift is honored
/// only in the open interval (0, 31).
pub fn apply_mask_shift(value: u32, mask: u32, shift: u32) -> u32 {
    let v = value & mask;
    if shift > 0 && shift < 31 {
        v >> shift
    } else {
        v
    }
}

/// Write-path counterpart: positions an unshifted field value, honoring
/// the same (0, 31) shift convention.
pub fn position_value(value: u32, shift: u32) -> u32 {
    if shift > 0 && shift < 31 {
        value << shift
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ds_audsys_scatter_round_trips() {
        for idx in 0..8 {
            assert_eq!(sdi_out_ds1_audsys(sdi_out_with_ds1_audsys(0, idx)), idx);
            assert_eq!(sdi_out_ds2_audsys(sdi_out_with_ds2_audsys(0, idx)), idx);
        }
        // Bit 18 is the MSB of DS1.
        assert_eq!(sdi_out_ds1_audsys(1 << 18), 4);
        assert_eq!(sdi_out_ds1_audsys(1 << 30), 1);
        // Rewriting one stream leaves the other intact.
        let both = sdi_out_with_ds2_audsys(sdi_out_with_ds1_audsys(0, 5), 3);
        assert_eq!(sdi_out_ds1_audsys(both), 5);
        assert_eq!(sdi_out_ds2_audsys(both), 3);
    }

    #[test]
    fn mask_then_shift_convention() {
        assert_eq!(apply_mask_shift(0xABCD_1234, 0xFF00, 8), 0x12);
        assert_eq!(apply_mask_shift(0xABCD_1234, 0xFFFF_FFFF, 0), 0xABCD_1234);
        // A shift of 31 or more is ignored.
        assert_eq!(apply_mask_shift(0x8000_0000, 0x8000_0000, 31), 0x8000_0000);
        assert_eq!(position_value(0x12, 8), 0x1200);
        assert_eq!(position_value(0x12, 0), 0x12);
        assert_eq!(position_value(0x12, 31), 0x12);
    }

    #[test]
    fn three_gig_slices() {
        assert_eq!(sdi_in_3g_slice(Channel(0)), 0);
        assert_eq!(sdi_in_3g_slice(Channel(1)), 1);
        assert_eq!(sdi_in_3g_slice(Channel(2)), 0);
        assert_eq!(sdi_in_3g_slice(Channel(5)), 1);
        assert_eq!(sdi_in_3g_slice(Channel(7)), 3);
    }
}
