// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The register translation engine.
//!
//! Every virtual register access is routed here and rewritten into one or
//! more physical accesses: ancillary-data windows slide to the anchor
//! channel's block, crosspoint-select nibbles are translated field by
//! field, and the remaining registers go through the switch at the bottom
//! of [`Translator::read_register`]. The physical register map is
//! irregular, so the switch spells out every special case rather than
//! deriving them.

use crate::mapping::MappingTables;
use crate::regs;
use crate::types::translate_interrupt;
use crate::types::AudioChannelPair;
use crate::types::AudioSystem;
use crate::types::Channel;
use crate::types::InterruptKind;
use crate::types::OutputXpt;
use crate::types::RefSource;
use crate::PhysResult;
use crate::PhysicalDevice;

/// Connected-state translator: the physical device handle plus the
/// immutable maps built at connect time.
pub(crate) struct Translator<D> {
    pub(crate) dev: D,
    pub(crate) tables: MappingTables,
    pub(crate) anchor: Channel,
    pub(crate) sim_device_id: u32,
}

enum AncWindow {
    /// Inside the virtual device's own block; carries the physical register.
    Active(u32),
    /// Inside the register region but outside the virtual device's block.
    Shadow,
    Outside,
}

const INPUT_STATUS_FIELDS: [([u32; 2], [u32; 2]); 3] = [
    (regs::IN_FRAME_RATE_MASK, regs::IN_FRAME_RATE_SHIFT),
    (regs::IN_FRAME_RATE_HIGH_MASK, regs::IN_FRAME_RATE_HIGH_SHIFT),
    (regs::IN_PROGRESSIVE_MASK, regs::IN_PROGRESSIVE_SHIFT),
];

const SDI_IN_3G_FIELDS: [u32; 3] = [
    regs::SDI_IN_3G_MODE_BIT,
    regs::SDI_IN_3GB_MODE_BIT,
    regs::SDI_IN_VPID_A_VALID_BIT,
];

impl<D: PhysicalDevice> Translator<D> {
    pub(crate) fn new(
        dev: D,
        tables: MappingTables,
        anchor: Channel,
        sim_device_id: u32,
    ) -> Translator<D> {
        Translator {
            dev,
            tables,
            anchor,
            sim_device_id,
        }
    }

    /// Reads a virtual register into `out`. `out` is read-modify-write:
    /// handlers that assemble a value nibble by nibble leave the untouched
    /// bits as the caller passed them in.
    pub(crate) fn read_register(
        &mut self,
        reg: u32,
        out: &mut u32,
        mask: u32,
        shift: u32,
    ) -> PhysResult<()> {
        match self.anc_window(reg) {
            AncWindow::Active(card_reg) => {
                *out = self.dev.read_register(card_reg, mask, shift)?;
                return Ok(());
            }
            AncWindow::Shadow => {
                *out = 0;
                return Ok(());
            }
            AncWindow::Outside => {}
        }
        if self.tables.xptreg_virt.contains_key(&reg) {
            return self.read_xpt_select(reg, out, mask, shift);
        }
        if let Some(card_reg) = self.audio_register(reg) {
            *out = self.dev.read_register(card_reg, mask, shift)?;
            return Ok(());
        }
        match reg {
            regs::REG_BOARD_ID => {
                *out = regs::apply_mask_shift(self.sim_device_id, mask, shift);
                Ok(())
            }
            regs::REG_GLOBAL_CONTROL => self.read_global_control(out, mask, shift),
            regs::REG_GLOBAL_CONTROL2 => {
                let raw = self.dev.read_register(regs::REG_GLOBAL_CONTROL2, u32::MAX, 0)?;
                *out = regs::apply_mask_shift(raw & !regs::GC2_MULTIFORMAT_BITS, mask, shift);
                Ok(())
            }
            regs::REG_PCM_CONTROL_4321 => self.read_pcm_control(out, mask, shift),
            regs::REG_SDI_TRANSMIT_CONTROL => self.read_sdi_transmit(out, mask, shift),
            r if r == regs::REG_CH_CONTROL[0] => {
                self.read_channel_control(self.anchor, out, mask, shift)
            }
            r if r == regs::REG_CH_CONTROL[1] => {
                self.read_channel_control(self.anchor.next(), out, mask, shift)
            }
            r if r == regs::REG_CH_OUTPUT_FRAME[0] => {
                self.read_through(regs::REG_CH_OUTPUT_FRAME[self.anchor.idx()], out, mask, shift)
            }
            r if r == regs::REG_CH_OUTPUT_FRAME[1] => self.read_through(
                regs::REG_CH_OUTPUT_FRAME[self.anchor.next().idx()],
                out,
                mask,
                shift,
            ),
            r if r == regs::REG_CH_INPUT_FRAME[0] => {
                self.read_through(regs::REG_CH_INPUT_FRAME[self.anchor.idx()], out, mask, shift)
            }
            r if r == regs::REG_CH_INPUT_FRAME[1] => self.read_through(
                regs::REG_CH_INPUT_FRAME[self.anchor.next().idx()],
                out,
                mask,
                shift,
            ),
            r if r == regs::REG_OUTPUT_TIMING_CONTROL[0] => self.read_through(
                regs::REG_OUTPUT_TIMING_CONTROL[self.anchor.next().idx()],
                out,
                mask,
                shift,
            ),
            r if r == regs::REG_VIDPROC_CONTROL[0] => {
                let mx = self.tables.card_mixer(0) as usize;
                self.read_through(regs::REG_VIDPROC_CONTROL[mx], out, mask, shift)
            }
            r if r == regs::REG_MIXER_COEFFICIENT[0] => {
                let mx = self.tables.card_mixer(0) as usize;
                self.read_through(regs::REG_MIXER_COEFFICIENT[mx], out, mask, shift)
            }
            r if r == regs::REG_FLAT_MATTE_VALUE[0] => {
                let mx = self.tables.card_mixer(0) as usize;
                self.read_through(regs::REG_FLAT_MATTE_VALUE[mx], out, mask, shift)
            }
            r if r == regs::REG_SDI_OUT_CONTROL[0] => self.read_sdi_out_control(out, mask, shift),
            r if r == regs::REG_RXSDI_STATUS[0] => {
                self.read_through(regs::REG_RXSDI_STATUS[self.anchor.idx()], out, mask, shift)
            }
            r if r == regs::REG_RXSDI_STATUS[1] => self.read_through(
                regs::REG_RXSDI_STATUS[self.anchor.next().idx()],
                out,
                mask,
                shift,
            ),
            r if r == regs::REG_RXSDI_CRC_ERROR_COUNT[0] => self.read_through(
                regs::REG_RXSDI_CRC_ERROR_COUNT[self.anchor.idx()],
                out,
                mask,
                shift,
            ),
            r if r == regs::REG_SDI_IN_VPID_A[0] => {
                self.read_through(regs::REG_SDI_IN_VPID_A[self.anchor.idx()], out, mask, shift)
            }
            r if r == regs::REG_SDI_IN_VPID_B[0] => {
                self.read_through(regs::REG_SDI_IN_VPID_B[self.anchor.idx()], out, mask, shift)
            }
            r if r == regs::REG_INPUT_STATUS_FOR_CHANNEL[0] => {
                self.read_input_status(out, mask, shift)
            }
            r if r == regs::REG_SDI_IN_3G_STATUS_FOR_CHANNEL[0] => {
                self.read_sdi_in_3g_status(out, mask, shift)
            }
            _ => self.read_through(reg, out, mask, shift),
        }
    }

    /// Writes a virtual register. `value` arrives unshifted, as for the
    /// physical SDK's own write primitive.
    pub(crate) fn write_register(
        &mut self,
        reg: u32,
        value: u32,
        mask: u32,
        shift: u32,
    ) -> PhysResult<()> {
        match self.anc_window(reg) {
            AncWindow::Active(card_reg) => {
                return self.dev.write_register(card_reg, value, mask, shift);
            }
            // Writes outside the virtual device's block are dropped.
            AncWindow::Shadow => return Ok(()),
            AncWindow::Outside => {}
        }
        if self.tables.xptreg_virt.contains_key(&reg) {
            return self.write_xpt_select(reg, value, mask, shift);
        }
        if let Some(card_reg) = self.audio_register(reg) {
            return self.dev.write_register(card_reg, value, mask, shift);
        }
        match reg {
            regs::REG_GLOBAL_CONTROL | regs::REG_GLOBAL_CONTROL2 => {
                self.dev.write_register(reg, value, mask, shift)
            }
            regs::REG_PCM_CONTROL_4321 => self.write_pcm_control(value, mask, shift),
            regs::REG_SDI_TRANSMIT_CONTROL => self.write_sdi_transmit(value, mask, shift),
            r if r == regs::REG_CH_CONTROL[0] => self.dev.write_register(
                regs::REG_CH_CONTROL[self.anchor.idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_CH_CONTROL[1] => self.dev.write_register(
                regs::REG_CH_CONTROL[self.anchor.next().idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_CH_OUTPUT_FRAME[0] => self.dev.write_register(
                regs::REG_CH_OUTPUT_FRAME[self.anchor.idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_CH_OUTPUT_FRAME[1] => self.dev.write_register(
                regs::REG_CH_OUTPUT_FRAME[self.anchor.next().idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_CH_INPUT_FRAME[0] => self.dev.write_register(
                regs::REG_CH_INPUT_FRAME[self.anchor.idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_CH_INPUT_FRAME[1] => self.dev.write_register(
                regs::REG_CH_INPUT_FRAME[self.anchor.next().idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_OUTPUT_TIMING_CONTROL[0] => self.dev.write_register(
                regs::REG_OUTPUT_TIMING_CONTROL[self.anchor.next().idx()],
                value,
                mask,
                shift,
            ),
            r if r == regs::REG_VIDPROC_CONTROL[0] => {
                let mx = self.tables.card_mixer(0) as usize;
                self.dev
                    .write_register(regs::REG_VIDPROC_CONTROL[mx], value, mask, shift)
            }
            r if r == regs::REG_MIXER_COEFFICIENT[0] => {
                let mx = self.tables.card_mixer(0) as usize;
                self.dev
                    .write_register(regs::REG_MIXER_COEFFICIENT[mx], value, mask, shift)
            }
            r if r == regs::REG_FLAT_MATTE_VALUE[0] => {
                let mx = self.tables.card_mixer(0) as usize;
                self.dev
                    .write_register(regs::REG_FLAT_MATTE_VALUE[mx], value, mask, shift)
            }
            r if r == regs::REG_SDI_OUT_CONTROL[0] => {
                self.write_sdi_out_control(value, mask, shift)
            }
            _ => self.dev.write_register(reg, value, mask, shift),
        }
    }

    pub(crate) fn wait_for_interrupt(
        &mut self,
        interrupt: InterruptKind,
        timeout_ms: u32,
    ) -> PhysResult<()> {
        self.dev
            .wait_for_interrupt(translate_interrupt(interrupt, self.anchor), timeout_ms)
    }

    fn read_through(
        &mut self,
        card_reg: u32,
        out: &mut u32,
        mask: u32,
        shift: u32,
    ) -> PhysResult<()> {
        *out = self.dev.read_register(card_reg, mask, shift)?;
        Ok(())
    }

    /// Classifies `reg` against the anc-extract and anc-insert register
    /// regions. The extractor block slides to the anchor channel, the
    /// inserter block to the channel after it.
    fn anc_window(&self, reg: u32) -> AncWindow {
        let ext_lo = regs::REG_ANC_EXT_BASE[0];
        let ext_hi = regs::REG_ANC_EXT_BASE[7] + regs::ANC_EXT_NUM_REGS;
        if (ext_lo..ext_hi).contains(&reg) {
            return if reg < ext_lo + regs::ANC_EXT_NUM_REGS {
                AncWindow::Active(reg + self.anchor.0 * regs::ANC_CHANNEL_STRIDE)
            } else {
                AncWindow::Shadow
            };
        }
        let ins_lo = regs::REG_ANC_INS_BASE[0];
        let ins_hi = regs::REG_ANC_INS_BASE[7] + regs::ANC_INS_NUM_REGS;
        if (ins_lo..ins_hi).contains(&reg) {
            return if reg < ins_lo + regs::ANC_INS_NUM_REGS {
                AncWindow::Active(reg + (self.anchor.0 + 1) * regs::ANC_CHANNEL_STRIDE)
            } else {
                AncWindow::Shadow
            };
        }
        AncWindow::Outside
    }

    /// Rewrites a virtual per-audio-system register to the physical
    /// system's slot in the same table.
    fn audio_register(&self, reg: u32) -> Option<u32> {
        const TABLES: [&[u32; 8]; 6] = [
            &regs::REG_AUD_CONTROL,
            &regs::REG_AUD_SOURCE_SELECT,
            &regs::REG_AUD_DETECT,
            &regs::REG_AUD_OUTPUT_LAST_ADDR,
            &regs::REG_AUD_INPUT_LAST_ADDR,
            &regs::REG_AUD_DELAY,
        ];
        for table in TABLES {
            for virt in 0..regs::VIRT_NUM_AUDIO_SYSTEMS as usize {
                if reg == table[virt] {
                    let card = self.tables.card_audio_system(AudioSystem(virt as u32));
                    return Some(table[card.idx()]);
                }
            }
        }
        None
    }

    fn read_xpt_select(
        &mut self,
        reg: u32,
        out: &mut u32,
        mask: u32,
        shift: u32,
    ) -> PhysResult<()> {
        let Some(fields) = self.tables.xptreg_virt.get(&reg) else {
            return Ok(());
        };
        for field in fields {
            if field.mask() & mask != field.mask() {
                continue;
            }
            let card_ixpt = self.tables.card_input_xpt(field.input_xpt);
            let Some((card_reg, card_nibble)) = self.dev.crosspoint_select_reg_info(card_ixpt)
            else {
                return Err(libc::EINVAL);
            };
            let card_oxpt = self.dev.read_register(
                card_reg,
                0xFF << (card_nibble * 8),
                card_nibble * 8,
            )?;
            let virt_oxpt = self.tables.virt_output_xpt(OutputXpt(card_oxpt));
            *out = (*out & !field.mask()) | (virt_oxpt.0 << field.shift());
        }
        if shift > 0 && shift < 31 {
            *out >>= shift;
        }
        Ok(())
    }

    fn write_xpt_select(&mut self, reg: u32, value: u32, mask: u32, shift: u32) -> PhysResult<()> {
        let positioned = regs::position_value(value, shift);
        let Some(fields) = self.tables.xptreg_virt.get(&reg) else {
            return Ok(());
        };
        for field in fields {
            if field.mask() & mask != field.mask() {
                continue;
            }
            let virt_oxpt = OutputXpt((positioned & field.mask()) >> field.shift());
            let card_oxpt = self.tables.card_output_xpt(virt_oxpt);
            let card_ixpt = self.tables.card_input_xpt(field.input_xpt);
            let Some((card_reg, card_nibble)) = self.dev.crosspoint_select_reg_info(card_ixpt)
            else {
                return Err(libc::EINVAL);
            };
            self.dev.write_register(
                card_reg,
                card_oxpt.0,
                0xFF << (card_nibble * 8),
                card_nibble * 8,
            )?;
        }
        Ok(())
    }

    /// The reference source is renamed so the client only ever sees its
    /// own input 1, external, or free-run.
    fn read_global_control(&mut self, out: &mut u32, mask: u32, shift: u32) -> PhysResult<()> {
        let mut raw = self.dev.read_register(regs::REG_GLOBAL_CONTROL, u32::MAX, 0)?;
        if mask & regs::GC_REF_SOURCE_MASK == regs::GC_REF_SOURCE_MASK {
            let field = (raw & regs::GC_REF_SOURCE_MASK) >> regs::GC_REF_SOURCE_SHIFT;
            let translated = match RefSource::n(field) {
                Some(src) if Some(src) == RefSource::for_input_channel(self.anchor) => {
                    RefSource::Input1
                }
                Some(RefSource::External) => RefSource::External,
                Some(RefSource::FreeRun) => RefSource::FreeRun,
                _ => RefSource::FreeRun,
            };
            raw = (raw & !regs::GC_REF_SOURCE_MASK)
                | ((translated as u32) << regs::GC_REF_SOURCE_SHIFT);
        }
        *out = regs::apply_mask_shift(raw, mask, shift);
        Ok(())
    }

    /// The intrinsic frame-size field lives only in the first channel's
    /// control register, so it is merged in from there.
    fn read_channel_control(
        &mut self,
        ch: Channel,
        out: &mut u32,
        mask: u32,
        shift: u32,
    ) -> PhysResult<()> {
        let mut raw = self
            .dev
            .read_register(regs::REG_CH_CONTROL[ch.idx()], u32::MAX, 0)?;
        if ch == self.anchor && mask & regs::CH_FRAME_SIZE_MASK == regs::CH_FRAME_SIZE_MASK {
            let size = self
                .dev
                .read_register(regs::REG_CH_CONTROL[0], regs::CH_FRAME_SIZE_MASK, 0)?;
            raw = (raw & !regs::CH_FRAME_SIZE_MASK) | size;
        }
        *out = regs::apply_mask_shift(raw, mask, shift);
        Ok(())
    }

    fn read_pcm_control(&mut self, out: &mut u32, mask: u32, shift: u32) -> PhysResult<()> {
        let card1 = self.tables.card_audio_system(AudioSystem(0));
        if card1 == AudioSystem(0) {
            *out = self
                .dev
                .read_register(regs::REG_PCM_CONTROL_4321, mask, shift)?;
            return Ok(());
        }
        let base_reg = if card1.0 >= 4 {
            regs::REG_PCM_CONTROL_8765
        } else {
            regs::REG_PCM_CONTROL_4321
        };
        let base = self.dev.read_register(base_reg, u32::MAX, 0)?;
        let mut value = base;
        for virt in 0..regs::VIRT_NUM_AUDIO_SYSTEMS {
            let virt_mask = 0xFFu32 << (virt * 8);
            if mask & virt_mask == 0 {
                continue;
            }
            let card = self.tables.card_audio_system(AudioSystem(virt));
            let (card_reg, lane) = if card.0 >= 4 {
                (regs::REG_PCM_CONTROL_8765, card.0 - 4)
            } else {
                (regs::REG_PCM_CONTROL_4321, card.0)
            };
            let byte = if card_reg == base_reg {
                (base >> (lane * 8)) & 0xFF
            } else {
                self.dev
                    .read_register(card_reg, 0xFF << (lane * 8), lane * 8)?
            };
            value = (value & !virt_mask) | ((byte << (virt * 8)) & virt_mask);
        }
        *out = regs::apply_mask_shift(value, mask, shift);
        Ok(())
    }

    /// Non-identity PCM writes go through the SDK helper one channel pair
    /// at a time, so only exact single-bit masks are accepted.
    fn write_pcm_control(&mut self, value: u32, mask: u32, shift: u32) -> PhysResult<()> {
        if self.tables.card_audio_system(AudioSystem(0)) == AudioSystem(0) {
            return self
                .dev
                .write_register(regs::REG_PCM_CONTROL_4321, value, mask, shift);
        }
        if mask.count_ones() == 1 {
            let bit = mask.trailing_zeros();
            let virt = bit / 8;
            if virt < regs::VIRT_NUM_AUDIO_SYSTEMS {
                let card = self.tables.card_audio_system(AudioSystem(virt));
                if let Some(pair) = AudioChannelPair::n(bit % 8) {
                    return self.dev.set_audio_pcm_control(card, pair, value != 0);
                }
            }
        }
        Err(libc::EINVAL)
    }

    fn read_sdi_transmit(&mut self, out: &mut u32, mask: u32, shift: u32) -> PhysResult<()> {
        if !self.dev.has_bidirectional_sdi() {
            return Ok(());
        }
        for spigot in 0..8usize {
            if mask & regs::SDI_XMIT_ENABLE_MASK[spigot] == 0 {
                continue;
            }
            let Some(card) = self.card_io_channel(Channel(spigot as u32)) else {
                continue;
            };
            let bit = self.dev.read_register(
                regs::REG_SDI_TRANSMIT_CONTROL,
                regs::SDI_XMIT_ENABLE_MASK[card.idx()],
                regs::SDI_XMIT_ENABLE_SHIFT[card.idx()],
            )?;
            let virt_mask = regs::SDI_XMIT_ENABLE_MASK[spigot];
            *out = (*out & !virt_mask) | ((bit << regs::SDI_XMIT_ENABLE_SHIFT[spigot]) & virt_mask);
        }
        if shift > 0 && shift < 31 {
            *out >>= shift;
        }
        Ok(())
    }

    fn write_sdi_transmit(&mut self, value: u32, mask: u32, shift: u32) -> PhysResult<()> {
        if !self.dev.has_bidirectional_sdi() {
            return Ok(());
        }
        let positioned = regs::position_value(value, shift);
        for spigot in 0..8usize {
            if mask & regs::SDI_XMIT_ENABLE_MASK[spigot] == 0 {
                continue;
            }
            let Some(card) = self.card_io_channel(Channel(spigot as u32)) else {
                continue;
            };
            let bit = (positioned >> regs::SDI_XMIT_ENABLE_SHIFT[spigot]) & 1;
            self.dev.write_register(
                regs::REG_SDI_TRANSMIT_CONTROL,
                bit,
                regs::SDI_XMIT_ENABLE_MASK[card.idx()],
                regs::SDI_XMIT_ENABLE_SHIFT[card.idx()],
            )?;
        }
        Ok(())
    }

    /// The physical SDI spigot paired with a virtual one, via the SDI
    /// widget mapping.
    fn card_io_channel(&self, spigot: Channel) -> Option<Channel> {
        for (&w_virt, &w_card) in &self.tables.widget_v2p {
            if self.dev.widget_type(w_virt).is_sdi() && self.dev.widget_channel(w_virt) == spigot {
                let ch = self.dev.widget_channel(w_card);
                return ch.is_valid().then_some(ch);
            }
        }
        None
    }

    fn read_sdi_out_control(&mut self, out: &mut u32, mask: u32, shift: u32) -> PhysResult<()> {
        let reg = regs::REG_SDI_OUT_CONTROL[self.anchor.next().idx()];
        let mut raw = self.dev.read_register(reg, u32::MAX, 0)?;
        if mask & (regs::SDI_OUT_DS1_AUDSYS_BITS | regs::SDI_OUT_DS2_AUDSYS_BITS) != 0 {
            let ds1 = AudioSystem(regs::sdi_out_ds1_audsys(raw));
            if let Some(virt) = self.tables.virt_audio_system_opt(ds1) {
                raw = regs::sdi_out_with_ds1_audsys(raw, virt.0);
            }
            let ds2 = AudioSystem(regs::sdi_out_ds2_audsys(raw));
            if let Some(virt) = self.tables.virt_audio_system_opt(ds2) {
                raw = regs::sdi_out_with_ds2_audsys(raw, virt.0);
            }
        }
        *out = regs::apply_mask_shift(raw, mask, shift);
        Ok(())
    }

    fn write_sdi_out_control(&mut self, value: u32, mask: u32, shift: u32) -> PhysResult<()> {
        let reg = regs::REG_SDI_OUT_CONTROL[self.anchor.next().idx()];
        let mut positioned = regs::position_value(value, shift) & mask;
        if mask & regs::SDI_OUT_DS1_AUDSYS_BITS == regs::SDI_OUT_DS1_AUDSYS_BITS {
            let ds1 = AudioSystem(regs::sdi_out_ds1_audsys(positioned));
            if let Some(card) = self.tables.card_audio_system_opt(ds1) {
                positioned = regs::sdi_out_with_ds1_audsys(positioned, card.0);
            }
        }
        if mask & regs::SDI_OUT_DS2_AUDSYS_BITS == regs::SDI_OUT_DS2_AUDSYS_BITS {
            let ds2 = AudioSystem(regs::sdi_out_ds2_audsys(positioned));
            if let Some(card) = self.tables.card_audio_system_opt(ds2) {
                positioned = regs::sdi_out_with_ds2_audsys(positioned, card.0);
            }
        }
        self.dev.write_register(reg, positioned, u32::MAX, 0)
    }

    /// The two virtual inputs' status fields live at channel-parity slots
    /// of shared physical registers; each requested field is moved from
    /// the physical slot to the virtual one.
    fn read_input_status(&mut self, out: &mut u32, mask: u32, shift: u32) -> PhysResult<()> {
        for virt_slot in 0..2u32 {
            let ch = Channel(self.anchor.0 + virt_slot);
            let reg = regs::REG_INPUT_STATUS_FOR_CHANNEL[ch.idx()];
            let card_slot = (ch.0 % 2) as usize;
            for (masks, shifts) in INPUT_STATUS_FIELDS {
                let virt_mask = masks[virt_slot as usize];
                if mask & virt_mask == 0 {
                    continue;
                }
                let field = self
                    .dev
                    .read_register(reg, masks[card_slot], shifts[card_slot])?;
                *out = (*out & !virt_mask) | ((field << shifts[virt_slot as usize]) & virt_mask);
            }
        }
        if shift > 0 && shift < 31 {
            *out >>= shift;
        }
        Ok(())
    }

    fn read_sdi_in_3g_status(&mut self, out: &mut u32, mask: u32, shift: u32) -> PhysResult<()> {
        if mask == u32::MAX {
            // No field named: hand back the anchor channel's whole slice.
            let reg = regs::REG_SDI_IN_3G_STATUS_FOR_CHANNEL[self.anchor.idx()];
            let (card_mask, card_shift) = if self.anchor.0 < 4 {
                // Channels pair up two to a register; even ones own the
                // low half and get the whole register back.
                if self.anchor.0 % 2 == 0 {
                    (u32::MAX, 0)
                } else {
                    (0xFF00, 8)
                }
            } else {
                let slice = self.anchor.0 - 4;
                (0xFF << (8 * slice), 8 * slice)
            };
            *out = self.dev.read_register(reg, card_mask, card_shift)?;
            if shift > 0 && shift < 31 {
                *out >>= shift;
            }
            return Ok(());
        }
        for virt_slot in 0..2u32 {
            let ch = Channel(self.anchor.0 + virt_slot);
            let reg = regs::REG_SDI_IN_3G_STATUS_FOR_CHANNEL[ch.idx()];
            let slice = regs::sdi_in_3g_slice(ch);
            for field in SDI_IN_3G_FIELDS {
                let virt_mask = field << (8 * virt_slot);
                if mask & virt_mask == 0 {
                    continue;
                }
                let card_shift = 8 * slice + field.trailing_zeros();
                let bit = self
                    .dev
                    .read_register(reg, field << (8 * slice), card_shift)?;
                let virt_shift = 8 * virt_slot + field.trailing_zeros();
                *out = (*out & !virt_mask) | ((bit << virt_shift) & virt_mask);
            }
        }
        if shift > 0 && shift < 31 {
            *out >>= shift;
        }
        Ok(())
    }
}
