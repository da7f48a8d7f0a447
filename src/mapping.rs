// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The translation state built at connect time: bidirectional maps between
//! virtual and physical resources, and the per-register index of
//! crosspoint-select fields.
//!
//! Everything here is immutable once [`MappingTables::build`] returns;
//! lookups outside a map's domain return the sentinel the register engine
//! expects (invalid channel, black crosspoint, first mixer/audio system)
//! rather than failing.

use std::collections::BTreeMap;
use std::io::Write;

use thiserror::Error;

use crate::config::WidgetMapping;
use crate::regs;
use crate::types::AcXpt;
use crate::types::AudioSystem;
use crate::types::Channel;
use crate::types::InputXpt;
use crate::types::OutputXpt;
use crate::types::WidgetId;
use crate::types::WidgetType;
use crate::PhysicalDevice;

/// One crosspoint-select field: the register it lives in, the byte lane it
/// occupies (0..3), and the input crosspoint it routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegInfo {
    pub reg: u32,
    pub nibble: u32,
    pub input_xpt: InputXpt,
}

impl RegInfo {
    pub fn new(reg: u32, nibble: u32, input_xpt: InputXpt) -> RegInfo {
        RegInfo {
            reg,
            nibble,
            input_xpt,
        }
    }

    pub fn mask(&self) -> u32 {
        0xFF << (self.nibble * 8)
    }

    pub fn shift(&self) -> u32 {
        self.nibble * 8
    }
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("virtual device maps no widgets")]
    NoWidgets,
    #[error("widget {0:?} has {1} virtual input pins but {2} physical ones")]
    InputPinMismatch(WidgetId, usize, usize),
    #[error("widget {0:?} has {1} virtual output pins but only {2} physical ones")]
    OutputPinMismatch(WidgetId, usize, usize),
    #[error("{0} is beyond the virtual device's audio systems")]
    AudioSystemRange(AudioSystem),
    #[error("anchor {0} leaves no room for the paired output channel")]
    AnchorTooHigh(Channel),
    #[error("physical device introspection failed (errno {0})")]
    Phys(i32),
}

/// Buffer base of one of the logical device's audio systems. Audio buffers
/// stack downward from the top of device memory, one frame-sized region
/// per system. One system past the advertised count is still addressable.
pub fn virt_audio_memory_offset(audsys: AudioSystem) -> Result<u64, MappingError> {
    if audsys.0 >= regs::VIRT_NUM_AUDIO_SYSTEMS + 1 {
        return Err(MappingError::AudioSystemRange(audsys));
    }
    Ok(regs::VIRT_ACTIVE_MEMORY_SIZE - regs::DMA_FRAME_SIZE * (u64::from(audsys.0) + 1))
}

#[derive(Debug, Default)]
pub struct MappingTables {
    pub(crate) widget_v2p: BTreeMap<WidgetId, WidgetId>,
    pub(crate) widget_p2v: BTreeMap<WidgetId, WidgetId>,
    pub(crate) ixpt_v2p: BTreeMap<InputXpt, InputXpt>,
    pub(crate) ixpt_p2v: BTreeMap<InputXpt, InputXpt>,
    pub(crate) oxpt_v2p: BTreeMap<OutputXpt, OutputXpt>,
    pub(crate) oxpt_p2v: BTreeMap<OutputXpt, OutputXpt>,
    pub(crate) chan_v2p: BTreeMap<Channel, Channel>,
    pub(crate) chan_p2v: BTreeMap<Channel, Channel>,
    pub(crate) mixer_v2p: BTreeMap<u32, u32>,
    pub(crate) mixer_p2v: BTreeMap<u32, u32>,
    pub(crate) ac_v2p: BTreeMap<AcXpt, AcXpt>,
    pub(crate) ac_p2v: BTreeMap<AcXpt, AcXpt>,
    pub(crate) audsys_v2p: BTreeMap<AudioSystem, AudioSystem>,
    pub(crate) audsys_p2v: BTreeMap<AudioSystem, AudioSystem>,
    pub(crate) dat_v2p: BTreeMap<u64, u64>,
    pub(crate) dat_p2v: BTreeMap<u64, u64>,
    pub(crate) xptreg_virt: BTreeMap<u32, Vec<RegInfo>>,
    pub(crate) xptreg_phys: BTreeMap<u32, Vec<RegInfo>>,
}

impl MappingTables {
    /// Derives every table from the widget pair list and the device's
    /// introspection. Also selects the anchor channel: the lowest physical
    /// FrameStore channel among the mapped widgets, defaulting to 0.
    pub fn build<D: PhysicalDevice>(
        dev: &D,
        widgets: &[WidgetMapping],
    ) -> Result<(MappingTables, Channel), MappingError> {
        if widgets.is_empty() {
            return Err(MappingError::NoWidgets);
        }

        let mut t = MappingTables::default();
        let mut anchor: Option<Channel> = None;

        for wm in widgets {
            let w_virt = WidgetId(wm.virtual_widget_id);
            let w_card = WidgetId(wm.device_widget_id);
            t.widget_v2p.insert(w_virt, w_card);
            t.widget_p2v.insert(w_card, w_virt);
            if dev.widget_type(w_card) == WidgetType::FrameStore {
                let ch = dev.widget_channel(w_card);
                if ch.is_valid() {
                    anchor = Some(anchor.map_or(ch, |a| a.min(ch)));
                }
            }
        }
        let anchor = anchor.unwrap_or(Channel(0));
        // The inserter block and the Ch2 registers index anchor + 1.
        if !anchor.next().is_valid() {
            return Err(MappingError::AnchorTooHigh(anchor));
        }

        for (&w_virt, &w_card) in &t.widget_v2p {
            match dev.widget_type(w_card) {
                WidgetType::FrameStore => {
                    let ch_virt = dev.widget_channel(w_virt);
                    let ch_card = dev.widget_channel(w_card);
                    if !ch_virt.is_valid() || !ch_card.is_valid() {
                        continue;
                    }
                    t.chan_v2p.insert(ch_virt, ch_card);
                    t.chan_p2v.insert(ch_card, ch_virt);
                    t.audsys_v2p
                        .insert(ch_virt.audio_system(), ch_card.audio_system());
                    t.audsys_p2v
                        .insert(ch_card.audio_system(), ch_virt.audio_system());
                    t.ac_v2p
                        .insert(AcXpt::for_input(ch_virt), AcXpt::for_input(ch_card));
                    t.ac_p2v
                        .insert(AcXpt::for_input(ch_card), AcXpt::for_input(ch_virt));
                    t.ac_v2p
                        .insert(AcXpt::for_output(ch_virt), AcXpt::for_output(ch_card));
                    t.ac_p2v
                        .insert(AcXpt::for_output(ch_card), AcXpt::for_output(ch_virt));
                }
                WidgetType::Mixer => {
                    // Mixer registers exist for the first four mixers only.
                    let mx_virt = dev.widget_channel(w_virt);
                    let mx_card = dev.widget_channel(w_card);
                    if mx_virt.0 < 4 && mx_card.0 < 4 {
                        t.mixer_v2p.insert(mx_virt.0, mx_card.0);
                        t.mixer_p2v.insert(mx_card.0, mx_virt.0);
                    }
                }
                _ => {}
            }
        }

        for (&w_virt, &w_card) in &t.widget_v2p {
            let virt_ins = dev.widget_inputs(w_virt);
            let card_ins = dev.widget_inputs(w_card);
            if virt_ins.len() != card_ins.len() {
                return Err(MappingError::InputPinMismatch(
                    w_virt,
                    virt_ins.len(),
                    card_ins.len(),
                ));
            }
            for (&v, &c) in virt_ins.iter().zip(card_ins.iter()) {
                t.ixpt_v2p.insert(v, c);
                t.ixpt_p2v.insert(c, v);
            }

            let mut virt_outs = dev.widget_outputs(w_virt);
            virt_outs.retain(|&x| x != OutputXpt::MIXER1_VID_RGB);
            let card_outs = dev.widget_outputs(w_card);
            if virt_outs.len() > card_outs.len() {
                return Err(MappingError::OutputPinMismatch(
                    w_virt,
                    virt_outs.len(),
                    card_outs.len(),
                ));
            }
            for (&v, &c) in virt_outs.iter().zip(card_outs.iter()) {
                t.oxpt_v2p.insert(v, c);
                t.oxpt_p2v.insert(c, v);
            }
        }

        for (&a_virt, &a_card) in &t.audsys_v2p {
            let virt_off = virt_audio_memory_offset(a_virt)?;
            let card_off = dev
                .audio_memory_offset(a_card)
                .map_err(MappingError::Phys)?;
            if virt_off != card_off {
                let virt_base = virt_off & regs::DMA_BASE_MASK;
                let card_base = card_off & regs::DMA_BASE_MASK;
                t.dat_v2p.insert(virt_base, card_base);
                t.dat_p2v.insert(card_base, virt_base);
            }
        }

        for (&x_virt, &x_card) in &t.ixpt_v2p {
            if let Some((reg, nibble)) = dev.crosspoint_select_reg_info(x_virt) {
                t.xptreg_virt
                    .entry(reg)
                    .or_default()
                    .push(RegInfo::new(reg, nibble, x_virt));
            }
            if let Some((reg, nibble)) = dev.crosspoint_select_reg_info(x_card) {
                t.xptreg_phys
                    .entry(reg)
                    .or_default()
                    .push(RegInfo::new(reg, nibble, x_card));
            }
        }
        for fields in t.xptreg_virt.values_mut() {
            fields.sort();
        }
        for fields in t.xptreg_phys.values_mut() {
            fields.sort();
        }

        Ok((t, anchor))
    }

    pub fn card_channel(&self, ch: Channel) -> Channel {
        self.chan_v2p.get(&ch).copied().unwrap_or(Channel::INVALID)
    }

    pub fn virt_channel(&self, ch: Channel) -> Channel {
        self.chan_p2v.get(&ch).copied().unwrap_or(Channel::INVALID)
    }

    /// Misses fall back to the first mixer.
    pub fn card_mixer(&self, mixer: u32) -> u32 {
        self.mixer_v2p.get(&mixer).copied().unwrap_or(0)
    }

    pub fn card_input_xpt(&self, xpt: InputXpt) -> InputXpt {
        self.ixpt_v2p.get(&xpt).copied().unwrap_or(InputXpt::INVALID)
    }

    pub fn virt_input_xpt(&self, xpt: InputXpt) -> InputXpt {
        self.ixpt_p2v.get(&xpt).copied().unwrap_or(InputXpt::INVALID)
    }

    /// Misses route to black.
    pub fn card_output_xpt(&self, xpt: OutputXpt) -> OutputXpt {
        self.oxpt_v2p.get(&xpt).copied().unwrap_or(OutputXpt::BLACK)
    }

    pub fn virt_output_xpt(&self, xpt: OutputXpt) -> OutputXpt {
        self.oxpt_p2v.get(&xpt).copied().unwrap_or(OutputXpt::BLACK)
    }

    pub fn card_ac_xpt(&self, xpt: AcXpt) -> AcXpt {
        self.ac_v2p.get(&xpt).copied().unwrap_or(AcXpt::Invalid)
    }

    pub fn virt_ac_xpt(&self, xpt: AcXpt) -> AcXpt {
        self.ac_p2v.get(&xpt).copied().unwrap_or(AcXpt::Invalid)
    }

    /// Misses fall back to the first audio system.
    pub fn card_audio_system(&self, audsys: AudioSystem) -> AudioSystem {
        self.audsys_v2p
            .get(&audsys)
            .copied()
            .unwrap_or(AudioSystem(0))
    }

    pub fn virt_audio_system(&self, audsys: AudioSystem) -> AudioSystem {
        self.audsys_p2v
            .get(&audsys)
            .copied()
            .unwrap_or(AudioSystem(0))
    }

    pub fn card_audio_system_opt(&self, audsys: AudioSystem) -> Option<AudioSystem> {
        self.audsys_v2p.get(&audsys).copied()
    }

    pub fn virt_audio_system_opt(&self, audsys: AudioSystem) -> Option<AudioSystem> {
        self.audsys_p2v.get(&audsys).copied()
    }

    /// The crosspoint-select fields living in virtual register `reg`, in
    /// (register, lane) order.
    pub fn virt_xpt_fields(&self, reg: u32) -> Option<&[RegInfo]> {
        self.xptreg_virt.get(&reg).map(Vec::as_slice)
    }

    pub fn card_frame_base(&self, base: u64) -> Option<u64> {
        self.dat_v2p.get(&base).copied()
    }

    pub fn virt_frame_base(&self, base: u64) -> Option<u64> {
        self.dat_p2v.get(&base).copied()
    }

    /// Readable table dump for the `verbose` connect flag.
    pub fn dump<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "widgets (virtual -> physical):")?;
        for (v, c) in &self.widget_v2p {
            writeln!(w, "  {} -> {}", v.0, c.0)?;
        }
        writeln!(w, "channels:")?;
        for (v, c) in &self.chan_v2p {
            writeln!(w, "  {} -> {}", v, c)?;
        }
        writeln!(w, "mixers:")?;
        for (v, c) in &self.mixer_v2p {
            writeln!(w, "  {} -> {}", v + 1, c + 1)?;
        }
        writeln!(w, "audio systems:")?;
        for (v, c) in &self.audsys_v2p {
            writeln!(w, "  {} -> {}", v, c)?;
        }
        writeln!(w, "autocirculate endpoints:")?;
        for (v, c) in &self.ac_v2p {
            writeln!(w, "  {:?} -> {:?}", v, c)?;
        }
        writeln!(w, "input crosspoints:")?;
        for (v, c) in &self.ixpt_v2p {
            writeln!(w, "  {:#04x} -> {:#04x}", v.0, c.0)?;
        }
        writeln!(w, "output crosspoints:")?;
        for (v, c) in &self.oxpt_v2p {
            writeln!(w, "  {:#04x} -> {:#04x}", v.0, c.0)?;
        }
        writeln!(w, "DMA frame bases:")?;
        for (v, c) in &self.dat_v2p {
            writeln!(w, "  {:#010x} -> {:#010x}", v, c)?;
        }
        writeln!(w, "crosspoint-select fields (virtual side):")?;
        for (reg, fields) in &self.xptreg_virt {
            for f in fields {
                writeln!(w, "  reg {} lane {} xpt {:#04x}", reg, f.nibble, f.input_xpt.0)?;
            }
        }
        writeln!(w, "crosspoint-select fields (physical side):")?;
        for (reg, fields) in &self.xptreg_phys {
            for f in fields {
                writeln!(w, "  reg {} lane {} xpt {:#04x}", reg, f.nibble, f.input_xpt.0)?;
            }
        }
        Ok(())
    }
}
