// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Identifiers for the device resources the translator maps: channels,
//! audio systems, widgets, crosspoints, autocirculate endpoints and
//! interrupt sources.
//!
//! All of these are thin wrappers over the 32-bit words that cross the
//! client interface. Sentinel values mirror the SDK's: an unmapped lookup
//! yields [`Channel::INVALID`], [`OutputXpt::BLACK`], [`InputXpt::INVALID`]
//! or [`AcXpt::Invalid`] depending on the table.

use std::fmt;

use enumn::N;

/// 0-based frame-processing lane of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Channel(pub u32);

impl Channel {
    /// Sentinel for "no mapping".
    pub const INVALID: Channel = Channel(u32::MAX);

    pub fn idx(self) -> usize {
        self.0 as usize
    }

    pub fn is_valid(self) -> bool {
        self.0 < 8
    }

    /// The next lane. Per-channel register pairs address `anchor` and
    /// `anchor.next()`.
    pub fn next(self) -> Channel {
        Channel(self.0 + 1)
    }

    /// The audio system attached to this lane (1:1 on these devices).
    pub fn audio_system(self) -> AudioSystem {
        AudioSystem(self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ch{}", self.0.wrapping_add(1))
    }
}

/// 0-based audio capture/playback engine of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AudioSystem(pub u32);

impl AudioSystem {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AudioSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AudSys{}", self.0.wrapping_add(1))
    }
}

/// Opaque identifier of a fixed-function hardware block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WidgetId(pub u32);

/// Kind of hardware block a [`WidgetId`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetType {
    FrameStore,
    SdiIn,
    SdiOut,
    Mixer,
    Csc,
    Lut,
    AncInserter,
    AncExtractor,
    DualLinkIn,
    DualLinkOut,
    Mux425,
    Unknown,
}

impl WidgetType {
    /// SDI spigots are the widgets that participate in transmit-control
    /// bit translation.
    pub fn is_sdi(self) -> bool {
        matches!(self, WidgetType::SdiIn | WidgetType::SdiOut)
    }
}

/// A widget's input pin (routing destination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputXpt(pub u32);

impl InputXpt {
    pub const INVALID: InputXpt = InputXpt(u32::MAX);
}

/// A widget's output pin (routing source). Writing an output crosspoint ID
/// into an input crosspoint's register nibble connects the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputXpt(pub u32);

impl OutputXpt {
    /// The "not routed" source; also the sentinel for unmapped lookups.
    pub const BLACK: OutputXpt = OutputXpt(0);
    /// Mixer 1's RGB-flavored video output. The logical device model lists
    /// it but the physical pin sets do not, so the mapping builder drops it
    /// before pairing output pins.
    pub const MIXER1_VID_RGB: OutputXpt = OutputXpt(0xA4);
}

/// Autocirculate endpoint: one channel in one direction, with the SDK's
/// historical numbering (the first four output channels, the first two
/// input channels and two legacy entries come before everything else).
#[derive(PartialEq, Eq, PartialOrd, Ord, N, Clone, Copy, Debug)]
#[repr(u32)]
pub enum AcXpt {
    Channel1 = 0,
    Channel2 = 1,
    Channel3 = 2,
    Channel4 = 3,
    Input1 = 4,
    Input2 = 5,
    Matte = 6,
    FgKey = 7,
    Channel5 = 8,
    Channel6 = 9,
    Channel7 = 10,
    Channel8 = 11,
    Input3 = 12,
    Input4 = 13,
    Input5 = 14,
    Input6 = 15,
    Input7 = 16,
    Input8 = 17,
    Invalid = 0xFFFF_FFFF,
}

const AC_INPUT_FOR_CHANNEL: [AcXpt; 8] = [
    AcXpt::Input1,
    AcXpt::Input2,
    AcXpt::Input3,
    AcXpt::Input4,
    AcXpt::Input5,
    AcXpt::Input6,
    AcXpt::Input7,
    AcXpt::Input8,
];

const AC_OUTPUT_FOR_CHANNEL: [AcXpt; 8] = [
    AcXpt::Channel1,
    AcXpt::Channel2,
    AcXpt::Channel3,
    AcXpt::Channel4,
    AcXpt::Channel5,
    AcXpt::Channel6,
    AcXpt::Channel7,
    AcXpt::Channel8,
];

impl AcXpt {
    pub fn for_input(ch: Channel) -> AcXpt {
        AC_INPUT_FOR_CHANNEL
            .get(ch.idx())
            .copied()
            .unwrap_or(AcXpt::Invalid)
    }

    pub fn for_output(ch: Channel) -> AcXpt {
        AC_OUTPUT_FOR_CHANNEL
            .get(ch.idx())
            .copied()
            .unwrap_or(AcXpt::Invalid)
    }
}

/// Commands carried by the autocirculate control call.
#[derive(PartialEq, Eq, N, Clone, Copy, Debug)]
#[repr(u32)]
pub enum AcCommand {
    Init = 0,
    Start = 1,
    StartAtTime = 2,
    Stop = 3,
    Abort = 4,
    Pause = 5,
    Flush = 6,
    Preroll = 7,
    GetStatus = 8,
    GetFrameStamp = 9,
    Transfer = 10,
    SetActiveFrame = 11,
}

/// Interrupt sources a client can wait on.
#[derive(PartialEq, Eq, N, Clone, Copy, Debug)]
#[repr(u32)]
pub enum InterruptKind {
    Vertical = 0,
    Input1 = 1,
    Input2 = 2,
    Input3 = 3,
    Input4 = 4,
    Input5 = 5,
    Input6 = 6,
    Input7 = 7,
    Input8 = 8,
    Audio = 9,
    AudioInWrap = 10,
    AudioOutWrap = 11,
    Output2 = 12,
    Output3 = 13,
    Output4 = 14,
    Output5 = 15,
    Output6 = 16,
    Output7 = 17,
    Output8 = 18,
}

const INPUT_INTERRUPT_FOR_CHANNEL: [InterruptKind; 8] = [
    InterruptKind::Input1,
    InterruptKind::Input2,
    InterruptKind::Input3,
    InterruptKind::Input4,
    InterruptKind::Input5,
    InterruptKind::Input6,
    InterruptKind::Input7,
    InterruptKind::Input8,
];

/// Retargets a logical interrupt wait at the anchor's lanes. Input 1 and 2
/// follow the channel mapping; every per-channel output interrupt collapses
/// to the common vertical interrupt; anything else is device-global and
/// passes through.
pub fn translate_interrupt(kind: InterruptKind, anchor: Channel) -> InterruptKind {
    match kind {
        InterruptKind::Input1 => INPUT_INTERRUPT_FOR_CHANNEL
            .get(anchor.idx())
            .copied()
            .unwrap_or(kind),
        InterruptKind::Input2 => INPUT_INTERRUPT_FOR_CHANNEL
            .get(anchor.next().idx())
            .copied()
            .unwrap_or(kind),
        InterruptKind::Output2
        | InterruptKind::Output3
        | InterruptKind::Output4
        | InterruptKind::Output5
        | InterruptKind::Output6
        | InterruptKind::Output7
        | InterruptKind::Output8 => InterruptKind::Vertical,
        _ => kind,
    }
}

/// Reference-clock selector stored in the global control register.
#[derive(PartialEq, Eq, N, Clone, Copy, Debug)]
#[repr(u32)]
pub enum RefSource {
    External = 0,
    Input1 = 1,
    Input2 = 2,
    FreeRun = 3,
    Analog = 4,
    Hdmi = 5,
    Input3 = 6,
    Input4 = 7,
    Input5 = 8,
    Input6 = 9,
    Input7 = 10,
    Input8 = 11,
}

const REF_INPUT_FOR_CHANNEL: [RefSource; 8] = [
    RefSource::Input1,
    RefSource::Input2,
    RefSource::Input3,
    RefSource::Input4,
    RefSource::Input5,
    RefSource::Input6,
    RefSource::Input7,
    RefSource::Input8,
];

impl RefSource {
    /// The reference source naming channel `ch`'s SDI input, if any.
    pub fn for_input_channel(ch: Channel) -> Option<RefSource> {
        REF_INPUT_FOR_CHANNEL.get(ch.idx()).copied()
    }
}

/// One stereo pair within an audio system, as used by the PCM control
/// helper.
#[derive(PartialEq, Eq, N, Clone, Copy, Debug)]
#[repr(u32)]
pub enum AudioChannelPair {
    Ch1_2 = 0,
    Ch3_4 = 1,
    Ch5_6 = 2,
    Ch7_8 = 3,
    Ch9_10 = 4,
    Ch11_12 = 5,
    Ch13_14 = 6,
    Ch15_16 = 7,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_translation_follows_anchor() {
        let anchor = Channel(2);
        assert_eq!(
            translate_interrupt(InterruptKind::Input1, anchor),
            InterruptKind::Input3
        );
        assert_eq!(
            translate_interrupt(InterruptKind::Input2, anchor),
            InterruptKind::Input4
        );
        assert_eq!(
            translate_interrupt(InterruptKind::Output2, anchor),
            InterruptKind::Vertical
        );
        assert_eq!(
            translate_interrupt(InterruptKind::Output8, anchor),
            InterruptKind::Vertical
        );
        assert_eq!(
            translate_interrupt(InterruptKind::Vertical, anchor),
            InterruptKind::Vertical
        );
        assert_eq!(
            translate_interrupt(InterruptKind::Audio, anchor),
            InterruptKind::Audio
        );
    }

    #[test]
    fn ac_xpt_tables_use_the_historical_numbering() {
        assert_eq!(AcXpt::for_output(Channel(0)), AcXpt::Channel1);
        assert_eq!(AcXpt::for_output(Channel(4)), AcXpt::Channel5);
        assert_eq!(AcXpt::for_input(Channel(1)), AcXpt::Input2);
        assert_eq!(AcXpt::for_input(Channel(2)), AcXpt::Input3);
        assert_eq!(AcXpt::for_input(Channel(9)), AcXpt::Invalid);
        assert_eq!(AcXpt::n(12), Some(AcXpt::Input3));
        assert_eq!(AcXpt::n(42), None);
    }

    #[test]
    fn ref_source_for_anchor_channels() {
        assert_eq!(RefSource::for_input_channel(Channel(0)), Some(RefSource::Input1));
        assert_eq!(RefSource::for_input_channel(Channel(2)), Some(RefSource::Input3));
        assert_eq!(RefSource::for_input_channel(Channel(8)), None);
        assert_eq!(RefSource::n(3), Some(RefSource::FreeRun));
    }
}
