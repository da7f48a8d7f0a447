// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Structured driver messages and autocirculate control.
//!
//! Messages travel as byte buffers with a fixed header; the payload types
//! the translator understands get their channel and audio-system words
//! rewritten in place before and after the physical call. Unknown types
//! pass through untouched.

use std::mem::size_of;

use enumn::N;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;

use crate::dispatch::Translator;
use crate::types::AcCommand;
use crate::types::AcXpt;
use crate::types::AudioSystem;
use crate::types::Channel;
use crate::PhysResult;
use crate::PhysicalDevice;

/// "VCAP", the tag carried by every structured message.
pub const MSG_TAG: u32 = 0x5643_4150;

#[derive(PartialEq, Eq, N, Clone, Copy, Debug)]
#[repr(u32)]
pub enum MsgType {
    RegisterRead = 1,
    RegisterWrite = 2,
    AcStatus = 3,
    AcTransfer = 4,
    FrameStamp = 5,
}

#[repr(C)]
#[derive(Debug, AsBytes, FromZeroes, FromBytes)]
pub struct MsgHeader {
    pub tag: u32,
    pub msg_type: u32,
    pub size: u32,
}

#[repr(C)]
#[derive(Debug, AsBytes, FromZeroes, FromBytes)]
pub struct AcStatusMsg {
    pub header: MsgHeader,
    pub channel_spec: u32,
    pub state: u32,
    pub start_frame: u32,
    pub end_frame: u32,
    pub active_frame: u32,
    pub frames_processed: u32,
    pub frames_dropped: u32,
    pub buffer_level: u32,
    pub audio_system: u32,
}

#[repr(C)]
#[derive(Debug, AsBytes, FromZeroes, FromBytes)]
pub struct AcTransferMsg {
    pub header: MsgHeader,
    pub channel_spec: u32,
    pub frame_number: u32,
    pub video_bytes: u32,
    pub audio_bytes: u32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Debug, AsBytes, FromZeroes, FromBytes)]
pub struct FrameStampMsg {
    pub header: MsgHeader,
    pub channel: u32,
    pub frame: u32,
    pub frame_time_lo: u32,
    pub frame_time_hi: u32,
    pub current_time_lo: u32,
    pub current_time_hi: u32,
}

/// Argument block of the autocirculate entry point, mirroring the
/// physical SDK's own layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcData {
    pub command: u32,
    pub channel_spec: u32,
    pub lval1: i32,
    pub lval2: i32,
    pub lval3: i32,
    pub bval1: u32,
    pub bval2: u32,
}

impl<D: PhysicalDevice> Translator<D> {
    /// Translates and forwards one structured message. The reply the
    /// device leaves in `buf` is rewritten back into virtual terms even
    /// when the call itself failed.
    pub(crate) fn message(&mut self, buf: &mut [u8]) -> PhysResult<()> {
        let Some(header) = MsgHeader::read_from_prefix(buf) else {
            return Err(libc::EINVAL);
        };
        if header.tag != MSG_TAG
            || header.size as usize > buf.len()
            || (header.size as usize) < size_of::<MsgHeader>()
        {
            return Err(libc::EINVAL);
        }
        match MsgType::n(header.msg_type) {
            // Batched register access bypasses the register engine and
            // cannot be translated.
            Some(MsgType::RegisterRead) | Some(MsgType::RegisterWrite) => Err(libc::ENOTTY),
            Some(MsgType::AcStatus) => self.message_ac_status(buf),
            Some(MsgType::AcTransfer) => self.message_ac_transfer(buf),
            Some(MsgType::FrameStamp) => self.message_frame_stamp(buf),
            None => self.dev.message(buf),
        }
    }

    /// Runs one autocirculate command, rewriting the channel spec both
    /// ways. `Init` additionally carries an audio system in `lval3`.
    pub(crate) fn auto_circulate(&mut self, data: &mut AcData) -> PhysResult<()> {
        data.channel_spec = self.card_ac_spec(data.channel_spec);
        let is_init = data.command == AcCommand::Init as u32;
        if is_init {
            data.lval3 = self
                .tables
                .card_audio_system(AudioSystem(data.lval3 as u32))
                .0 as i32;
        }
        let res = self.dev.auto_circulate(data);
        data.channel_spec = self.virt_ac_spec(data.channel_spec);
        if is_init {
            data.lval3 = self
                .tables
                .virt_audio_system(AudioSystem(data.lval3 as u32))
                .0 as i32;
        }
        res
    }

    fn card_ac_spec(&self, spec: u32) -> u32 {
        let xpt = AcXpt::n(spec).unwrap_or(AcXpt::Invalid);
        self.tables.card_ac_xpt(xpt) as u32
    }

    fn virt_ac_spec(&self, spec: u32) -> u32 {
        let xpt = AcXpt::n(spec).unwrap_or(AcXpt::Invalid);
        self.tables.virt_ac_xpt(xpt) as u32
    }

    fn message_ac_status(&mut self, buf: &mut [u8]) -> PhysResult<()> {
        let Some(mut msg) = AcStatusMsg::read_from_prefix(buf) else {
            return Err(libc::EINVAL);
        };
        if (msg.header.size as usize) < size_of::<AcStatusMsg>() {
            return Err(libc::EINVAL);
        }
        msg.channel_spec = self.card_ac_spec(msg.channel_spec);
        buf[..size_of::<AcStatusMsg>()].copy_from_slice(msg.as_bytes());
        let res = self.dev.message(buf);
        if let Some(mut reply) = AcStatusMsg::read_from_prefix(buf) {
            reply.channel_spec = self.virt_ac_spec(reply.channel_spec);
            reply.audio_system = self
                .tables
                .virt_audio_system(AudioSystem(reply.audio_system))
                .0;
            buf[..size_of::<AcStatusMsg>()].copy_from_slice(reply.as_bytes());
        }
        res
    }

    fn message_ac_transfer(&mut self, buf: &mut [u8]) -> PhysResult<()> {
        let Some(mut msg) = AcTransferMsg::read_from_prefix(buf) else {
            return Err(libc::EINVAL);
        };
        if (msg.header.size as usize) < size_of::<AcTransferMsg>() {
            return Err(libc::EINVAL);
        }
        msg.channel_spec = self.card_ac_spec(msg.channel_spec);
        buf[..size_of::<AcTransferMsg>()].copy_from_slice(msg.as_bytes());
        let res = self.dev.message(buf);
        if let Some(mut reply) = AcTransferMsg::read_from_prefix(buf) {
            reply.channel_spec = self.virt_ac_spec(reply.channel_spec);
            buf[..size_of::<AcTransferMsg>()].copy_from_slice(reply.as_bytes());
        }
        res
    }

    fn message_frame_stamp(&mut self, buf: &mut [u8]) -> PhysResult<()> {
        let Some(mut msg) = FrameStampMsg::read_from_prefix(buf) else {
            return Err(libc::EINVAL);
        };
        if (msg.header.size as usize) < size_of::<FrameStampMsg>() {
            return Err(libc::EINVAL);
        }
        msg.channel = self.tables.card_channel(Channel(msg.channel)).0;
        buf[..size_of::<FrameStampMsg>()].copy_from_slice(msg.as_bytes());
        let res = self.dev.message(buf);
        if let Some(mut reply) = FrameStampMsg::read_from_prefix(buf) {
            reply.channel = self.tables.virt_channel(Channel(reply.channel)).0;
            buf[..size_of::<FrameStampMsg>()].copy_from_slice(reply.as_bytes());
        }
        res
    }
}
