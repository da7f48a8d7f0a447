// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Test fixtures: an 8-channel mock board that journals every call, and
//! the widget pairing the tests connect with (virtual channels 1/2 onto
//! physical channels 3/4).

use std::collections::BTreeMap;

use anyhow::bail;
use zerocopy::FromBytes;

use crate::config::WidgetMapping;
use crate::dispatch::Translator;
use crate::mapping::MappingTables;
use crate::messages::AcData;
use crate::messages::MsgHeader;
use crate::regs;
use crate::types::AudioChannelPair;
use crate::types::AudioSystem;
use crate::types::Channel;
use crate::types::InputXpt;
use crate::types::InterruptKind;
use crate::types::OutputXpt;
use crate::types::WidgetId;
use crate::types::WidgetType;
use crate::PhysResult;
use crate::PhysicalDevice;
use crate::PhysicalSdk;

pub(crate) const MOCK_SERIAL: &str = "0123456789";
pub(crate) const MOCK_VDID: &str = "vd-test-0001";

/// Input-side crosspoints of the mock's FrameStores, by channel.
pub(crate) const IXPT_FS_INPUT: [InputXpt; 8] = [
    InputXpt(0x10),
    InputXpt(0x11),
    InputXpt(0x12),
    InputXpt(0x13),
    InputXpt(0x14),
    InputXpt(0x15),
    InputXpt(0x16),
    InputXpt(0x17),
];
pub(crate) const IXPT_FS1_INPUT: InputXpt = InputXpt(0x10);

/// Output-side crosspoints of the mock's SDI inputs, by channel.
pub(crate) const OXPT_SDI_IN: [OutputXpt; 8] = [
    OutputXpt(0x40),
    OutputXpt(0x41),
    OutputXpt(0x42),
    OutputXpt(0x43),
    OutputXpt(0x44),
    OutputXpt(0x45),
    OutputXpt(0x46),
    OutputXpt(0x47),
];

/// The select register holding the FrameStore input nibbles (0x10 / 4
/// past the select-table base).
pub(crate) const XPT_REG_FS: u32 = 140;

/// One physical call as the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    ReadReg {
        reg: u32,
        mask: u32,
        shift: u32,
    },
    WriteReg {
        reg: u32,
        value: u32,
        mask: u32,
        shift: u32,
    },
    Dma {
        engine: u32,
        is_read: bool,
        frame: u32,
        card_offset: u64,
        len: usize,
        sync: bool,
    },
    Interrupt {
        kind: InterruptKind,
        timeout_ms: u32,
    },
    Ac {
        command: u32,
        channel_spec: u32,
    },
    Message {
        msg_type: u32,
    },
    PcmControl {
        audio_system: AudioSystem,
        pair: AudioChannelPair,
        enable: bool,
    },
}

/// An 8-channel board with FrameStore widgets 1..=8, SDI inputs 11..=18,
/// SDI outputs 21..=28 and mixers 31..=34. Register state is sparse and
/// every call lands in `ops`.
pub(crate) struct MockDevice {
    pub(crate) regs: BTreeMap<u32, u32>,
    pub(crate) ops: Vec<Op>,
    pub(crate) bidirectional: bool,
    pub(crate) fail_with: Option<i32>,
    lopsided: bool,
    pub(crate) message_reply: Option<Vec<u8>>,
    pub(crate) last_message: Vec<u8>,
    pub(crate) ac_reply: Option<AcData>,
    pub(crate) last_ac: Option<AcData>,
}

impl MockDevice {
    pub(crate) const DEVICE_ID: u32 = 0x1058_0008;
    pub(crate) const MEMORY_SIZE: u64 = 0x8000_0000;

    pub(crate) fn eight_channel() -> MockDevice {
        MockDevice {
            regs: BTreeMap::new(),
            ops: Vec::new(),
            bidirectional: true,
            fail_with: None,
            lopsided: false,
            message_reply: None,
            last_message: Vec::new(),
            ac_reply: None,
            last_ac: None,
        }
    }

    /// Same board plus widget 99, a FrameStore with two input pins. No
    /// real widget looks like that; it exercises the pairing checks.
    pub(crate) fn with_lopsided_widget() -> MockDevice {
        MockDevice {
            lopsided: true,
            ..MockDevice::eight_channel()
        }
    }
}

impl PhysicalDevice for MockDevice {
    fn device_id(&self) -> u32 {
        Self::DEVICE_ID
    }

    fn display_name(&self) -> String {
        "MockBoard".to_string()
    }

    fn read_register(&mut self, reg: u32, mask: u32, shift: u32) -> PhysResult<u32> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.ops.push(Op::ReadReg { reg, mask, shift });
        let value = self.regs.get(&reg).copied().unwrap_or(0);
        Ok(regs::apply_mask_shift(value, mask, shift))
    }

    fn write_register(&mut self, reg: u32, value: u32, mask: u32, shift: u32) -> PhysResult<()> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.ops.push(Op::WriteReg {
            reg,
            value,
            mask,
            shift,
        });
        let cur = self.regs.get(&reg).copied().unwrap_or(0);
        let positioned = regs::position_value(value, shift);
        self.regs.insert(reg, (cur & !mask) | (positioned & mask));
        Ok(())
    }

    fn dma_transfer(
        &mut self,
        engine: u32,
        is_read: bool,
        frame: u32,
        buffer: &mut [u8],
        card_offset: u64,
        _num_segments: u32,
        _host_pitch: u32,
        _card_pitch: u32,
        sync: bool,
    ) -> PhysResult<()> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.ops.push(Op::Dma {
            engine,
            is_read,
            frame,
            card_offset,
            len: buffer.len(),
            sync,
        });
        Ok(())
    }

    fn wait_for_interrupt(&mut self, kind: InterruptKind, timeout_ms: u32) -> PhysResult<()> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.ops.push(Op::Interrupt { kind, timeout_ms });
        Ok(())
    }

    fn auto_circulate(&mut self, data: &mut AcData) -> PhysResult<()> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.ops.push(Op::Ac {
            command: data.command,
            channel_spec: data.channel_spec,
        });
        self.last_ac = Some(*data);
        if let Some(reply) = self.ac_reply {
            *data = reply;
        }
        Ok(())
    }

    fn message(&mut self, buf: &mut [u8]) -> PhysResult<()> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        let msg_type = MsgHeader::read_from_prefix(&*buf)
            .map(|h| h.msg_type)
            .unwrap_or(0);
        self.ops.push(Op::Message { msg_type });
        self.last_message = buf.to_vec();
        if let Some(reply) = &self.message_reply {
            let n = reply.len().min(buf.len());
            buf[..n].copy_from_slice(&reply[..n]);
        }
        Ok(())
    }

    fn has_bidirectional_sdi(&self) -> bool {
        self.bidirectional
    }

    fn num_audio_systems(&self) -> u32 {
        8
    }

    fn active_memory_size(&self) -> PhysResult<u64> {
        Ok(Self::MEMORY_SIZE)
    }

    fn audio_memory_offset(&self, audsys: AudioSystem) -> PhysResult<u64> {
        if audsys.0 >= 8 {
            return Err(libc::EINVAL);
        }
        Ok(Self::MEMORY_SIZE - regs::DMA_FRAME_SIZE * (u64::from(audsys.0) + 1))
    }

    fn widget_type(&self, id: WidgetId) -> WidgetType {
        match id.0 {
            1..=8 => WidgetType::FrameStore,
            11..=18 => WidgetType::SdiIn,
            21..=28 => WidgetType::SdiOut,
            31..=34 => WidgetType::Mixer,
            99 if self.lopsided => WidgetType::FrameStore,
            _ => WidgetType::Unknown,
        }
    }

    fn widget_channel(&self, id: WidgetId) -> Channel {
        match id.0 {
            1..=8 => Channel(id.0 - 1),
            11..=18 => Channel(id.0 - 11),
            21..=28 => Channel(id.0 - 21),
            31..=34 => Channel(id.0 - 31),
            99 if self.lopsided => Channel(4),
            _ => Channel::INVALID,
        }
    }

    fn widget_inputs(&self, id: WidgetId) -> Vec<InputXpt> {
        match id.0 {
            1..=8 => vec![IXPT_FS_INPUT[(id.0 - 1) as usize]],
            21..=28 => vec![InputXpt(0x30 + id.0 - 21)],
            31..=34 => {
                let base = 0x50 + 4 * (id.0 - 31);
                (base..base + 4).map(InputXpt).collect()
            }
            99 if self.lopsided => vec![InputXpt(0x18), InputXpt(0x19)],
            _ => Vec::new(),
        }
    }

    fn widget_outputs(&self, id: WidgetId) -> Vec<OutputXpt> {
        match id.0 {
            1..=8 => vec![OutputXpt(0x60 + id.0 - 1)],
            11..=18 => vec![OXPT_SDI_IN[(id.0 - 11) as usize]],
            31..=34 => {
                let mut outs = vec![OutputXpt(0x70 + id.0 - 31)];
                if id.0 == 31 {
                    outs.push(OutputXpt::MIXER1_VID_RGB);
                }
                outs
            }
            99 if self.lopsided => vec![OutputXpt(0x68)],
            _ => Vec::new(),
        }
    }

    fn crosspoint_select_reg_info(&self, xpt: InputXpt) -> Option<(u32, u32)> {
        match xpt.0 {
            0x10..=0x17 | 0x30..=0x37 | 0x50..=0x5F => Some((136 + xpt.0 / 4, xpt.0 % 4)),
            _ => None,
        }
    }

    fn set_audio_pcm_control(
        &mut self,
        audio_system: AudioSystem,
        pair: AudioChannelPair,
        enable: bool,
    ) -> PhysResult<()> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.ops.push(Op::PcmControl {
            audio_system,
            pair,
            enable,
        });
        Ok(())
    }
}

/// Hands out a single mock board for [`MOCK_SERIAL`].
pub(crate) struct MockSdk {
    pub(crate) device: Option<MockDevice>,
}

impl MockSdk {
    pub(crate) fn new() -> MockSdk {
        MockSdk {
            device: Some(MockDevice::eight_channel()),
        }
    }
}

impl PhysicalSdk for MockSdk {
    type Device = MockDevice;

    fn open_by_serial(&mut self, serial: &str) -> anyhow::Result<MockDevice> {
        if serial != MOCK_SERIAL {
            bail!("no board with serial {}", serial);
        }
        Ok(self
            .device
            .take()
            .unwrap_or_else(MockDevice::eight_channel))
    }
}

/// Virtual channels 1/2 onto physical channels 3/4, with the matching
/// SDI spigots and one mixer.
pub(crate) fn mock_widget_pairs() -> Vec<WidgetMapping> {
    [(3, 1), (4, 2), (13, 11), (14, 12), (23, 21), (24, 22), (32, 31)]
        .into_iter()
        .map(|(device_widget_id, virtual_widget_id)| WidgetMapping {
            device_widget_id,
            virtual_widget_id,
        })
        .collect()
}

pub(crate) fn lopsided_widget_pairs() -> Vec<WidgetMapping> {
    vec![WidgetMapping {
        device_widget_id: 99,
        virtual_widget_id: 1,
    }]
}

/// The config file content matching [`mock_widget_pairs`].
pub(crate) fn mock_config_json() -> String {
    let widgets: Vec<serde_json::Value> = mock_widget_pairs()
        .iter()
        .map(|wm| {
            serde_json::json!({
                "deviceWidgetId": wm.device_widget_id,
                "virtualWidgetId": wm.virtual_widget_id,
            })
        })
        .collect();
    serde_json::json!({
        "v2": {
            "deviceConfigList": [{
                "serial": MOCK_SERIAL,
                "virtualDevices": [{
                    "id": MOCK_VDID,
                    "name": "Test VDev",
                    "mappedWidgets": widgets,
                }],
            }],
        }
    })
    .to_string()
}

/// A translator connected to the mock board with [`mock_widget_pairs`];
/// the anchor lands on physical channel 3.
pub(crate) fn test_translator() -> Translator<MockDevice> {
    let dev = MockDevice::eight_channel();
    let (tables, anchor) = MappingTables::build(&dev, &mock_widget_pairs()).unwrap();
    let sim_id = dev.device_id();
    Translator::new(dev, tables, anchor, sim_id)
}
