// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Client-side shim presenting a fixed two-channel capture device on top
//! of a larger multi-channel board.
//!
//! The shim sits between an application written for the small device and
//! the vendor SDK driving the real hardware. Every low-level call the
//! application makes (register access with mask and shift, DMA,
//! interrupt waits, autocirculate, structured driver messages) is
//! rewritten onto the channels, crosspoints and audio systems that a
//! configuration file assigns to this client, so several applications
//! can share one board without seeing each other.
//!
//! # Traits to implement by the SDK adapter
//!
//! * [`PhysicalSdk`] opens boards by serial number.
//! * [`PhysicalDevice`] is the low-level surface of one opened board:
//!   masked register access, DMA, interrupts, autocirculate, messages,
//!   and the widget introspection the mapping builder consumes.
//!
//! Applications talk to the shim through [`CaptureClient`], usually
//! obtained from [`create_client`].
//!
//! # Anatomy of a connection
//!
//! `connect` parses the parameter string ([`config::ConnectParams`]),
//! loads the virtual-device entry from the JSON configuration, opens the
//! board, and derives the translation tables
//! ([`mapping::MappingTables`]) from the widget pairing. Register
//! traffic then flows through the dispatch engine, DMA through the
//! frame-base remapper, and structured messages through the typed
//! rewriters in [`messages`].

pub mod config;
mod dispatch;
mod dma;
pub mod mapping;
pub mod messages;
pub mod regs;
pub mod types;

#[cfg(test)]
mod testutil;

use std::io::stderr;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use log::debug;
use log::error;
use log::info;
use log::warn;

use config::ConnectParams;
use dispatch::Translator;
use mapping::MappingTables;
use messages::AcData;
use types::AudioChannelPair;
use types::AudioSystem;
use types::Channel;
use types::InputXpt;
use types::InterruptKind;
use types::OutputXpt;
use types::WidgetId;
use types::WidgetType;

/// Errno-style result used across the physical-device surface, mirroring
/// the SDK's own convention.
pub type PhysResult<T> = Result<T, i32>;

/// Interface version [`create_client`] expects from its caller.
pub const LIBRARY_INTERFACE_VERSION: u32 = 2;

/// Low-level surface of one opened capture board.
///
/// Register access carries `(mask, shift)` pairs: reads return the field
/// already masked and shifted, writes take the field value unshifted and
/// position it under the mask. The translator relies on both behaviors
/// when it re-targets an access.
pub trait PhysicalDevice {
    /// Board identification word, served to clients as the virtual
    /// device's own id.
    fn device_id(&self) -> u32;

    fn display_name(&self) -> String;

    fn read_register(&mut self, reg: u32, mask: u32, shift: u32) -> PhysResult<u32>;

    fn write_register(&mut self, reg: u32, value: u32, mask: u32, shift: u32) -> PhysResult<()>;

    fn dma_transfer(
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
    ) -> PhysResult<()>;

    fn wait_for_interrupt(&mut self, interrupt: InterruptKind, timeout_ms: u32) -> PhysResult<()>;

    fn auto_circulate(&mut self, data: &mut AcData) -> PhysResult<()>;

    /// Forwards one structured driver message; the reply is left in
    /// `buf`.
    fn message(&mut self, buf: &mut [u8]) -> PhysResult<()>;

    /// Whether the board's SDI spigots can be switched between input and
    /// output.
    fn has_bidirectional_sdi(&self) -> bool;

    fn num_audio_systems(&self) -> u32;

    fn active_memory_size(&self) -> PhysResult<u64>;

    /// Byte offset of `audsys`'s buffer in device memory.
    fn audio_memory_offset(&self, audsys: AudioSystem) -> PhysResult<u64>;

    fn widget_type(&self, id: WidgetId) -> WidgetType;

    /// The channel (or mixer index, for mixer widgets) a widget serves.
    fn widget_channel(&self, id: WidgetId) -> Channel;

    fn widget_inputs(&self, id: WidgetId) -> Vec<InputXpt>;

    fn widget_outputs(&self, id: WidgetId) -> Vec<OutputXpt>;

    /// Where the select field of input crosspoint `xpt` lives:
    /// `(register, byte lane)`.
    fn crosspoint_select_reg_info(&self, xpt: InputXpt) -> Option<(u32, u32)>;

    /// SDK helper for non-PCM flagging of one audio channel pair.
    fn set_audio_pcm_control(
        &mut self,
        audio_system: AudioSystem,
        pair: AudioChannelPair,
        enable: bool,
    ) -> PhysResult<()>;
}

/// Entry point into the vendor SDK.
pub trait PhysicalSdk {
    type Device: PhysicalDevice;

    fn open_by_serial(&mut self, serial: &str) -> anyhow::Result<Self::Device>;
}

/// The client-facing device interface.
///
/// Operations return `bool` success; failures are absorbed after logging
/// at debug level, matching what applications written against the
/// original device expect.
pub trait CaptureClient {
    fn name(&self) -> String;

    fn description(&self) -> String;

    fn is_connected(&self) -> bool;

    /// Establishes the session. Safe to call repeatedly; an established
    /// session is kept.
    fn connect(&mut self) -> bool;

    fn disconnect(&mut self) -> bool;

    /// Reads a register field into `out`. Bits outside the handled
    /// fields keep whatever the caller passed in.
    fn read_register(&mut self, reg: u32, out: &mut u32, mask: u32, shift: u32) -> bool;

    fn write_register(&mut self, reg: u32, value: u32, mask: u32, shift: u32) -> bool;

    fn dma_transfer(
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
    ) -> bool;

    fn wait_for_interrupt(&mut self, interrupt: InterruptKind, timeout_ms: u32) -> bool;

    fn auto_circulate(&mut self, data: &mut AcData) -> bool;

    fn message(&mut self, buf: &mut [u8]) -> bool;

    /// Remote parameters are not implemented by this client.
    fn get_bool_param(&mut self, _param: u32, _out: &mut u32) -> bool {
        false
    }

    fn get_numeric_param(&mut self, _param: u32, _out: &mut u32) -> bool {
        false
    }

    fn get_supported(&mut self, _param: u32, _out: &mut Vec<u32>) -> bool {
        false
    }
}

/// A two-channel virtual device bound to one board of `S`.
pub struct VirtualDevice<S: PhysicalSdk> {
    sdk: S,
    params: ConnectParams,
    name: String,
    description: String,
    session: Option<Translator<S::Device>>,
}

impl<S: PhysicalSdk> VirtualDevice<S> {
    /// Builds an unconnected device from a query-string parameter list.
    /// Parameter problems surface when [`CaptureClient::connect`] runs.
    pub fn new(sdk: S, param_string: &str) -> VirtualDevice<S> {
        let params = ConnectParams::parse(param_string).unwrap_or_else(|e| {
            error!("invalid connect parameters: {}", e);
            ConnectParams::default()
        });
        VirtualDevice {
            sdk,
            params,
            name: String::new(),
            description: String::new(),
            session: None,
        }
    }

    fn establish(&mut self) -> anyhow::Result<()> {
        if self.params.help {
            eprintln!("{}", config::USAGE);
            bail!("'help' requested, not connecting");
        }
        let req = self.params.required()?;
        let vd = config::load_virtual_device(
            req.config_path,
            req.device_serial,
            req.virtual_device_id,
        )
        .context("loading virtual device configuration")?;
        let dev = self
            .sdk
            .open_by_serial(req.device_serial)
            .with_context(|| format!("opening device {}", req.device_serial))?;
        let (tables, anchor) = MappingTables::build(&dev, &vd.mapped_widgets)
            .context("building translation maps")?;
        if self.params.verbose {
            let _ = tables.dump(&mut stderr().lock());
        }
        let memory_size = dev
            .active_memory_size()
            .map_err(|errno| anyhow!("device memory size query failed (errno {})", errno))?;
        self.description = format!(
            "{}, {} virtual device for: {} {}",
            vd.name,
            anchor,
            dev.display_name(),
            req.device_serial
        );
        info!(
            "connected {} (anchor {}, {} audio systems, {:#x} bytes of device memory)",
            self.description,
            anchor,
            dev.num_audio_systems(),
            memory_size
        );
        let sim_id = dev.device_id();
        self.session = Some(Translator::new(dev, tables, anchor, sim_id));
        self.name = vd.name;
        Ok(())
    }

    fn with_session<R>(
        &mut self,
        what: &str,
        f: impl FnOnce(&mut Translator<S::Device>) -> PhysResult<R>,
    ) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match f(session) {
            Ok(_) => true,
            Err(errno) => {
                debug!("{} failed (errno {})", what, errno);
                false
            }
        }
    }
}

impl<S: PhysicalSdk> CaptureClient for VirtualDevice<S> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn connect(&mut self) -> bool {
        if self.session.is_some() {
            return true;
        }
        match self.establish() {
            Ok(()) => true,
            Err(e) => {
                error!("connect failed: {:#}", e);
                false
            }
        }
    }

    /// Reports success but keeps the session; the board stays open for
    /// the client's remaining calls.
    fn disconnect(&mut self) -> bool {
        info!("disconnect requested for {}", self.name);
        true
    }

    fn read_register(&mut self, reg: u32, out: &mut u32, mask: u32, shift: u32) -> bool {
        self.with_session("register read", |s| s.read_register(reg, out, mask, shift))
    }

    fn write_register(&mut self, reg: u32, value: u32, mask: u32, shift: u32) -> bool {
        self.with_session("register write", |s| {
            s.write_register(reg, value, mask, shift)
        })
    }

    fn dma_transfer(
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
    ) -> bool {
        self.with_session("DMA transfer", |s| {
            s.dma_transfer(
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
        })
    }

    fn wait_for_interrupt(&mut self, interrupt: InterruptKind, timeout_ms: u32) -> bool {
        self.with_session("interrupt wait", |s| {
            s.wait_for_interrupt(interrupt, timeout_ms)
        })
    }

    fn auto_circulate(&mut self, data: &mut AcData) -> bool {
        self.with_session("autocirculate", |s| s.auto_circulate(data))
    }

    fn message(&mut self, buf: &mut [u8]) -> bool {
        self.with_session("driver message", |s| s.message(buf))
    }
}

/// Library entry point: builds a client from a parameter string and
/// connects it. Returns `None` when the connection cannot be
/// established.
pub fn create_client<S: PhysicalSdk>(
    sdk: S,
    param_string: &str,
    interface_version: u32,
) -> Option<VirtualDevice<S>> {
    if interface_version != LIBRARY_INTERFACE_VERSION {
        warn!(
            "interface version {} requested, library implements {}",
            interface_version, LIBRARY_INTERFACE_VERSION
        );
    }
    let mut client = VirtualDevice::new(sdk, param_string);
    if client.connect() {
        Some(client)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::mock_config_json;
    use crate::testutil::MockSdk;
    use crate::testutil::Op;
    use crate::testutil::MOCK_SERIAL;
    use crate::testutil::MOCK_VDID;

    use std::path::PathBuf;

    fn config_file(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "vcap-shim-test-{}-{}.json",
            std::process::id(),
            tag
        ));
        std::fs::write(&path, mock_config_json()).unwrap();
        path
    }

    fn connect_params(path: &PathBuf) -> String {
        format!(
            "cp2configpath={}&devicesn={}&vdid={}",
            path.display(),
            MOCK_SERIAL,
            MOCK_VDID
        )
    }

    #[test]
    fn missing_required_parameter_fails_connect() {
        let mut dev = VirtualDevice::new(
            MockSdk::new(),
            &format!("devicesn={}&vdid={}", MOCK_SERIAL, MOCK_VDID),
        );
        assert!(!dev.connect());
        assert!(!dev.is_connected());
    }

    #[test]
    fn help_parameter_prevents_connecting() {
        let mut dev = VirtualDevice::new(MockSdk::new(), "help");
        assert!(!dev.connect());
        assert!(!dev.is_connected());
    }

    #[test]
    fn connect_builds_the_session() {
        let path = config_file("connect");
        let mut dev = VirtualDevice::new(MockSdk::new(), &connect_params(&path));
        assert!(dev.connect());
        assert!(dev.is_connected());
        assert_eq!(dev.name(), "Test VDev");
        assert!(dev.description().contains("Ch3 virtual device for:"));
        // A second connect is a no-op.
        assert!(dev.connect());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unknown_serial_fails_connect() {
        let path = config_file("serial");
        let params = format!(
            "cp2configpath={}&devicesn=9999999999&vdid={}",
            path.display(),
            MOCK_VDID
        );
        let mut dev = VirtualDevice::new(MockSdk::new(), &params);
        assert!(!dev.connect());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn operations_require_a_session() {
        let mut dev = VirtualDevice::new(MockSdk::new(), "");
        let mut out = 0;
        assert!(!dev.read_register(0, &mut out, u32::MAX, 0));
        assert!(!dev.write_register(0, 1, u32::MAX, 0));
        assert!(!dev.wait_for_interrupt(InterruptKind::Vertical, 10));
        let mut buf = [0u8; 16];
        assert!(!dev.message(&mut buf));
        let mut data = AcData::default();
        assert!(!dev.auto_circulate(&mut data));
        let mut dma = [0u8; 16];
        assert!(!dev.dma_transfer(0, true, 0, &mut dma, 0, 0, 0, 0, true));
    }

    #[test]
    fn register_access_flows_through_the_translator() {
        let path = config_file("roundtrip");
        let mut dev = VirtualDevice::new(MockSdk::new(), &connect_params(&path));
        assert!(dev.connect());
        dev.session
            .as_mut()
            .unwrap()
            .dev
            .regs
            .insert(regs::REG_CH_OUTPUT_FRAME[2], 42);
        let mut out = 0;
        assert!(dev.read_register(regs::REG_CH_OUTPUT_FRAME[0], &mut out, u32::MAX, 0));
        assert_eq!(out, 42);
        assert!(dev.write_register(regs::REG_CH_OUTPUT_FRAME[0], 7, u32::MAX, 0));
        assert_eq!(
            *dev.session.as_ref().unwrap().dev.ops.last().unwrap(),
            Op::WriteReg {
                reg: regs::REG_CH_OUTPUT_FRAME[2],
                value: 7,
                mask: u32::MAX,
                shift: 0,
            }
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn physical_failures_come_back_as_false() {
        let path = config_file("failure");
        let mut dev = VirtualDevice::new(MockSdk::new(), &connect_params(&path));
        assert!(dev.connect());
        dev.session.as_mut().unwrap().dev.fail_with = Some(libc::EIO);
        let mut out = 0;
        assert!(!dev.read_register(regs::REG_CH_OUTPUT_FRAME[0], &mut out, u32::MAX, 0));
        // The session survives the failure.
        assert!(dev.is_connected());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn disconnect_reports_success_and_keeps_the_session() {
        let path = config_file("disconnect");
        let mut dev = VirtualDevice::new(MockSdk::new(), &connect_params(&path));
        assert!(dev.connect());
        assert!(dev.disconnect());
        assert!(dev.is_connected());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn remote_parameters_are_unsupported() {
        let mut dev = VirtualDevice::new(MockSdk::new(), "");
        let mut out = 0;
        assert!(!dev.get_bool_param(3, &mut out));
        assert!(!dev.get_numeric_param(3, &mut out));
        let mut list = Vec::new();
        assert!(!dev.get_supported(3, &mut list));
    }

    #[test]
    fn create_client_returns_a_connected_client() {
        let path = config_file("create");
        let client = create_client(
            MockSdk::new(),
            &connect_params(&path),
            LIBRARY_INTERFACE_VERSION,
        );
        assert!(client.is_some_and(|c| c.is_connected()));
        assert!(create_client(MockSdk::new(), "help", LIBRARY_INTERFACE_VERSION).is_none());
        // A version mismatch only warns.
        let client = create_client(MockSdk::new(), &connect_params(&path), 1);
        assert!(client.is_some());
        std::fs::remove_file(&path).ok();
    }
}
