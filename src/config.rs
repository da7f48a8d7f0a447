// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Connect-time configuration: the key-value parameter bag handed to the
//! loader entry point, and the JSON document that describes which physical
//! widgets back which virtual ones.

use std::fs::File;
use std::io::BufReader;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

pub const PARAM_CONFIG_PATH: &str = "cp2configpath";
pub const PARAM_DEVICE_SERIAL: &str = "devicesn";
pub const PARAM_VIRTUAL_DEVICE_ID: &str = "vdid";
pub const PARAM_HELP: &str = "help";
pub const PARAM_VERBOSE: &str = "verbose";

/// Usage text logged when the `help` parameter is present.
pub const USAGE: &str = "connect parameters (query-string form, keys case-insensitive):
  cp2configpath=<path>   JSON config file describing virtual devices (required)
  devicesn=<serial>      serial number of the physical device to open (required)
  vdid=<uuid>            id of the virtual device within the config (required)
  help                   log this message and do not connect
  verbose                dump the mapping tables to stderr after connecting";

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Required '{0}' parameter missing")]
    MissingKey(&'static str),
    #[error("Required '{0}' parameter is empty")]
    EmptyKey(&'static str),
    #[error("Required '{0}' parameter given more than once")]
    DuplicateKey(&'static str),
    #[error("'help' requested, not connecting")]
    HelpRequested,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no device entry with serial '{0}'")]
    SerialNotFound(String),
    #[error("no virtual device with id '{0}'")]
    VirtualDeviceNotFound(String),
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Decodes `%xx` escapes; malformed escapes are kept verbatim.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// The parsed parameter bag. Requiredness is checked by [`ConnectParams::required`],
/// not at parse time, so a `help` request can be honored regardless of what
/// else is present.
#[derive(Debug, Default, Clone)]
pub struct ConnectParams {
    pub config_path: Option<String>,
    pub device_serial: Option<String>,
    pub virtual_device_id: Option<String>,
    pub help: bool,
    pub verbose: bool,
}

/// Borrowed view of the three mandatory parameters.
#[derive(Debug, Clone, Copy)]
pub struct RequiredParams<'a> {
    pub config_path: &'a str,
    pub device_serial: &'a str,
    pub virtual_device_id: &'a str,
}

impl ConnectParams {
    /// Parses a `key=value&key2=value2` string. Keys are lowercased and
    /// values percent-decoded; a segment without `=` becomes a key with an
    /// empty value. Unknown keys are warned about and dropped. Only a
    /// repeated required key fails the parse.
    pub fn parse(query: &str) -> Result<ConnectParams, ParamError> {
        let mut params = ConnectParams::default();
        let mut skipped: Vec<String> = Vec::new();
        for segment in query.split('&').filter(|s| !s.is_empty()) {
            let (raw_key, raw_value) = match segment.split_once('=') {
                Some((k, v)) => (k, v),
                None => (segment, ""),
            };
            let key = raw_key.to_ascii_lowercase();
            let value = percent_decode(raw_value);
            match key.as_str() {
                PARAM_CONFIG_PATH => {
                    if params.config_path.is_some() {
                        return Err(ParamError::DuplicateKey(PARAM_CONFIG_PATH));
                    }
                    params.config_path = Some(value);
                }
                PARAM_DEVICE_SERIAL => {
                    if params.device_serial.is_some() {
                        return Err(ParamError::DuplicateKey(PARAM_DEVICE_SERIAL));
                    }
                    params.device_serial = Some(value);
                }
                PARAM_VIRTUAL_DEVICE_ID => {
                    if params.virtual_device_id.is_some() {
                        return Err(ParamError::DuplicateKey(PARAM_VIRTUAL_DEVICE_ID));
                    }
                    params.virtual_device_id = Some(value);
                }
                PARAM_HELP => params.help = true,
                PARAM_VERBOSE => params.verbose = true,
                _ => skipped.push(key),
            }
        }
        if !skipped.is_empty() {
            warn!("Skipped unrecognized parameter(s): {}", skipped.join(", "));
        }
        Ok(params)
    }

    /// Validates the bag for a connection attempt. `help` wins over any
    /// missing key so a bare `help` still produces usage output.
    pub fn required(&self) -> Result<RequiredParams, ParamError> {
        if self.help {
            return Err(ParamError::HelpRequested);
        }
        let config_path = check(&self.config_path, PARAM_CONFIG_PATH)?;
        let device_serial = check(&self.device_serial, PARAM_DEVICE_SERIAL)?;
        let virtual_device_id = check(&self.virtual_device_id, PARAM_VIRTUAL_DEVICE_ID)?;
        Ok(RequiredParams {
            config_path,
            device_serial,
            virtual_device_id,
        })
    }
}

fn check<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ParamError> {
    match value.as_deref() {
        None => Err(ParamError::MissingKey(key)),
        Some("") => Err(ParamError::EmptyKey(key)),
        Some(v) => Ok(v),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRoot {
    pub v2: ConfigV2,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigV2 {
    #[serde(default)]
    pub device_config_list: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub serial: String,
    #[serde(default)]
    pub virtual_devices: Vec<VirtualDeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDeviceConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mapped_widgets: Vec<WidgetMapping>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetMapping {
    pub device_widget_id: u32,
    pub virtual_widget_id: u32,
}

/// Loads the config file and selects the virtual-device entry for
/// `(serial, vdid)`.
pub fn load_virtual_device(
    path: &str,
    serial: &str,
    vdid: &str,
) -> Result<VirtualDeviceConfig, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    let root: ConfigRoot = serde_json::from_reader(BufReader::new(file))?;
    select_virtual_device(&root, serial, vdid).cloned()
}

fn select_virtual_device<'a>(
    root: &'a ConfigRoot,
    serial: &str,
    vdid: &str,
) -> Result<&'a VirtualDeviceConfig, ConfigError> {
    let device = root
        .v2
        .device_config_list
        .iter()
        .find(|d| d.serial == serial)
        .ok_or_else(|| ConfigError::SerialNotFound(serial.to_owned()))?;
    device
        .virtual_devices
        .iter()
        .find(|vd| vd.id == vdid)
        .ok_or_else(|| ConfigError::VirtualDeviceNotFound(vdid.to_owned()))
}
