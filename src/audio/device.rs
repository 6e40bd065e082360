//! Capture-device discovery and selection.
//!
//! ALSA PCM hints are enumerated fresh on every selection; nothing is
//! cached, so a reinitialization after an unplug sees the current device
//! set. Selection walks an ordered list of name substrings from the
//! configuration (heterogeneous deployments prefer different hardware, e.g.
//! a far-field mic array ahead of a webcam mic) and falls back to the ALSA
//! "default" PCM when nothing matches.

use alsa::Direction;
use alsa::device_name::HintIter;
use alsa::pcm::{HwParams, PCM};
use alsa::ValueOr;

use crate::error::{AudioError, AudioResult};

pub(crate) const DEFAULT_PCM: &str = "default";

/// Read-only snapshot of one PCM device, rebuilt on each enumeration.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// Position in this enumeration pass.
    pub index: usize,
    /// ALSA PCM name, usable with `PCM::new`.
    pub name: String,
    /// Human-readable description from the hint, first line only.
    pub description: String,
    /// Channel ceiling when opened for capture; 0 when not input-capable.
    pub max_input_channels: u32,
    /// Channel ceiling when opened for playback; 0 when not output-capable.
    pub max_output_channels: u32,
    /// The rate the device's parameter space lands on nearest the
    /// pipeline's target rate.
    pub default_sample_rate: u32,
}

impl DeviceDescriptor {
    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }
}

/// Probe a PCM name in one direction without blocking. Returns the channel
/// ceiling and nearest-supported rate, or `None` when the device cannot be
/// opened that way at all.
fn probe(name: &str, direction: Direction, preferred_rate: u32) -> Option<(u32, u32)> {
    let pcm = PCM::new(name, direction, true).ok()?;
    let hwp = HwParams::any(&pcm).ok()?;
    let channels = hwp.get_channels_max().ok()?;
    let rate = hwp.set_rate_near(preferred_rate, ValueOr::Nearest).ok()?;
    Some((channels, rate))
}

/// Enumerate every usable PCM device on the host.
pub fn enumerate_devices(preferred_rate: u32) -> AudioResult<Vec<DeviceDescriptor>> {
    let hints = HintIter::new_str(None, "pcm").map_err(|e| {
        log::error!("ALSA PCM hint enumeration failed: {e}");
        AudioError::DeviceEnumeration
    })?;

    let mut devices = Vec::new();
    for hint in hints {
        let Some(name) = hint.name else { continue };
        if name == "null" {
            continue;
        }
        let description = hint
            .desc
            .as_deref()
            .and_then(|d| d.lines().next())
            .unwrap_or_default()
            .to_string();

        let may_capture = !matches!(hint.direction, Some(Direction::Playback));
        let may_play = !matches!(hint.direction, Some(Direction::Capture));

        let input = if may_capture { probe(&name, Direction::Capture, preferred_rate) } else { None };
        let output = if may_play { probe(&name, Direction::Playback, preferred_rate) } else { None };
        if input.is_none() && output.is_none() {
            continue;
        }

        let default_sample_rate = input.map(|(_, r)| r).or(output.map(|(_, r)| r)).unwrap_or(0);
        devices.push(DeviceDescriptor {
            index: devices.len(),
            name,
            description,
            max_input_channels: input.map(|(c, _)| c).unwrap_or(0),
            max_output_channels: output.map(|(c, _)| c).unwrap_or(0),
            default_sample_rate,
        });
    }

    log::debug!("enumerated {} usable PCM devices", devices.len());
    Ok(devices)
}

/// Pure priority match over an enumeration snapshot: the first priority
/// entry that any input-capable device matches wins, regardless of
/// enumeration order.
fn match_priority<'a>(
    devices: &'a [DeviceDescriptor],
    priority: &[String],
) -> Option<&'a DeviceDescriptor> {
    for wanted in priority {
        for device in devices {
            if device.is_input()
                && (device.name.contains(wanted.as_str())
                    || device.description.contains(wanted.as_str()))
            {
                return Some(device);
            }
        }
    }
    None
}

/// Choose the capture device: priority match first, then the ALSA default,
/// then any input-capable device. No input-capable device at all is fatal.
pub(crate) fn select_input_device(
    priority: &[String],
    preferred_rate: u32,
) -> AudioResult<DeviceDescriptor> {
    let devices = enumerate_devices(preferred_rate)?;

    let chosen = match_priority(&devices, priority)
        .or_else(|| devices.iter().find(|d| d.is_input() && d.name == DEFAULT_PCM))
        .or_else(|| devices.iter().find(|d| d.is_input()));

    match chosen {
        Some(device) => {
            log::info!(
                "selected capture device \"{}\" ({}), {} Hz, {} input channels",
                device.name,
                device.description,
                device.default_sample_rate,
                device.max_input_channels,
            );
            Ok(device.clone())
        }
        None => {
            log::error!("no input-capable PCM device found");
            Err(AudioError::DeviceEnumeration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(index: usize, name: &str, desc: &str, inputs: u32) -> DeviceDescriptor {
        DeviceDescriptor {
            index,
            name: name.to_string(),
            description: desc.to_string(),
            max_input_channels: inputs,
            max_output_channels: 2,
            default_sample_rate: 48000,
        }
    }

    #[test]
    fn priority_order_beats_enumeration_order() {
        let devices = vec![
            device(0, "hw:CARD=Generic", "HD-Audio Generic", 2),
            device(1, "plughw:CARD=Webcam", "USB Webcam Microphone", 1),
            device(2, "plughw:CARD=Array", "XFM-DP-V0.0.18 mic array", 4),
        ];
        let priority = vec!["XFM-DP-V0.0.18".to_string(), "Webcam".to_string()];
        let chosen = match_priority(&devices, &priority).unwrap();
        assert_eq!(chosen.index, 2);
    }

    #[test]
    fn output_only_devices_never_match() {
        let devices = vec![
            device(0, "plughw:CARD=HDMI", "XFM-DP-V0.0.18 passthrough", 0),
            device(1, "plughw:CARD=Array", "XFM-DP-V0.0.18 mic array", 4),
        ];
        let priority = vec!["XFM-DP-V0.0.18".to_string()];
        let chosen = match_priority(&devices, &priority).unwrap();
        assert_eq!(chosen.index, 1);
    }

    #[test]
    fn matches_against_name_as_well_as_description() {
        let devices = vec![device(0, "plughw:CARD=XFM", "mic array", 4)];
        let priority = vec!["XFM".to_string()];
        assert!(match_priority(&devices, &priority).is_some());
    }

    #[test]
    fn no_match_yields_none_for_fallback() {
        let devices = vec![device(0, "hw:CARD=Generic", "HD-Audio Generic", 2)];
        let priority = vec!["XFM-DP-V0.0.18".to_string()];
        assert!(match_priority(&devices, &priority).is_none());
        assert!(match_priority(&devices, &[]).is_none());
    }

    // Needs real hardware; tolerate hosts without any sound card.
    #[test]
    fn enumeration_descriptors_are_coherent() {
        match enumerate_devices(16000) {
            Ok(devices) => {
                for d in &devices {
                    assert!(d.max_input_channels > 0 || d.max_output_channels > 0);
                    if d.is_input() {
                        assert!(d.default_sample_rate > 0);
                    }
                }
            }
            Err(e) => eprintln!("skipping: device enumeration unavailable ({e})"),
        }
    }
}
