//! Microphone discovery and selection

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use crate::{Error, Result};

/// How the operator wants the microphone chosen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MicPreference {
    /// System default input device
    #[default]
    Default,
    /// Fixed position in the enumeration order
    Index(usize),
    /// First device whose name contains this text (case-insensitive)
    Name(String),
}

impl MicPreference {
    /// Build a preference from optional index and name settings
    ///
    /// The index wins when both are present; blank names are ignored.
    #[must_use]
    pub fn from_parts(index: Option<usize>, name: Option<String>) -> Self {
        match (index, name) {
            (Some(i), _) => Self::Index(i),
            (None, Some(n)) if !n.trim().is_empty() => Self::Name(n.trim().to_string()),
            _ => Self::Default,
        }
    }
}

/// Outcome of device selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Use the device at this enumeration index
    Index(usize),
    /// Use the host's default input device
    Default,
}

/// Pick a device from a list of input device names
///
/// # Errors
///
/// Returns `Error::NoInputDevices` if `names` is empty
pub fn select_device(names: &[String], preference: &MicPreference) -> Result<DeviceSelection> {
    if names.is_empty() {
        return Err(Error::NoInputDevices);
    }

    match preference {
        MicPreference::Default => Ok(DeviceSelection::Default),
        MicPreference::Index(index) => {
            if *index < names.len() {
                Ok(DeviceSelection::Index(*index))
            } else {
                tracing::warn!(
                    index,
                    available = names.len(),
                    "microphone index out of range, using default"
                );
                Ok(DeviceSelection::Default)
            }
        }
        MicPreference::Name(hint) => {
            let hint = hint.to_lowercase();
            let found = names
                .iter()
                .position(|name| name.to_lowercase().contains(&hint));

            Ok(found.map_or_else(
                || {
                    tracing::warn!(hint = %hint, "no microphone matched, using default");
                    DeviceSelection::Default
                },
                DeviceSelection::Index,
            ))
        }
    }
}

/// Names of all input devices, in enumeration order
///
/// # Errors
///
/// Returns `Error::DeviceEnumeration` if the audio host cannot list devices
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| Error::DeviceEnumeration(e.to_string()))?;

    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "(unnamed device)".to_string()))
        .collect())
}

/// Print the device list for the operator
pub fn print_devices(names: &[String]) {
    println!("Available microphones:");
    for (index, name) in names.iter().enumerate() {
        println!("  [{index}] {name}");
    }
}

/// Resolve a preference to an opened cpal device
///
/// Lists the devices on the console whenever the default is used, so the
/// operator can pick an index or name next time.
///
/// # Errors
///
/// Returns error if enumeration fails, no devices exist, or the selected
/// device disappeared between enumeration and opening
pub fn resolve_device(preference: &MicPreference) -> Result<(Device, String)> {
    let names = list_input_devices()?;
    let selection = select_device(&names, preference)?;
    let host = cpal::default_host();

    let device = match selection {
        DeviceSelection::Index(index) => host
            .input_devices()
            .map_err(|e| Error::DeviceEnumeration(e.to_string()))?
            .nth(index)
            .ok_or_else(|| Error::MicrophoneOpen(format!("device {index} disappeared")))?,
        DeviceSelection::Default => {
            print_devices(&names);
            host.default_input_device()
                .ok_or_else(|| Error::MicrophoneOpen("no default input device".to_string()))?
        }
    };

    let name = device.name().unwrap_or_else(|_| "(unnamed device)".to_string());
    tracing::info!(device = %name, ?selection, "microphone selected");
    Ok((device, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_select_by_substring() {
        let devices = names(&["default", "HDA Intel PCH", "USB Audio (hw:3,0)", "USB Camera"]);
        let pref = MicPreference::Name("usb".to_string());

        for _ in 0..3 {
            assert_eq!(
                select_device(&devices, &pref).unwrap(),
                DeviceSelection::Index(2)
            );
        }
    }

    #[test]
    fn test_select_no_match_uses_default() {
        let devices = names(&["default", "HDA Intel PCH"]);
        let pref = MicPreference::Name("blue yeti".to_string());
        assert_eq!(
            select_device(&devices, &pref).unwrap(),
            DeviceSelection::Default
        );
    }

    #[test]
    fn test_select_by_index() {
        let devices = names(&["a", "b", "c"]);
        assert_eq!(
            select_device(&devices, &MicPreference::Index(1)).unwrap(),
            DeviceSelection::Index(1)
        );
        assert_eq!(
            select_device(&devices, &MicPreference::Index(7)).unwrap(),
            DeviceSelection::Default
        );
    }

    #[test]
    fn test_select_empty_list_fails() {
        assert!(matches!(
            select_device(&[], &MicPreference::Default),
            Err(Error::NoInputDevices)
        ));
        assert!(matches!(
            select_device(&[], &MicPreference::Name("usb".to_string())),
            Err(Error::NoInputDevices)
        ));
    }

    #[test]
    fn test_preference_from_parts() {
        assert_eq!(MicPreference::from_parts(None, None), MicPreference::Default);
        assert_eq!(
            MicPreference::from_parts(None, Some("  ".to_string())),
            MicPreference::Default
        );
        assert_eq!(
            MicPreference::from_parts(None, Some(" USB ".to_string())),
            MicPreference::Name("USB".to_string())
        );
        assert_eq!(
            MicPreference::from_parts(Some(2), Some("usb".to_string())),
            MicPreference::Index(2)
        );
    }
}
