// SPDX-License-Identifier: GPL-3.0-only

//! Front/back camera slot resolution
//!
//! Slots are resolved once per session from the enumerated devices. A device
//! keeps the capability it was resolved with for the rest of the session,
//! whichever facing is active.

use super::types::{CameraCapability, Facing, StreamConstraints};
use crate::config::CaptureSettings;
use tracing::debug;

/// The two designated camera slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSlots {
    pub front: Option<CameraCapability>,
    pub back: Option<CameraCapability>,
}

impl CameraSlots {
    /// Pick front and back devices from an enumeration
    ///
    /// The first device reporting each facing wins. Devices without a
    /// reported facing fill whichever slot is still empty, back first. A
    /// missing slot then borrows the other slot's device.
    pub fn resolve(devices: &[CameraCapability]) -> Self {
        let mut front = devices
            .iter()
            .find(|d| d.facing == Some(Facing::User))
            .cloned();
        let mut back = devices
            .iter()
            .find(|d| d.facing == Some(Facing::Environment))
            .cloned();

        for device in devices.iter().filter(|d| d.facing.is_none()) {
            if back.is_none() {
                back = Some(device.clone());
            } else if front.is_none() {
                front = Some(device.clone());
            }
        }

        if front.is_none() {
            front = back.clone();
        }
        if back.is_none() {
            back = front.clone();
        }

        debug!(
            front = front.as_ref().map(|d| d.device_id.as_str()),
            back = back.as_ref().map(|d| d.device_id.as_str()),
            "Resolved camera slots"
        );

        Self { front, back }
    }

    /// Device assigned to a facing, if any
    pub fn for_facing(&self, facing: Facing) -> Option<&CameraCapability> {
        match facing {
            Facing::User => self.front.as_ref(),
            Facing::Environment => self.back.as_ref(),
        }
    }

    /// Build acquisition constraints for a facing
    ///
    /// Without a device the request carries only the facing and the
    /// configured resolution, leaving the choice to the platform.
    pub fn constraints_for(&self, facing: Facing, settings: &CaptureSettings) -> StreamConstraints {
        StreamConstraints {
            facing,
            device_id: self.for_facing(facing).map(|d| d.device_id.clone()),
            width: settings.width,
            height: settings.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolutionRange;

    fn device(id: &str, facing: Option<Facing>) -> CameraCapability {
        let range = ResolutionRange {
            min: 320,
            ideal: 640,
            max: 1280,
        };
        CameraCapability {
            device_id: id.to_string(),
            label: id.to_string(),
            facing,
            has_torch: false,
            width: range,
            height: range,
        }
    }

    #[test]
    fn test_resolve_by_facing() {
        let slots = CameraSlots::resolve(&[
            device("rear", Some(Facing::Environment)),
            device("selfie", Some(Facing::User)),
        ]);
        assert_eq!(slots.front.unwrap().device_id, "selfie");
        assert_eq!(slots.back.unwrap().device_id, "rear");
    }

    #[test]
    fn test_single_device_fills_both_slots() {
        let slots = CameraSlots::resolve(&[device("usb", None)]);
        assert_eq!(slots.front.as_ref().unwrap().device_id, "usb");
        assert_eq!(slots.back.as_ref().unwrap().device_id, "usb");
    }

    #[test]
    fn test_no_devices_gives_facing_only_constraints() {
        let slots = CameraSlots::resolve(&[]);
        let constraints = slots.constraints_for(Facing::User, &CaptureSettings::default());
        assert_eq!(constraints.device_id, None);
        assert_eq!(constraints.facing, Facing::User);
        assert_eq!(constraints.ideal_width(), 1980);
    }
}
