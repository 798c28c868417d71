//! Menu entries for picking an output device by hand.
//!
//! The host draws the menu; this only decides what goes in it and what a click means.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_plain::derive_display_from_serialize;
use tracing::*;

use crate::{endpoints::DeviceList, manager::AudioDeviceManager, switcher::SwitchResult};

pub const DEVICE_PREFIX: &str = "device";

// Device ids from the OS never contain it
const MENU_ID_DELIMITER: char = '|';

/// Action behind a menu entry, serialized into the entry's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Make the endpoint with this id the default for every role
    SwitchTo(String),
}

impl<'de> Deserialize<'de> for MenuAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buf = String::deserialize(deserializer)?;

        // Example input:
        // device|{0.0.0.00000000}.{aa-bb-cc-123-456}

        match buf.split_once(MENU_ID_DELIMITER) {
            Some((DEVICE_PREFIX, guid)) if !guid.is_empty() => {
                Ok(MenuAction::SwitchTo(guid.to_owned()))
            }
            Some((DEVICE_PREFIX, _)) => Err(D::Error::custom("Menu id is missing a device")),
            _ => Err(D::Error::custom(
                "Tried to deserialize a non-device menu id",
            )),
        }
    }
}

impl Serialize for MenuAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            MenuAction::SwitchTo(guid) => serializer.serialize_str(&format!(
                "{DEVICE_PREFIX}{MENU_ID_DELIMITER}{guid}"
            )),
        }
    }
}

derive_display_from_serialize!(MenuAction);

impl MenuAction {
    pub fn parse(id: &str) -> Option<Self> {
        serde_plain::from_str(id).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMenuItem {
    /// Stable id to hand back to [`handle_menu_event`]
    pub id: String,
    pub label: String,
    /// Set for the endpoint currently marked as default
    pub checked: bool,
}

/// One entry per tracked endpoint, in list order. Empty if there are no devices.
pub fn device_menu_items(devices: &DeviceList) -> Vec<DeviceMenuItem> {
    devices
        .iter()
        .map(|device| DeviceMenuItem {
            id: MenuAction::SwitchTo(device.guid.clone()).to_string(),
            label: device.to_string(),
            checked: device.is_default,
        })
        .collect()
}

/// Runs the action behind a clicked entry.
///
/// Returns `None` if the id isn't one of ours, otherwise how the switch went.
pub fn handle_menu_event(id: &str, manager: &AudioDeviceManager) -> Option<SwitchResult> {
    match MenuAction::parse(id)? {
        MenuAction::SwitchTo(guid) => {
            debug!("Menu switch to {guid}");
            let result = manager.try_switch_to(&guid);
            if let Err(e) = &result {
                error!("Menu switch failed: {e}");
            }
            Some(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        endpoints::Endpoint,
        platform::{
            mock::{MockEndpoints, MockPolicy},
            DeviceRole,
        },
    };

    #[test]
    fn menu_id_format() {
        let action = MenuAction::SwitchTo("{0.0.0.00000000}.{aa-bb}".into());
        let id = action.to_string();
        assert_eq!(id, "device|{0.0.0.00000000}.{aa-bb}");
        assert_eq!(MenuAction::parse(&id), Some(action));
    }

    #[test]
    fn foreign_ids_are_ignored() {
        assert_eq!(MenuAction::parse("quit"), None);
        assert_eq!(MenuAction::parse("device|"), None);
        assert_eq!(MenuAction::parse("profile|abc"), None);
    }

    #[test]
    fn one_item_per_device() {
        let devices = DeviceList {
            version: 1,
            endpoints: vec![
                Endpoint::new("Speakers".into(), "A".into(), true),
                Endpoint::new("Headset".into(), "B".into(), false),
            ],
        };
        let items = device_menu_items(&devices);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "Speakers");
        assert!(items[0].checked);
        assert_eq!(items[1].id, "device|B");
        assert!(!items[1].checked);

        assert!(device_menu_items(&DeviceList::default()).is_empty());
    }

    #[test]
    fn clicking_an_item_switches() {
        let endpoints = Arc::new(MockEndpoints::with_render_devices(&[
            ("A", "Speakers"),
            ("B", "Headset"),
        ]));
        endpoints.set_default_silently(Some("A"));
        let policy = Arc::new(MockPolicy::linked(endpoints.clone()));
        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy);

        let items = device_menu_items(&manager.devices());
        let headset = items.iter().find(|i| i.label == "Headset").unwrap();

        assert!(matches!(handle_menu_event(&headset.id, &manager), Some(Ok(()))));
        assert_eq!(endpoints.current_default().as_deref(), Some("B"));

        let err = handle_menu_event("device|gone", &manager).unwrap().unwrap_err();
        assert_eq!(err.guid, "gone");
        assert!(!err.is_partial());
        assert!(handle_menu_event("quit", &manager).is_none());
    }

    #[test]
    fn partial_menu_switch_is_reported() {
        let endpoints = Arc::new(MockEndpoints::with_render_devices(&[
            ("A", "Speakers"),
            ("B", "Headset"),
        ]));
        endpoints.set_default_silently(Some("A"));
        let policy = Arc::new(MockPolicy::linked(endpoints.clone()));
        policy.fail_on(Some(DeviceRole::Communications));
        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy);

        let err = handle_menu_event("device|B", &manager).unwrap().unwrap_err();
        assert!(err.is_partial());
        assert_eq!(err.applied, [DeviceRole::Multimedia, DeviceRole::Console]);
        assert_eq!(err.failed, DeviceRole::Communications);
    }
}
