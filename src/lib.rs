//! Switches the default Windows audio output device when a game launcher goes in and
//! out of fullscreen mode, and lets users pick an output device from a menu.
//!
//! The launcher-facing pieces are [`AudioDeviceManager`], [`FullscreenSession`], the
//! [`menu`] helpers and [`Settings`].

pub mod endpoints;
pub mod errors;
pub mod fullscreen;
pub mod logging;
pub mod manager;
pub mod menu;
pub mod platform;
pub mod settings;
pub mod switcher;

pub use endpoints::{DeviceList, DeviceSnapshot, Endpoint, EndpointRegistry};
pub use errors::{AppResult, SwitcherError};
pub use fullscreen::{EnterOutcome, ExitOutcome, FullscreenSession};
pub use manager::AudioDeviceManager;
pub use settings::{FullscreenSettings, Settings};
pub use switcher::{DefaultSwitcher, SwitchError, SwitchResult};

#[cfg(feature = "test-mocks")]
pub use platform::mock::{MockEndpoints, MockPolicy};
