//! Switching in and out of the launcher's fullscreen mode.

use tracing::*;

use crate::{manager::AudioDeviceManager, settings::FullscreenSettings};

/// What [`FullscreenSession::enter`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Switching is disabled, or no target device is configured
    Disabled,
    /// The target was already the Multimedia default. Every role was still set to it,
    /// and nothing will be restored later.
    AlreadyActive,
    Switched,
    /// The switch failed. `restore_pending` tells whether exit will still try to restore.
    Failed { restore_pending: bool },
}

/// What [`FullscreenSession::exit`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    NothingToRestore,
    Restored,
    Failed,
}

/// Remembers the default device from before fullscreen so it can be put back.
#[derive(Debug, Default)]
pub struct FullscreenSession {
    original_device: Option<String>,
}

impl FullscreenSession {
    pub fn new() -> Self {
        Self::default()
    }
    /// The device exit will restore, if any.
    pub fn original_device(&self) -> Option<&str> {
        self.original_device.as_deref()
    }
    pub fn enter(
        &mut self,
        manager: &AudioDeviceManager,
        settings: &FullscreenSettings,
    ) -> EnterOutcome {
        if !settings.enable_switch {
            return EnterOutcome::Disabled;
        }
        let target = settings.device_id.as_str();
        if target.is_empty() {
            warn!("Fullscreen switching is enabled, but no device is chosen");
            return EnterOutcome::Disabled;
        }
        info!("Entering fullscreen, switching audio device");

        self.original_device = None;
        let mut already_active = false;
        match manager.default_device() {
            // Console and Communications may still point elsewhere, so switch anyway
            Some(current) if current.guid == target => {
                info!("{current} is already the default, not storing it");
                already_active = true;
            }
            Some(current) => {
                info!("Stored original audio device: {current} ({})", current.guid);
                self.original_device = Some(current.guid);
            }
            None => warn!("Couldn't get the current default, it won't be restored"),
        }

        match manager.try_set_default(target) {
            Ok(()) if already_active => EnterOutcome::AlreadyActive,
            Ok(()) => {
                info!("Switched audio device to {target}");
                EnterOutcome::Switched
            }
            Err(e) => {
                error!("Failed to switch audio device for fullscreen: {e}");
                // Nothing moved, so there's nothing to undo on exit
                if !e.is_partial() {
                    self.original_device = None;
                }
                EnterOutcome::Failed {
                    restore_pending: self.original_device.is_some(),
                }
            }
        }
    }
    pub fn exit(&mut self, manager: &AudioDeviceManager) -> ExitOutcome {
        let Some(original) = self.original_device.take() else {
            info!("No original audio device stored, not switching back");
            return ExitOutcome::NothingToRestore;
        };
        info!("Exiting fullscreen, switching audio device back");
        if manager.set_default(&original) {
            info!("Switched audio device back to {original}");
            ExitOutcome::Restored
        } else {
            error!("Failed to switch audio device back to {original}");
            ExitOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::platform::{
        mock::{MockEndpoints, MockPolicy},
        DeviceRole,
    };

    struct Fixture {
        endpoints: Arc<MockEndpoints>,
        policy: Arc<MockPolicy>,
        manager: AudioDeviceManager,
    }

    fn fixture() -> Fixture {
        let endpoints = Arc::new(MockEndpoints::with_render_devices(&[
            ("A", "Speakers"),
            ("B", "Headset"),
        ]));
        endpoints.set_default_silently(Some("A"));
        let policy = Arc::new(MockPolicy::linked(endpoints.clone()));
        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy.clone());
        Fixture {
            endpoints,
            policy,
            manager,
        }
    }

    fn target(id: &str) -> FullscreenSettings {
        FullscreenSettings {
            enable_switch: true,
            device_id: id.to_owned(),
        }
    }

    #[test]
    fn enter_and_exit_restore_original() {
        let f = fixture();
        let mut session = FullscreenSession::new();

        assert_eq!(session.enter(&f.manager, &target("B")), EnterOutcome::Switched);
        assert_eq!(session.original_device(), Some("A"));
        assert_eq!(f.endpoints.current_default().as_deref(), Some("B"));

        assert_eq!(session.exit(&f.manager), ExitOutcome::Restored);
        assert_eq!(f.endpoints.current_default().as_deref(), Some("A"));
        assert_eq!(session.original_device(), None);

        f.policy.clear_calls();
        assert_eq!(session.exit(&f.manager), ExitOutcome::NothingToRestore);
        assert!(f.policy.calls().is_empty());
    }

    #[test]
    fn already_on_target_still_sets_every_role() {
        let f = fixture();
        let mut session = FullscreenSession::new();

        assert_eq!(
            session.enter(&f.manager, &target("A")),
            EnterOutcome::AlreadyActive
        );
        assert_eq!(session.original_device(), None);
        // Console and Communications are moved too, they may have pointed elsewhere
        assert_eq!(
            f.policy.calls(),
            [
                ("A".to_owned(), DeviceRole::Multimedia),
                ("A".to_owned(), DeviceRole::Console),
                ("A".to_owned(), DeviceRole::Communications),
            ]
        );

        f.policy.clear_calls();
        assert_eq!(session.exit(&f.manager), ExitOutcome::NothingToRestore);
        assert!(f.policy.calls().is_empty());
    }

    #[test]
    fn already_on_target_failed_switch_has_nothing_pending() {
        let f = fixture();
        let mut session = FullscreenSession::new();
        f.policy.fail_on(Some(DeviceRole::Console));

        assert_eq!(
            session.enter(&f.manager, &target("A")),
            EnterOutcome::Failed {
                restore_pending: false
            }
        );
        assert_eq!(session.exit(&f.manager), ExitOutcome::NothingToRestore);
    }

    #[test]
    fn disabled_or_unset_does_nothing() {
        let f = fixture();
        let mut session = FullscreenSession::new();

        let mut settings = target("B");
        settings.enable_switch = false;
        assert_eq!(session.enter(&f.manager, &settings), EnterOutcome::Disabled);
        assert_eq!(session.enter(&f.manager, &target("")), EnterOutcome::Disabled);
        assert!(f.policy.calls().is_empty());
    }

    #[test]
    fn total_failure_forgets_original() {
        let f = fixture();
        let mut session = FullscreenSession::new();
        f.policy.fail_on(Some(DeviceRole::Multimedia));

        assert_eq!(
            session.enter(&f.manager, &target("B")),
            EnterOutcome::Failed {
                restore_pending: false
            }
        );
        assert_eq!(session.exit(&f.manager), ExitOutcome::NothingToRestore);
    }

    #[test]
    fn partial_failure_keeps_original_for_exit() {
        let f = fixture();
        let mut session = FullscreenSession::new();
        f.policy.fail_on(Some(DeviceRole::Communications));

        assert_eq!(
            session.enter(&f.manager, &target("B")),
            EnterOutcome::Failed {
                restore_pending: true
            }
        );

        f.policy.fail_on(None);
        assert_eq!(session.exit(&f.manager), ExitOutcome::Restored);
        assert_eq!(f.endpoints.current_default().as_deref(), Some("A"));
    }

    #[test]
    fn failed_restore_still_clears() {
        let f = fixture();
        let mut session = FullscreenSession::new();
        session.enter(&f.manager, &target("B"));

        f.policy.fail_on(Some(DeviceRole::Multimedia));
        assert_eq!(session.exit(&f.manager), ExitOutcome::Failed);
        assert_eq!(session.exit(&f.manager), ExitOutcome::NothingToRestore);
    }

    #[test]
    fn unknown_current_default_still_switches() {
        let f = fixture();
        let mut session = FullscreenSession::new();
        f.endpoints.set_default_query_failure(true);

        assert_eq!(session.enter(&f.manager, &target("B")), EnterOutcome::Switched);
        assert_eq!(session.original_device(), None);
    }
}
