use std::sync::Arc;

use tracing::*;

use crate::{
    errors::SwitcherError,
    platform::{DefaultEndpointPolicy, DeviceRole},
};

/// A three-role switch that stopped at `failed`.
///
/// Roles in `applied` were already moved and are not rolled back.
#[derive(Debug, thiserror::Error)]
#[error("Failed to set {guid} as {failed} default (already applied: {applied:?}): {source}")]
pub struct SwitchError {
    pub guid: String,
    pub applied: Vec<DeviceRole>,
    pub failed: DeviceRole,
    #[source]
    pub source: SwitcherError,
}

impl SwitchError {
    /// `true` if at least one role was moved before the failure, leaving the OS mixed.
    pub fn is_partial(&self) -> bool {
        !self.applied.is_empty()
    }
}

pub type SwitchResult = Result<(), SwitchError>;

/// Makes an endpoint the default render device for every role.
pub struct DefaultSwitcher {
    policy: Arc<dyn DefaultEndpointPolicy>,
}

impl DefaultSwitcher {
    pub fn new(policy: Arc<dyn DefaultEndpointPolicy>) -> Self {
        Self { policy }
    }
    /// Sets Multimedia, Console then Communications, stopping at the first failing role.
    pub fn try_set_default(&self, guid: &str) -> SwitchResult {
        let mut applied = Vec::with_capacity(DeviceRole::ALL.len());
        for role in DeviceRole::ALL {
            if let Err(source) = self.policy.set_default_endpoint(guid, role) {
                return Err(SwitchError {
                    guid: guid.to_owned(),
                    applied,
                    failed: role,
                    source,
                });
            }
            applied.push(role);
        }
        info!("Set {guid} -> {applied:?}");
        Ok(())
    }
    /// Like [`Self::try_set_default`], logging the failure instead of returning it.
    pub fn set_default(&self, guid: &str) -> bool {
        match self.try_set_default(guid) {
            Ok(()) => true,
            Err(e) if e.is_partial() => {
                error!("Default device only partially switched, roles are now mixed! {e}");
                false
            }
            Err(e) => {
                error!("Error setting default audio device: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{mock::MockPolicy, DeviceRole::*};

    fn switcher() -> (Arc<MockPolicy>, DefaultSwitcher) {
        let policy = Arc::new(MockPolicy::new());
        (policy.clone(), DefaultSwitcher::new(policy))
    }

    #[test]
    fn sets_all_roles_in_order() {
        let (policy, switcher) = switcher();
        assert!(switcher.set_default("B"));
        assert_eq!(
            policy.calls(),
            [
                ("B".to_owned(), Multimedia),
                ("B".to_owned(), Console),
                ("B".to_owned(), Communications),
            ]
        );
    }

    #[test]
    fn stops_at_first_failure() {
        let (policy, switcher) = switcher();
        policy.fail_on(Some(Console));

        let err = switcher.try_set_default("B").unwrap_err();
        assert_eq!(err.applied, [Multimedia]);
        assert_eq!(err.failed, Console);
        assert!(err.is_partial());
        // Communications is never attempted
        assert_eq!(policy.calls().len(), 2);
        assert!(!switcher.set_default("B"));
    }

    #[test]
    fn total_failure_is_not_partial() {
        let (policy, switcher) = switcher();
        policy.fail_on(Some(Multimedia));

        let err = switcher.try_set_default("B").unwrap_err();
        assert!(!err.is_partial());
        assert_eq!(err.failed, Multimedia);
        assert_eq!(policy.calls(), [("B".to_owned(), Multimedia)]);
    }
}
