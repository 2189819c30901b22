//! HID profile registration with the host Bluetooth stack.
//!
//! Before a host can discover the daemon as a keyboard and mouse, an SDP
//! service record describing the HID device (and its report descriptor)
//! must be published.  On Linux this is done by registering a profile with
//! BlueZ's `ProfileManager1`; the registration lasts as long as the returned
//! [`ProfileGuard`] is alive.

use std::any::Any;
use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::infrastructure::storage::config::ProfileConfig;

#[cfg(target_os = "linux")]
pub mod bluez;

/// Bluetooth HID service class UUID.
pub const HID_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001124_0000_1000_8000_00805f9b34fb);

/// SDP record shipped with the daemon: keyboard on report ID 1, mouse on 2.
pub const DEFAULT_SERVICE_RECORD: &str = include_str!("../../../sdp_record.xml");

/// Everything needed to publish the HID service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidProfile {
    pub name: String,
    pub uuid: Uuid,
    pub service_record: String,
    pub require_authentication: bool,
    pub require_authorization: bool,
}

impl HidProfile {
    /// Builds the profile from configuration, reading the service record
    /// file if one is configured.
    pub fn from_config(config: &ProfileConfig) -> Result<Self, ProfileError> {
        let service_record = match &config.service_record {
            Some(path) => std::fs::read_to_string(path).map_err(|source| {
                ProfileError::ServiceRecord {
                    path: path.clone(),
                    source,
                }
            })?,
            None => DEFAULT_SERVICE_RECORD.to_string(),
        };
        Ok(Self {
            name: config.name.clone(),
            uuid: HID_SERVICE_UUID,
            service_record,
            require_authentication: config.require_authentication,
            require_authorization: config.require_authorization,
        })
    }
}

impl Default for HidProfile {
    fn default() -> Self {
        Self {
            name: crate::infrastructure::storage::config::DEFAULT_PROFILE_NAME.to_string(),
            uuid: HID_SERVICE_UUID,
            service_record: DEFAULT_SERVICE_RECORD.to_string(),
            require_authentication: false,
            require_authorization: false,
        }
    }
}

/// Error type for profile registration.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read service record {path}: {source}")]
    ServiceRecord {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile registration failed: {0}")]
    Registration(String),
    #[error("profile registration is not supported on this platform")]
    Unsupported,
}

/// Keeps a profile registered; unregisters when dropped.
pub struct ProfileGuard {
    _handle: Option<Box<dyn Any + Send>>,
}

impl ProfileGuard {
    /// Wraps whatever keeps the registration alive.
    pub fn new<H: Any + Send>(handle: H) -> Self {
        Self {
            _handle: Some(Box::new(handle)),
        }
    }

    /// A guard for a registration with nothing to release.
    pub fn detached() -> Self {
        Self { _handle: None }
    }
}

impl std::fmt::Debug for ProfileGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileGuard").finish_non_exhaustive()
    }
}

/// Publishes a [`HidProfile`] with the Bluetooth stack.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRegistrar: Send + Sync {
    async fn register(&self, profile: &HidProfile) -> Result<ProfileGuard, ProfileError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_hid_service_uuid_string_form() {
        assert_eq!(
            HID_SERVICE_UUID.to_string(),
            "00001124-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_default_record_declares_both_hid_psms() {
        // 0x0011 control and 0x0013 interrupt appear as L2CAP protocol parameters
        assert!(DEFAULT_SERVICE_RECORD.contains("0x1124"));
        assert!(DEFAULT_SERVICE_RECORD.contains("0x0011"));
        assert!(DEFAULT_SERVICE_RECORD.contains("0x0013"));
    }

    #[test]
    fn test_from_config_uses_bundled_record_by_default() {
        let profile = HidProfile::from_config(&ProfileConfig::default()).unwrap();
        assert_eq!(profile, HidProfile::default());
    }

    #[test]
    fn test_from_config_reports_missing_record_file() {
        let config = ProfileConfig {
            service_record: Some(PathBuf::from("/nonexistent/btkd/record.xml")),
            ..ProfileConfig::default()
        };
        let err = HidProfile::from_config(&config).unwrap_err();
        assert!(matches!(err, ProfileError::ServiceRecord { .. }));
    }

    #[test]
    fn test_dropping_guard_drops_handle() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let guard = ProfileGuard::new(Flag(released.clone()));
        assert!(!released.load(Ordering::SeqCst));
        drop(guard);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_mock_registrar_returns_configured_result() {
        let mut registrar = MockProfileRegistrar::new();
        registrar
            .expect_register()
            .withf(|p: &HidProfile| p.uuid == HID_SERVICE_UUID)
            .times(1)
            .returning(|_| Err(ProfileError::Registration("already exists".into())));

        let result = registrar.register(&HidProfile::default()).await;

        assert!(matches!(result, Err(ProfileError::Registration(_))));
    }
}
