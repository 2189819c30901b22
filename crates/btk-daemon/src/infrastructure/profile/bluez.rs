//! Profile registration through BlueZ over D-Bus.

use async_trait::async_trait;
use bluer::rfcomm::{Profile, ProfileHandle, ReqError, Role};
use bluer::Session;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{HidProfile, ProfileError, ProfileGuard, ProfileRegistrar};

/// Registers profiles with the system BlueZ daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct BluezRegistrar;

impl BluezRegistrar {
    pub fn new() -> Self {
        Self
    }
}

/// Keeps the D-Bus session and the profile handle alive.
struct Registration {
    _session: Session,
    requests: JoinHandle<()>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        // Dropping the handle inside the task unregisters the profile.
        self.requests.abort();
    }
}

#[async_trait]
impl ProfileRegistrar for BluezRegistrar {
    async fn register(&self, profile: &HidProfile) -> Result<ProfileGuard, ProfileError> {
        let session = Session::new()
            .await
            .map_err(|e| ProfileError::Registration(format!("cannot reach bluetoothd: {e}")))?;

        let handle = session
            .register_profile(Profile {
                uuid: profile.uuid,
                name: Some(profile.name.clone()),
                role: Some(Role::Server),
                service_record: Some(profile.service_record.clone()),
                require_authentication: Some(profile.require_authentication),
                require_authorization: Some(profile.require_authorization),
                ..Default::default()
            })
            .await
            .map_err(|e| ProfileError::Registration(e.to_string()))?;
        info!("registered HID profile {} ({})", profile.name, profile.uuid);

        let requests = tokio::spawn(reject_requests(handle));
        Ok(ProfileGuard::new(Registration {
            _session: session,
            requests,
        }))
    }
}

/// Channels are accepted on our own L2CAP listeners, so connection
/// requests routed through the profile are declined.
async fn reject_requests(mut handle: ProfileHandle) {
    while let Some(request) = handle.next().await {
        debug!("declining profile connection from {}", request.device());
        request.reject(ReqError::Rejected);
    }
}
