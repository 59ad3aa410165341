use testrun_protocol::Device;
use tracing::{debug, warn};

use crate::client::{ClientError, TestrunClient};

use super::intent::{FetchFailure, Intent, Resource};
use super::poll::{poll_effects, PollCycle};
use super::state::{AppState, SettingMissedError};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Request(Request),
    ArmPollTimer { cycle: PollCycle },
    CancelPollTimer,
    AbortStatusFetch,
}

/// One call to the backend client.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Interfaces,
    SystemConfig,
    Devices,
    RiskProfiles,
    SystemVersion,
    SystemStatus { cycle: PollCycle },
    StartTestrun { device: Device },
    StopTestrun,
    CreateDevice { device: Device },
    EditDevice { mac_addr: String, device: Device },
    DeleteDevice { device: Device },
}

impl Request {
    pub fn resource(&self) -> Resource {
        match self {
            Request::Interfaces => Resource::Interfaces,
            Request::SystemConfig => Resource::SystemConfig,
            Request::Devices => Resource::Devices,
            Request::RiskProfiles => Resource::RiskProfiles,
            Request::SystemVersion => Resource::SystemVersion,
            Request::SystemStatus { .. } => Resource::SystemStatus,
            Request::StartTestrun { .. } => Resource::StartTestrun,
            Request::StopTestrun => Resource::StopTestrun,
            Request::CreateDevice { .. } => Resource::CreateDevice,
            Request::EditDevice { .. } => Resource::EditDevice,
            Request::DeleteDevice { .. } => Resource::DeleteDevice,
        }
    }
}

/// Work the runtime must carry out after `intent` moved the state from `prev`
/// to `next`.
pub fn effects_for(prev: &AppState, next: &AppState, intent: &Intent) -> Vec<Effect> {
    let mut effects = Vec::new();

    let request = match intent {
        Intent::FetchInterfaces => Some(Request::Interfaces),
        Intent::FetchSystemConfig => Some(Request::SystemConfig),
        Intent::FetchDevices => Some(Request::Devices),
        Intent::FetchRiskProfiles => Some(Request::RiskProfiles),
        Intent::FetchSystemVersion => Some(Request::SystemVersion),
        Intent::StartTestrun { device } if started(prev, next, Resource::StartTestrun) => {
            Some(Request::StartTestrun {
                device: device.clone(),
            })
        }
        Intent::StopTestrun if started(prev, next, Resource::StopTestrun) => {
            Some(Request::StopTestrun)
        }
        Intent::CreateDevice { device } if started(prev, next, Resource::CreateDevice) => {
            Some(Request::CreateDevice {
                device: device.clone(),
            })
        }
        Intent::EditDevice { mac_addr, device } if started(prev, next, Resource::EditDevice) => {
            Some(Request::EditDevice {
                mac_addr: mac_addr.clone(),
                device: device.clone(),
            })
        }
        Intent::DeleteDevice { device } if started(prev, next, Resource::DeleteDevice) => {
            Some(Request::DeleteDevice {
                device: device.clone(),
            })
        }
        _ => None,
    };
    effects.extend(request.map(Effect::Request));
    effects.extend(poll_effects(&prev.poll, &next.poll));
    effects
}

fn started(prev: &AppState, next: &AppState, resource: Resource) -> bool {
    !prev.loading.contains(&resource) && next.loading.contains(&resource)
}

/// Runs one request and reports its outcome as intents. Never fails: every
/// fault becomes an intent.
pub async fn perform(client: &dyn TestrunClient, request: Request) -> Vec<Intent> {
    let resource = request.resource();
    debug!(%resource, "request");

    match request {
        Request::Interfaces => match client.interfaces().await {
            Ok(host) => vec![Intent::FetchHostInterfacesSuccess { host }],
            Err(err) => failed(resource, &err),
        },
        Request::SystemConfig => match client.system_config().await {
            Ok(config) => vec![Intent::FetchSystemConfigSuccess { config }],
            Err(err) => failed(resource, &err),
        },
        Request::Devices => match client.devices().await {
            Ok(devices) => vec![Intent::SetDevices { devices }],
            Err(err) => failed(resource, &err),
        },
        Request::RiskProfiles => match client.risk_profiles().await {
            Ok(profiles) => vec![Intent::FetchRiskProfilesSuccess { profiles }],
            Err(err) => failed(resource, &err),
        },
        Request::SystemVersion => match client.version().await {
            Ok(version) => vec![Intent::FetchSystemVersionSuccess { version }],
            Err(err) => failed(resource, &err),
        },
        Request::SystemStatus { cycle } => match client.system_status().await {
            Ok(status) => vec![Intent::FetchSystemStatusSuccess { cycle, status }],
            Err(err) => {
                // setting-missed is raised by the reducer, for accepted cycles only
                warn!(%cycle, error = %err, "status fetch failed");
                vec![Intent::FetchSystemStatusFailed {
                    cycle,
                    failure: FetchFailure::from(&err),
                }]
            }
        },
        Request::StartTestrun { device } => match client.start_testrun(&device).await {
            Ok(status) => vec![Intent::StartTestrunSuccess { device, status }],
            Err(err) => failed(resource, &err),
        },
        Request::StopTestrun => match client.stop_testrun().await {
            Ok(()) => vec![Intent::StopTestrunSuccess, Intent::FetchSystemStatus],
            Err(err) => failed(resource, &err),
        },
        Request::CreateDevice { device } => match client.create_device(&device).await {
            Ok(()) => vec![Intent::CreateDeviceSuccess { device }, Intent::FetchDevices],
            Err(err) => failed(resource, &err),
        },
        Request::EditDevice { mac_addr, device } => {
            match client.edit_device(&mac_addr, &device).await {
                Ok(()) => vec![
                    Intent::EditDeviceSuccess { mac_addr, device },
                    Intent::FetchDevices,
                ],
                Err(err) => failed(resource, &err),
            }
        }
        Request::DeleteDevice { device } => match client.delete_device(&device).await {
            Ok(()) => vec![
                Intent::DeleteDeviceSuccess {
                    mac_addr: device.mac_addr,
                },
                Intent::FetchDevices,
            ],
            Err(err) => failed(resource, &err),
        },
    }
}

fn failed(resource: Resource, err: &ClientError) -> Vec<Intent> {
    warn!(%resource, error = %err, "request failed");
    let failure = FetchFailure::from(err);
    let mut intents = setting_missed(&failure);
    intents.push(Intent::FetchFailed { resource, failure });
    intents
}

fn setting_missed(failure: &FetchFailure) -> Vec<Intent> {
    if !failure.is_configuration_missing() {
        return Vec::new();
    }
    vec![Intent::UpdateError {
        error: Some(SettingMissedError {
            is_setting_missed: true,
            devices_available: false,
        }),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::intent::FailureKind;
    use crate::store::reducer::reduce;
    use async_trait::async_trait;
    use testrun_protocol::{HostInterfaces, Profile, SystemConfig, SystemVersion, TestrunStatus};

    struct Stub {
        interfaces: Result<HostInterfaces, ClientError>,
        status: Result<TestrunStatus, ClientError>,
    }

    #[async_trait]
    impl TestrunClient for Stub {
        async fn interfaces(&self) -> Result<HostInterfaces, ClientError> {
            self.interfaces.clone()
        }
        async fn system_config(&self) -> Result<SystemConfig, ClientError> {
            Err(ClientError::ConfigurationMissing("no config".to_owned()))
        }
        async fn system_status(&self) -> Result<TestrunStatus, ClientError> {
            self.status.clone()
        }
        async fn devices(&self) -> Result<Vec<Device>, ClientError> {
            Ok(Vec::new())
        }
        async fn risk_profiles(&self) -> Result<Vec<Profile>, ClientError> {
            Ok(Vec::new())
        }
        async fn version(&self) -> Result<SystemVersion, ClientError> {
            Ok(SystemVersion::default())
        }
        async fn start_testrun(&self, _device: &Device) -> Result<TestrunStatus, ClientError> {
            Err(ClientError::Rejected {
                status: 409,
                message: "Testrun is already running".to_owned(),
            })
        }
        async fn stop_testrun(&self) -> Result<(), ClientError> {
            Ok(())
        }
        async fn create_device(&self, _device: &Device) -> Result<(), ClientError> {
            Ok(())
        }
        async fn edit_device(&self, _mac_addr: &str, _device: &Device) -> Result<(), ClientError> {
            Err(ClientError::Rejected {
                status: 404,
                message: "A device with that mac address could not be found".to_owned(),
            })
        }
        async fn delete_device(&self, _device: &Device) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn host() -> HostInterfaces {
        [("eth0", "08:00:27:aa:bb:cc"), ("eth1", "00:e0:4c:11:22:33")]
            .into_iter()
            .collect()
    }

    fn ok_stub() -> Stub {
        Stub {
            interfaces: Ok(host()),
            status: Err(ClientError::Transport("connection refused".to_owned())),
        }
    }

    #[test]
    fn each_fetch_intent_issues_one_request() {
        let state = AppState::new();
        for (intent, request) in [
            (Intent::FetchInterfaces, Request::Interfaces),
            (Intent::FetchSystemConfig, Request::SystemConfig),
            (Intent::FetchDevices, Request::Devices),
            (Intent::FetchRiskProfiles, Request::RiskProfiles),
            (Intent::FetchSystemVersion, Request::SystemVersion),
        ] {
            let next = reduce(state.clone(), &intent);
            assert_eq!(
                effects_for(&state, &next, &intent),
                vec![Effect::Request(request)]
            );
        }
    }

    #[test]
    fn blocked_start_issues_nothing() {
        let state = AppState::new();
        let intent = Intent::StartTestrun {
            device: Device::default(),
        };
        let next = reduce(state.clone(), &intent);
        assert!(effects_for(&state, &next, &intent).is_empty());
    }

    #[test]
    fn repeated_stop_issues_one_request() {
        let state = AppState::new();
        let first = reduce(state.clone(), &Intent::StopTestrun);
        assert_eq!(
            effects_for(&state, &first, &Intent::StopTestrun),
            vec![Effect::Request(Request::StopTestrun)]
        );
        let second = reduce(first.clone(), &Intent::StopTestrun);
        assert!(effects_for(&first, &second, &Intent::StopTestrun).is_empty());
    }

    #[test]
    fn status_fetch_comes_from_poll_transition() {
        let state = AppState::new();
        let next = reduce(state.clone(), &Intent::FetchSystemStatus);
        assert_eq!(
            effects_for(&state, &next, &Intent::FetchSystemStatus),
            vec![Effect::Request(Request::SystemStatus {
                cycle: PollCycle(0)
            })]
        );
    }

    #[tokio::test]
    async fn success_becomes_success_intent() {
        let intents = perform(&ok_stub(), Request::Interfaces).await;
        assert_eq!(intents, vec![Intent::FetchHostInterfacesSuccess { host: host() }]);
    }

    #[tokio::test]
    async fn missing_configuration_raises_update_error() {
        let intents = perform(&ok_stub(), Request::SystemConfig).await;
        assert_eq!(intents.len(), 2);
        assert!(matches!(
            &intents[0],
            Intent::UpdateError {
                error: Some(SettingMissedError {
                    is_setting_missed: true,
                    ..
                })
            }
        ));
        assert!(matches!(
            &intents[1],
            Intent::FetchFailed {
                resource: Resource::SystemConfig,
                failure
            } if failure.kind == FailureKind::ConfigurationMissing
        ));
    }

    #[tokio::test]
    async fn status_failure_keeps_its_cycle() {
        let intents = perform(&ok_stub(), Request::SystemStatus { cycle: PollCycle(3) }).await;
        assert!(matches!(
            intents.as_slice(),
            [Intent::FetchSystemStatusFailed {
                cycle: PollCycle(3),
                failure
            }] if failure.kind == FailureKind::Transient
        ));
    }

    #[tokio::test]
    async fn stop_success_refreshes_status() {
        let intents = perform(&ok_stub(), Request::StopTestrun).await;
        assert_eq!(
            intents,
            vec![Intent::StopTestrunSuccess, Intent::FetchSystemStatus]
        );

        let stub = Stub {
            interfaces: Err(ClientError::Transport("reset".to_owned())),
            ..ok_stub()
        };
        let intents = perform(&stub, Request::Interfaces).await;
        assert!(matches!(
            intents.as_slice(),
            [Intent::FetchFailed {
                resource: Resource::Interfaces,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn status_missing_configuration_is_one_cycle_tagged_intent() {
        let stub = Stub {
            status: Err(ClientError::ConfigurationMissing("not configured".to_owned())),
            ..ok_stub()
        };
        let stopping = [Intent::FetchSystemStatus, Intent::StopInterval]
            .iter()
            .fold(AppState::new(), reduce);

        let intents = perform(&stub, Request::SystemStatus { cycle: PollCycle(0) }).await;
        assert!(matches!(
            intents.as_slice(),
            [Intent::FetchSystemStatusFailed {
                cycle: PollCycle(0),
                failure
            }] if failure.is_configuration_missing()
        ));

        let late = intents.iter().fold(stopping, reduce);
        assert_eq!(late.setting_missed_error, None);
        assert!(late.poll.is_idle());
    }

    #[test]
    fn device_commands_issue_one_request_each() {
        let state = AppState::new();
        let dev = Device {
            mac_addr: "aa:01".to_owned(),
            ..Default::default()
        };
        for (intent, request) in [
            (
                Intent::CreateDevice { device: dev.clone() },
                Request::CreateDevice { device: dev.clone() },
            ),
            (
                Intent::EditDevice {
                    mac_addr: "aa:01".to_owned(),
                    device: dev.clone(),
                },
                Request::EditDevice {
                    mac_addr: "aa:01".to_owned(),
                    device: dev.clone(),
                },
            ),
            (
                Intent::DeleteDevice { device: dev.clone() },
                Request::DeleteDevice { device: dev.clone() },
            ),
        ] {
            let next = reduce(state.clone(), &intent);
            assert_eq!(
                effects_for(&state, &next, &intent),
                vec![Effect::Request(request)]
            );
            let again = reduce(next.clone(), &intent);
            assert!(effects_for(&next, &again, &intent).is_empty());
        }
    }

    #[tokio::test]
    async fn device_outcomes_refresh_the_roster() {
        let dev = Device {
            mac_addr: "aa:01".to_owned(),
            ..Default::default()
        };
        let created = perform(&ok_stub(), Request::CreateDevice { device: dev.clone() }).await;
        assert_eq!(
            created,
            vec![
                Intent::CreateDeviceSuccess { device: dev.clone() },
                Intent::FetchDevices
            ]
        );

        let deleted = perform(&ok_stub(), Request::DeleteDevice { device: dev.clone() }).await;
        assert_eq!(
            deleted,
            vec![
                Intent::DeleteDeviceSuccess {
                    mac_addr: "aa:01".to_owned()
                },
                Intent::FetchDevices
            ]
        );

        let edited = perform(
            &ok_stub(),
            Request::EditDevice {
                mac_addr: "aa:09".to_owned(),
                device: dev,
            },
        )
        .await;
        assert!(matches!(
            edited.as_slice(),
            [Intent::FetchFailed {
                resource: Resource::EditDevice,
                failure
            }] if failure.kind == FailureKind::Rejected
        ));
    }
}
