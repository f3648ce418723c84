use std::sync::Arc;

use crate::{
    application::use_cases::{
        provisioning::ProvisioningUseCases, signup::SignupUseCases,
        virtual_host::VirtualHostUseCases,
    },
    infra::{config::AppConfig, notify::NotificationHub},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub signup_use_cases: Arc<SignupUseCases>,
    pub provisioning_use_cases: Arc<ProvisioningUseCases>,
    pub vhost_use_cases: Arc<VirtualHostUseCases>,
    pub notification_hub: Arc<NotificationHub>,
}
