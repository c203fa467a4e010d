use tokio_util::sync::CancellationToken;

use super::{config::SupervisorConfig, supervisor::Supervisor};
use crate::services::ServiceRef;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    services: Vec<ServiceRef>,
    parent: Option<CancellationToken>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            services: Vec::new(),
            parent: None,
        }
    }

    /// Replaces the supervised services.
    ///
    /// Order is kept: errors and logs refer to a service by its index here.
    pub fn with_services(mut self, services: Vec<ServiceRef>) -> Self {
        self.services = services;
        self
    }

    /// Appends one service.
    pub fn with_service(mut self, service: ServiceRef) -> Self {
        self.services.push(service);
        self
    }

    /// Derives the lifecycle token from `parent` instead of a fresh root.
    pub fn with_parent(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builds the supervisor.
    pub fn build(self) -> Supervisor {
        Supervisor::new(self.cfg, self.services, self.parent)
    }
}
