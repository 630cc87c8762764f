use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Liveness reporting for the long-running loops of a service.
///
/// Each consumer loop or background flusher registers a component with a
/// deadline and then beats on every iteration. The process is live only
/// while every registered component has beaten within its deadline, so a
/// stuck loop fails the probe instead of lingering as a zombie.
///
/// Liveness and readiness have different k8s semantics; give each probe its
/// own registry instead of sharing one.
#[derive(Clone)]
pub struct HealthRegistry {
    name: &'static str,
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentStatus {
    /// Registered but has not beaten yet.
    Starting,
    /// Beat recently; must beat again before the instant passes.
    HealthyUntil(Instant),
    /// Reported unhealthy on purpose.
    Unhealthy,
    /// Missed its deadline. Set when the status is read, not written.
    Stalled,
}

impl ComponentStatus {
    pub fn is_healthy(&self) -> bool {
        match self {
            ComponentStatus::HealthyUntil(until) => *until > Instant::now(),
            _ => false,
        }
    }
}

#[derive(Default, Debug)]
pub struct HealthStatus {
    /// True only when every registered component is currently healthy.
    pub healthy: bool,
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    /// 200 when healthy, 500 otherwise, with one line per component so the
    /// probe output names the loop that stalled.
    fn into_response(self) -> Response {
        let mut body = String::new();
        for (component, status) in &self.components {
            body.push_str(&format!("{component}: {status:?}\n"));
        }
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

/// Held by one component; reports beats into the registry it came from.
#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
}

impl HealthRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            components: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a component in `Starting` state. It counts against the
    /// overall status immediately, so loops should beat as soon as they run.
    pub fn register(&self, component: impl Into<String>, deadline: Duration) -> HealthHandle {
        let component = component.into();
        match self.components.write() {
            Ok(mut components) => {
                components.insert(component.clone(), ComponentStatus::Starting);
            }
            Err(_) => warn!(
                registry = self.name,
                component, "health registry lock poisoned during register"
            ),
        }
        HealthHandle {
            component,
            deadline,
            components: self.components.clone(),
        }
    }

    pub fn get_status(&self) -> HealthStatus {
        let Ok(components) = self.components.read() else {
            warn!(registry = self.name, "health registry lock poisoned");
            return HealthStatus::default();
        };
        let mut healthy = true;
        let mut out = HashMap::with_capacity(components.len());
        for (component, status) in components.iter() {
            let status = match status {
                ComponentStatus::HealthyUntil(until) if *until <= Instant::now() => {
                    ComponentStatus::Stalled
                }
                other => other.clone(),
            };
            healthy = healthy && status.is_healthy();
            out.insert(component.clone(), status);
        }
        HealthStatus {
            healthy,
            components: out,
        }
    }
}

impl HealthHandle {
    /// Marks the component healthy until its deadline from now. Must be
    /// called more frequently than the deadline.
    pub fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            Instant::now() + self.deadline,
        ));
    }

    pub fn report_unhealthy(&self) {
        self.report_status(ComponentStatus::Unhealthy);
    }

    pub fn report_status(&self, status: ComponentStatus) {
        match self.components.write() {
            Ok(mut components) => {
                components.insert(self.component.clone(), status);
            }
            Err(_) => warn!(
                component = self.component,
                "health registry lock poisoned during report"
            ),
        }
    }
}
