//! Trait/permission registry.
//!
//! Maps fully-qualified API service names to the device trait they belong
//! to, and classifies each method as a read or a write. The default policy
//! is generated from a registry instance; there is no process-wide registry.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuthzError, AuthzResult};

/// Permission identifiers understood by the default policy.
pub mod permission {
    /// Read access to trait APIs.
    pub const TRAIT_READ: &str = "trait:read";
    /// Read and write access to trait APIs.
    pub const TRAIT_WRITE: &str = "trait:write";
    /// Unrestricted access, honoured only when unscoped.
    pub const SUPERUSER: &str = "*";
}

/// Method name prefixes classified as reads unless overridden.
pub const READ_METHOD_PREFIXES: &[&str] = &["Get", "Pull", "List", "Describe"];

/// Kind of access a method requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Observes state.
    Read,
    /// Changes state.
    Write,
}

impl Access {
    /// Classify a method by its name.
    pub fn for_method(method: &str) -> Self {
        if READ_METHOD_PREFIXES.iter().any(|p| method.starts_with(p)) {
            Self::Read
        } else {
            Self::Write
        }
    }

    /// Permissions that grant this kind of access. Write implies read.
    pub const fn satisfying_permissions(self) -> &'static [&'static str] {
        match self {
            Self::Read => &[permission::TRAIT_READ, permission::TRAIT_WRITE],
            Self::Write => &[permission::TRAIT_WRITE],
        }
    }
}

/// Fully-qualified trait name, e.g. `smartcore.bos.SoundSensor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitName(String);

impl TraitName {
    /// Create a trait name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraitName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TraitName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    /// Trait the service belongs to.
    #[serde(rename = "trait")]
    pub trait_name: TraitName,
    /// Methods whose access differs from their name-based classification.
    pub methods: BTreeMap<String, Access>,
}

/// Registry of trait APIs.
#[derive(Debug, Clone, Default)]
pub struct TraitRegistry {
    services: BTreeMap<String, ServiceEntry>,
}

impl TraitRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard trait APIs served by the platform.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (trait_name, services) in BUILTIN_TRAITS {
            registry.register(*trait_name, services.iter().copied());
        }
        registry
    }

    /// Register `services` as APIs of `trait_name`.
    ///
    /// A service already registered to another trait is moved.
    pub fn register<S: Into<String>>(
        &mut self,
        trait_name: impl Into<TraitName>,
        services: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let trait_name = trait_name.into();
        for service in services {
            let service = service.into();
            let entry = ServiceEntry {
                trait_name: trait_name.clone(),
                methods: BTreeMap::new(),
            };
            if let Some(previous) = self.services.insert(service.clone(), entry) {
                if previous.trait_name != trait_name {
                    warn!(
                        service,
                        previous = %previous.trait_name,
                        current = %trait_name,
                        "service re-registered to a different trait"
                    );
                }
            }
        }
        self
    }

    /// Override the access classification of one method.
    pub fn register_method(
        &mut self,
        service: &str,
        method: impl Into<String>,
        access: Access,
    ) -> AuthzResult<&mut Self> {
        let entry = self.services.get_mut(service).ok_or_else(|| {
            AuthzError::InvalidInput(format!("service {service} is not registered"))
        })?;
        entry.methods.insert(method.into(), access);
        Ok(self)
    }

    /// The trait `service` belongs to. Only exact names match.
    pub fn lookup_trait_for_service(&self, service: &str) -> Option<&TraitName> {
        self.services.get(service).map(|entry| &entry.trait_name)
    }

    /// Access required by `method` of a registered `service`.
    pub fn method_access(&self, service: &str, method: &str) -> Option<Access> {
        let entry = self.services.get(service)?;
        Some(
            entry
                .methods
                .get(method)
                .copied()
                .unwrap_or_else(|| Access::for_method(method)),
        )
    }

    /// Registered services in name order.
    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceEntry)> {
        self.services.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Distinct registered traits.
    pub fn traits(&self) -> BTreeSet<&TraitName> {
        self.services.values().map(|entry| &entry.trait_name).collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// The registry as the data document consumed by the default policy.
    pub fn to_data(&self) -> serde_json::Value {
        serde_json::json!({
            "services": self.services,
            "read_method_prefixes": READ_METHOD_PREFIXES,
            "permissions": {
                "read": Access::Read.satisfying_permissions(),
                "write": Access::Write.satisfying_permissions(),
            },
        })
    }
}

const BUILTIN_TRAITS: &[(&str, &[&str])] = &[
    ("smartcore.bos.Access", &["smartcore.bos.access.v1.AccessApi"]),
    (
        "smartcore.bos.Allocation",
        &[
            "smartcore.bos.allocation.v1.AllocationApi",
            "smartcore.bos.allocation.v1.AllocationHistory",
        ],
    ),
    ("smartcore.bos.AnprCamera", &["smartcore.bos.anprcamera.v1.AnprCameraApi"]),
    ("smartcore.bos.Button", &["smartcore.bos.button.v1.ButtonApi"]),
    (
        "smartcore.bos.EmergencyLight",
        &["smartcore.bos.emergencylight.v1.EmergencyLightApi"],
    ),
    (
        "smartcore.bos.FluidFlow",
        &[
            "smartcore.bos.fluidflow.v1.FluidFlowApi",
            "smartcore.bos.fluidflow.v1.FluidFlowInfo",
        ],
    ),
    (
        "smartcore.bos.Health",
        &[
            "smartcore.bos.health.v1.HealthApi",
            "smartcore.bos.health.v1.HealthHistory",
        ],
    ),
    (
        "smartcore.bos.Meter",
        &[
            "smartcore.bos.meter.v1.MeterApi",
            "smartcore.bos.meter.v1.MeterInfo",
            "smartcore.bos.meter.v1.MeterHistory",
        ],
    ),
    (
        "smartcore.bos.Pressure",
        &[
            "smartcore.bos.pressure.v1.PressureApi",
            "smartcore.bos.pressure.v1.PressureInfo",
        ],
    ),
    (
        "smartcore.bos.SecurityEvent",
        &["smartcore.bos.securityevent.v1.SecurityEventApi"],
    ),
    (
        "smartcore.bos.ServiceTicket",
        &[
            "smartcore.bos.serviceticket.v1.ServiceTicketApi",
            "smartcore.bos.serviceticket.v1.ServiceTicketInfo",
        ],
    ),
    (
        "smartcore.bos.SoundSensor",
        &[
            "smartcore.bos.soundsensor.v1.SoundSensorApi",
            "smartcore.bos.soundsensor.v1.SoundSensorInfo",
            "smartcore.bos.soundsensor.v1.SoundSensorHistory",
        ],
    ),
    (
        "smartcore.bos.Status",
        &[
            "smartcore.bos.status.v1.StatusApi",
            "smartcore.bos.status.v1.StatusHistory",
        ],
    ),
    ("smartcore.bos.Temperature", &["smartcore.bos.temperature.v1.TemperatureApi"]),
    (
        "smartcore.bos.Transport",
        &[
            "smartcore.bos.transport.v1.TransportApi",
            "smartcore.bos.transport.v1.TransportInfo",
            "smartcore.bos.transport.v1.TransportHistory",
        ],
    ),
    (
        "smartcore.bos.Waste",
        &[
            "smartcore.bos.waste.v1.WasteApi",
            "smartcore.bos.waste.v1.WasteInfo",
        ],
    ),
    (
        "smartcore.traits.AirQualitySensor",
        &[
            "smartcore.traits.AirQualitySensorApi",
            "smartcore.traits.AirQualitySensorInfo",
            "smartcore.bos.airqualitysensor.v1.AirQualitySensorHistory",
        ],
    ),
    (
        "smartcore.traits.AirTemperature",
        &[
            "smartcore.traits.AirTemperatureApi",
            "smartcore.traits.AirTemperatureInfo",
            "smartcore.bos.airtemperature.v1.AirTemperatureHistory",
        ],
    ),
    (
        "smartcore.traits.Electric",
        &[
            "smartcore.traits.ElectricApi",
            "smartcore.traits.ElectricInfo",
            "smartcore.bos.electric.v1.ElectricHistory",
        ],
    ),
    (
        "smartcore.traits.EnterLeaveSensor",
        &[
            "smartcore.traits.EnterLeaveSensorApi",
            "smartcore.traits.EnterLeaveSensorInfo",
            "smartcore.bos.enterleavesensor.v1.EnterLeaveSensorHistory",
        ],
    ),
    (
        "smartcore.traits.Light",
        &["smartcore.traits.LightApi", "smartcore.traits.LightInfo"],
    ),
    (
        "smartcore.traits.Metadata",
        &["smartcore.traits.MetadataApi", "smartcore.traits.MetadataInfo"],
    ),
    (
        "smartcore.traits.OccupancySensor",
        &[
            "smartcore.traits.OccupancySensorApi",
            "smartcore.traits.OccupancySensorInfo",
            "smartcore.bos.occupancysensor.v1.OccupancySensorHistory",
        ],
    ),
    (
        "smartcore.traits.OnOff",
        &["smartcore.traits.OnOffApi", "smartcore.traits.OnOffInfo"],
    ),
    (
        "smartcore.traits.Parent",
        &["smartcore.traits.ParentApi", "smartcore.traits.ParentInfo"],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_exact() {
        let registry = TraitRegistry::builtin();
        assert_eq!(
            registry
                .lookup_trait_for_service("smartcore.bos.soundsensor.v1.SoundSensorApi")
                .map(TraitName::as_str),
            Some("smartcore.bos.SoundSensor")
        );
        assert!(registry.lookup_trait_for_service("smartcore.bos.SoundSensorFoobar").is_none());
        assert!(registry
            .lookup_trait_for_service("smartcore.bos.soundsensor.v1.SoundSensorApiV2")
            .is_none());
        assert!(registry.lookup_trait_for_service("smartcore.bos.soundsensor.v1").is_none());
    }

    #[test]
    fn test_method_classification() {
        assert_eq!(Access::for_method("GetSoundLevel"), Access::Read);
        assert_eq!(Access::for_method("PullSoundLevel"), Access::Read);
        assert_eq!(Access::for_method("DescribeSoundLevel"), Access::Read);
        assert_eq!(Access::for_method("ListAllocations"), Access::Read);
        assert_eq!(Access::for_method("UpdateBrightness"), Access::Write);
        assert_eq!(Access::for_method("CreateTicket"), Access::Write);
    }

    #[test]
    fn test_write_implies_read() {
        assert!(Access::Read
            .satisfying_permissions()
            .contains(&permission::TRAIT_WRITE));
        assert!(!Access::Write
            .satisfying_permissions()
            .contains(&permission::TRAIT_READ));
    }

    #[test]
    fn test_method_overrides() {
        let mut registry = TraitRegistry::new();
        registry.register("acme.Widget", ["acme.widget.v1.WidgetApi"]);
        registry
            .register_method("acme.widget.v1.WidgetApi", "GetAndReset", Access::Write)
            .unwrap();

        assert_eq!(
            registry.method_access("acme.widget.v1.WidgetApi", "GetAndReset"),
            Some(Access::Write)
        );
        assert_eq!(
            registry.method_access("acme.widget.v1.WidgetApi", "GetWidget"),
            Some(Access::Read)
        );
        assert_eq!(registry.method_access("acme.widget.v1.Other", "GetWidget"), None);
        assert!(registry
            .register_method("acme.widget.v1.Other", "GetWidget", Access::Read)
            .is_err());
    }

    #[test]
    fn test_registries_are_isolated() {
        let mut custom = TraitRegistry::new();
        custom.register("acme.Widget", ["acme.widget.v1.WidgetApi"]);

        assert_eq!(custom.len(), 1);
        assert!(TraitRegistry::builtin()
            .lookup_trait_for_service("acme.widget.v1.WidgetApi")
            .is_none());
    }

    #[test]
    fn test_data_document() {
        let mut registry = TraitRegistry::new();
        registry.register("acme.Widget", ["acme.widget.v1.WidgetApi"]);
        let data = registry.to_data();

        assert_eq!(
            data["services"]["acme.widget.v1.WidgetApi"]["trait"],
            "acme.Widget"
        );
        assert_eq!(data["permissions"]["write"][0], permission::TRAIT_WRITE);
        assert_eq!(data["read_method_prefixes"][0], "Get");
    }

    #[test]
    fn test_builtin_traits() {
        let registry = TraitRegistry::builtin();
        assert!(!registry.is_empty());
        assert!(registry.traits().contains(&TraitName::new("smartcore.bos.Pressure")));
        assert!(registry.traits().contains(&TraitName::new("smartcore.bos.Waste")));
    }
}
