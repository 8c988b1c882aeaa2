use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic names published on the event bus (C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventType {
    ResourceRequested,
    ProviderResolved,
    ResourceProvisioning,
    StepStarted,
    StepCompleted,
    StepFailed,
    ResourceActive,
    ResourceFailed,
    ResourceRecovered,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::ResourceRequested => "ResourceRequested",
            EventType::ProviderResolved => "ProviderResolved",
            EventType::ResourceProvisioning => "ResourceProvisioning",
            EventType::StepStarted => "StepStarted",
            EventType::StepCompleted => "StepCompleted",
            EventType::StepFailed => "StepFailed",
            EventType::ResourceActive => "ResourceActive",
            EventType::ResourceFailed => "ResourceFailed",
            EventType::ResourceRecovered => "ResourceRecovered",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload published to every C8 subscriber for a single lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub application: String,
    pub source: String,
    pub data: EventData,
}

impl EventPayload {
    pub fn new(event_type: EventType, application: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            application: application.into(),
            source: source.into(),
            data: EventData::default(),
        }
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }
}
