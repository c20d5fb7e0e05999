//! Job specification.
//!
//! A `JobSpec` describes a unit of work: its identity, the group that
//! routes it to a registered handler, and the opaque payload handed to
//! that handler at fire time. Specs are immutable once built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::types::JobId;

/// An immutable job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique job identifier.
    job_id: JobId,
    /// Handler group this job is routed to.
    group: String,
    /// Opaque key-value payload passed to the handler.
    payload: HashMap<String, String>,
    /// Free-text description.
    description: String,
}

impl JobSpec {
    /// Create a spec with an explicit id and group and an empty payload.
    pub fn new(job_id: impl Into<JobId>, group: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            group: group.into(),
            payload: HashMap::new(),
            description: String::new(),
        }
    }

    /// Start building a spec for the given handler group.
    pub fn builder(group: impl Into<String>) -> JobSpecBuilder {
        JobSpecBuilder::new(group)
    }

    /// Get the job id.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Get the handler group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Get the payload.
    pub fn payload(&self) -> &HashMap<String, String> {
        &self.payload
    }

    /// Get a single payload value.
    pub fn payload_value(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }

    /// Get the description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for job specs with a fluent API.
///
/// When no id is supplied, `build` generates a UUIDv4 string so callers
/// that only care about the returned identity never have to invent one.
pub struct JobSpecBuilder {
    job_id: Option<JobId>,
    group: String,
    payload: HashMap<String, String>,
    description: String,
}

impl JobSpecBuilder {
    /// Create a new builder for the given handler group.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            job_id: None,
            group: group.into(),
            payload: HashMap::new(),
            description: String::new(),
        }
    }

    /// Set an explicit job id.
    pub fn job_id(mut self, id: impl Into<JobId>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    /// Add a single payload entry.
    pub fn payload_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Replace the whole payload.
    pub fn payload(mut self, payload: HashMap<String, String>) -> Self {
        self.payload = payload;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build the spec, generating a UUID id if none was set.
    pub fn build(self) -> JobSpec {
        JobSpec {
            job_id: self
                .job_id
                .unwrap_or_else(|| JobId::new(Uuid::new_v4().to_string())),
            group: self.group,
            payload: self.payload,
            description: self.description,
        }
    }
}
