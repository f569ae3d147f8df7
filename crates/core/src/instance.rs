use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{DomainError, DomainResult};
use crate::id::InstanceId;

/// Free-form provisioning parameters supplied by the requester.
pub type Parameters = Map<String, JsonValue>;

/// The blueprint a service instance is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Stable spec identifier, echoed as `spec_id` in job results.
    pub id: String,
    /// Fully-qualified spec name.
    pub fqname: String,
    /// Image the provisioner launches for this spec.
    pub image: String,
    pub bindable: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl Spec {
    pub fn new(id: impl Into<String>, fqname: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fqname: fqname.into(),
            image: image.into(),
            bindable: false,
            description: None,
        }
    }

    pub fn bindable(mut self, bindable: bool) -> Self {
        self.bindable = bindable;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A fully resolved service instance: identity, spec and parameters are known.
///
/// Jobs receive this aggregate as-is and never look anything up themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    id: InstanceId,
    spec: Spec,
    #[serde(default)]
    parameters: Parameters,
}

impl ServiceInstance {
    /// Build an instance, rejecting specs that are not resolved (empty id).
    pub fn new(id: InstanceId, spec: Spec, parameters: Parameters) -> DomainResult<Self> {
        if spec.id.trim().is_empty() {
            return Err(DomainError::validation("spec id must not be empty"));
        }
        Ok(Self {
            id,
            spec,
            parameters,
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn spec_id(&self) -> &str {
        &self.spec.id
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unresolved_spec() {
        let err = ServiceInstance::new(InstanceId::new(), Spec::new(" ", "x", "img"), Parameters::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn exposes_spec_id() {
        let mut params = Parameters::new();
        params.insert("size".to_string(), JsonValue::from("small"));

        let instance = ServiceInstance::new(
            InstanceId::new(),
            Spec::new("SPEC1", "dh-postgresql", "docker.io/postgresql-apb").bindable(true),
            params,
        )
        .unwrap();

        assert_eq!(instance.spec_id(), "SPEC1");
        assert!(instance.spec().bindable);
        assert_eq!(instance.parameters()["size"], "small");
    }
}
