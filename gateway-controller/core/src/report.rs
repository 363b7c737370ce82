use crate::{resource::ResourceKey, status::Status};
use ahash::AHashMap as HashMap;
use anyhow::Result;
use std::{collections::BTreeMap, fmt};

/// The latest status of each proxy, keyed by the proxy.
pub type Statuses = HashMap<ResourceKey, Status>;

/// Validation errors indexed by the resource that caused them.
///
/// A resource with an empty list of errors has been accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceErrors(BTreeMap<ResourceKey, Vec<String>>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    invalid: Vec<(ResourceKey, Vec<String>)>,
}

/// Persists reports onto the resources that produced a proxy.
///
/// Implementations are shared by all propagation tasks and must tolerate
/// concurrent calls.
#[async_trait::async_trait]
pub trait Report {
    async fn write_reports(&self, errors: &ResourceErrors, statuses: &Statuses) -> Result<()>;
}

// === impl ResourceErrors ===

impl ResourceErrors {
    /// Records `key` as processed, without adding an error.
    pub fn accept(&mut self, key: ResourceKey) {
        self.0.entry(key).or_default();
    }

    pub fn add_error(&mut self, key: ResourceKey, error: impl ToString) {
        self.0.entry(key).or_default().push(error.to_string());
    }

    pub fn merge(&mut self, other: ResourceErrors) {
        for (key, errors) in other.0 {
            self.0.entry(key).or_default().extend(errors);
        }
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &[String])> + '_ {
        self.0.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.0.values().any(|errors| !errors.is_empty())
    }

    /// Fails if any resource has an error.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = self
            .0
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(key, errors)| (key.clone(), errors.clone()))
            .collect::<Vec<_>>();
        if invalid.is_empty() {
            return Ok(());
        }
        Err(ValidationError { invalid })
    }
}

impl std::iter::FromIterator<(ResourceKey, Vec<String>)> for ResourceErrors {
    fn from_iter<T: IntoIterator<Item = (ResourceKey, Vec<String>)>>(iter: T) -> Self {
        let mut errors = Self::default();
        for (key, errs) in iter {
            errors.0.entry(key).or_default().extend(errs);
        }
        errors
    }
}

// === impl ValidationError ===

impl ValidationError {
    pub fn resources(&self) -> impl Iterator<Item = &ResourceKey> + '_ {
        self.invalid.iter().map(|(key, _)| key)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid resource(s)", self.invalid.len())?;
        for (key, errors) in &self.invalid {
            write!(f, "; {key}: {}", errors.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
