// Copyright 2026 evalcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use evalcache_memory::{Error, EventListener, Result};

use crate::cache::EvaluationCache;

/// What happens to the value of a formula entry when it goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StalePolicy {
    /// Keep the last computed value, flagged stale.
    #[default]
    Retain,
    /// Drop the value. A stale entry reads as pending until it is recomputed.
    Discard,
}

/// Settings of an [`EvaluationCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvaluationCacheConfig {
    /// Name of the session, used in log records.
    pub name: String,
    /// Initial capacity of the plain value cache.
    pub plain_capacity: usize,
    /// Initial capacity of the formula value cache.
    pub formula_capacity: usize,
    /// What happens to stale formula values.
    pub stale_policy: StalePolicy,
}

impl Default for EvaluationCacheConfig {
    fn default() -> Self {
        Self {
            name: "evalcache".to_string(),
            plain_capacity: 1024,
            formula_capacity: 256,
            stale_policy: StalePolicy::default(),
        }
    }
}

impl EvaluationCacheConfig {
    /// Entries are addressed by 32-bit slab indices.
    const MAX_CAPACITY: usize = u32::MAX as usize;

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("cache name must not be empty").with_context("name", &self.name));
        }
        for (field, capacity) in [
            ("plain_capacity", self.plain_capacity),
            ("formula_capacity", self.formula_capacity),
        ] {
            if capacity > Self::MAX_CAPACITY {
                return Err(Error::config("capacity exceeds the addressable entry count")
                    .with_context("field", field)
                    .with_context("value", capacity)
                    .with_context("max", Self::MAX_CAPACITY));
            }
        }
        Ok(())
    }
}

/// Evaluation cache builder.
#[derive(Default)]
pub struct EvaluationCacheBuilder {
    config: EvaluationCacheConfig,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl std::fmt::Debug for EvaluationCacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationCacheBuilder")
            .field("config", &self.config)
            .field("event_listener", &self.event_listener.is_some())
            .finish()
    }
}

impl EvaluationCacheBuilder {
    /// Create a builder with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from plain settings.
    pub fn from_config(config: EvaluationCacheConfig) -> Self {
        Self {
            config,
            event_listener: None,
        }
    }

    /// Set the name of the session.
    ///
    /// The name is attached to the log records of the cache.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the initial capacity of the plain value cache.
    pub fn with_plain_capacity(mut self, capacity: usize) -> Self {
        self.config.plain_capacity = capacity;
        self
    }

    /// Set the initial capacity of the formula value cache.
    pub fn with_formula_capacity(mut self, capacity: usize) -> Self {
        self.config.formula_capacity = capacity;
        self
    }

    /// Set what happens to the value of a formula entry when it goes stale.
    ///
    /// The default is [`StalePolicy::Retain`].
    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.config.stale_policy = policy;
        self
    }

    /// Set the event listener.
    ///
    /// The listener is called synchronously on hits, reads, invalidations and removals.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Get the settings collected so far.
    pub fn config(&self) -> &EvaluationCacheConfig {
        &self.config
    }

    /// Build the evaluation cache with the given configuration.
    pub fn build(self) -> Result<EvaluationCache> {
        self.config.validate()?;
        Ok(EvaluationCache::new(self.config, self.event_listener))
    }
}
