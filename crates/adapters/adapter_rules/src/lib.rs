//! # apiary-adapter-rules
//!
//! Rules engine — loads declarative TOML rule units into the hub.
//!
//! This is the default [`UnitEngine`]: each unit source is a TOML file
//! declaring a manifest, optional setup actions, and reactive rules (see
//! [`schema`]). The format deliberately has no scripting surface; a
//! richer engine can replace this crate behind the same port without
//! touching the core.

pub mod schema;

mod unit;

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use apiary_app::host::HostApi;
use apiary_app::ports::engine::{LoadedUnit, UnitEngine};
use apiary_domain::error::{ApiaryError, LoadError};

use crate::schema::UnitFile;
use crate::unit::{CompiledRule, RulesUnit};

/// Loads rule units. Stateless; one instance serves the whole host.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesEngine;

impl RulesEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UnitEngine for RulesEngine {
    async fn load(&self, path: &Path, api: HostApi) -> Result<LoadedUnit, ApiaryError> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| LoadError::new(path, err))?;
        let file: UnitFile =
            toml::from_str(&source).map_err(|err| LoadError::new(path, err))?;
        let manifest = file.manifest();

        let mut rules = Vec::with_capacity(file.rules.len());
        for spec in file.rules {
            let mut actions = Vec::with_capacity(spec.actions.len());
            for action in spec.actions {
                actions.push(schema::compile(action).map_err(|err| LoadError::new(path, err))?);
            }
            rules.push(CompiledRule {
                on: spec.on.into(),
                topic: spec.topic,
                name: spec.name,
                when: spec.when,
                actions,
            });
        }

        let mut setup = Vec::with_capacity(file.setup.len());
        for action in file.setup {
            setup.push(schema::compile(action).map_err(|err| LoadError::new(path, err))?);
        }

        let unit = RulesUnit::new(api, rules);
        for action in &setup {
            unit.apply(action, &serde_json::Value::Null).await;
        }
        debug!(unit = %path.display(), name = manifest.name, "rule unit initialised");

        Ok(LoadedUnit {
            unit: Box::new(unit),
            manifest,
        })
    }
}
