//! Unit-engine port — the swappable guest-language embedding.
//!
//! The host never interprets unit sources itself. An engine reads and
//! executes a source file, runs its init entry point, and hands back an
//! isolated execution context plus the manifest the unit declared. The
//! guest language is an implementation detail of the engine.

use std::path::Path;

use async_trait::async_trait;

use apiary_domain::error::ApiaryError;
use apiary_domain::unit::UnitManifest;

use crate::host::HostApi;

/// One isolated unit execution context.
///
/// The host guarantees callbacks are never invoked concurrently: every
/// external entry into a unit (message delivery, timer/ticker/alarm fire)
/// is serialized through the unit's actor task, which owns this object
/// exclusively.
///
/// Default implementations are no-ops so engines only wire up the
/// callbacks their units actually define (and declare them in the
/// manifest's [`CallbackSet`](apiary_domain::unit::CallbackSet)).
#[async_trait]
pub trait AutomationUnit: Send {
    /// A message arrived on a topic the unit subscribed to.
    async fn on_message(
        &mut self,
        topic: &str,
        data: &serde_json::Value,
    ) -> Result<(), ApiaryError> {
        let _ = (topic, data);
        Ok(())
    }

    /// A one-shot timer created by this unit fired.
    async fn on_timer(&mut self, name: &str, data: &serde_json::Value) -> Result<(), ApiaryError> {
        let _ = (name, data);
        Ok(())
    }

    /// A repeating ticker created by this unit fired.
    async fn on_ticker(&mut self, name: &str, data: &serde_json::Value) -> Result<(), ApiaryError> {
        let _ = (name, data);
        Ok(())
    }

    /// A weekly alarm created by this unit fired.
    async fn on_alarm(&mut self, name: &str, data: &serde_json::Value) -> Result<(), ApiaryError> {
        let _ = (name, data);
        Ok(())
    }
}

/// Result of loading one unit source.
pub struct LoadedUnit {
    /// The isolated execution context.
    pub unit: Box<dyn AutomationUnit>,
    /// What the unit declared about itself during init.
    pub manifest: UnitManifest,
}

/// Loads unit sources into execution contexts.
#[async_trait]
pub trait UnitEngine: Send + Sync + 'static {
    /// Read and execute the source at `path`, run its init entry point,
    /// and return the resulting unit.
    ///
    /// The provided [`HostApi`] is the unit's capability handle for the
    /// whole of its lifetime: publishing, chat/notification pushes,
    /// scheduled triggers, and shared variables. Init code may already use
    /// it (e.g. to create a ticker).
    ///
    /// # Errors
    ///
    /// Any read, parse, or init failure fails the load as a whole; the
    /// host registers nothing in that case.
    async fn load(&self, path: &Path, api: HostApi) -> Result<LoadedUnit, ApiaryError>;
}
