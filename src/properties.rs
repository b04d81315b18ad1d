//! Engine configuration properties.

use num_enum::{IntoPrimitive, TryFromPrimitive, TryFromPrimitiveError};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Tunable engine settings, addressable by numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum EngineProperty {
    /// Maximum number of queued pending tasks.
    MaxPendingTasks = 1,
    /// Callbacks run per `process_pending` pass; 0 runs every finished task.
    PendingBatchSize = 2,
    /// Slots reserved in the script heap at startup.
    ///
    /// Read once by [`Engine::with_properties`](crate::Engine::with_properties);
    /// setting it on a running engine is stored but changes nothing.
    InitialHeapCapacity = 3,
    /// Non-zero closes registration at the first script-facing dispatch.
    SealOnFirstDispatch = 4,
}

impl EngineProperty {
    pub const ALL: [EngineProperty; 4] = [
        EngineProperty::MaxPendingTasks,
        EngineProperty::PendingBatchSize,
        EngineProperty::InitialHeapCapacity,
        EngineProperty::SealOnFirstDispatch,
    ];

    pub fn default_value(&self) -> usize {
        match self {
            EngineProperty::MaxPendingTasks => 1024,
            EngineProperty::PendingBatchSize => 0,
            EngineProperty::InitialHeapCapacity => 64,
            EngineProperty::SealOnFirstDispatch => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("unknown engine property id {0}")]
    UnknownProperty(u32),
}

impl From<TryFromPrimitiveError<EngineProperty>> for PropertyError {
    fn from(err: TryFromPrimitiveError<EngineProperty>) -> Self {
        PropertyError::UnknownProperty(err.number)
    }
}

/// Property values; unset properties read as their default.
#[derive(Debug, Clone, Default)]
pub struct EngineProperties {
    values: FxHashMap<EngineProperty, usize>,
}

impl EngineProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: EngineProperty) -> usize {
        self.values
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    /// Set a value, returning the previous one.
    pub fn set(&mut self, property: EngineProperty, value: usize) -> usize {
        let previous = self.get(property);
        self.values.insert(property, value);
        previous
    }

    pub fn reset(&mut self, property: EngineProperty) {
        self.values.remove(&property);
    }

    pub fn is_enabled(&self, property: EngineProperty) -> bool {
        self.get(property) != 0
    }

    pub fn get_by_id(&self, id: u32) -> Result<usize, PropertyError> {
        Ok(self.get(EngineProperty::try_from(id)?))
    }

    pub fn set_by_id(&mut self, id: u32, value: usize) -> Result<usize, PropertyError> {
        Ok(self.set(EngineProperty::try_from(id)?, value))
    }
}
