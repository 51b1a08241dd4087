// Live forecast emission
pub mod emitter;
pub mod slot_guard;

pub use emitter::{EmitFailure, EmitOutcome, EmitReport, EmitterSettings, ForecastEmitter};
pub use slot_guard::{horizon_ms, slot, SlotDecision};
