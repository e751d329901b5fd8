// src/lib.rs

//! Keel: an asynchronous step pipeline with compensating rollback.
//!
//! A pipeline is an ordered list of named steps. Each step can carry
//! `before`, `on` and `after` handlers plus a `compensate` handler. Steps run
//! in order against a shared [`ContextData`]. When a handler fails, every step
//! that already started is compensated in reverse order before the original
//! error is returned, which lets a chain of independent storage calls behave
//! as a single all-or-nothing unit (a saga).
//!
//!  - Named steps with before/on/after hooks.
//!  - Reverse-order compensation of started steps on failure.
//!  - Early stopping via `PipelineControl::Stop` (no compensation).
//!  - Optional steps and skip conditions.
//!  - A type-keyed registry for managing and running different pipelines.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

// --- Re-exports for the Public API ---

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{KeelError, KeelResult};

pub use crate::registry::Keel;

/*
    Core Workflow:
    1. Define a context struct `MyCtx` for your process.
    2. Create a `Pipeline<MyCtx, MyErr>` with its steps.
    3. Register async handlers with `.on_root()`, `.before_root()`, `.after_root()`.
    4. For steps with side effects, register an undo with `.compensate_root()`.
       Compensations read what the step recorded in the context, so a step that
       failed half-way only undoes what it actually applied.
    5. Register the pipeline with a `Keel` registry and call
       `keel.run(ContextData::new(my_ctx)).await`.
*/
