// keel/src/core/context.rs

//! Defines the `Handler<TData, Err>` type for pipeline step handlers.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// Type alias for a pipeline step handler.
///
/// A handler is an asynchronous function that takes a clone of the shared
/// `ContextData<TData>` and resolves to `Result<PipelineControl, Err>`.
///
/// Handlers are responsible for:
/// 1. Acquiring locks (`.read()` or `.write()`) on the `ContextData` to access or modify state.
/// 2. **Dropping lock guards BEFORE any `.await` suspension point.**
/// 3. Recording in the context whatever a compensation needs to undo their effects.
/// 4. Returning `PipelineControl::Continue` to proceed or `PipelineControl::Stop` to halt.
///
/// Compensation handlers share this type; their `PipelineControl` value is ignored.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
