// keel/src/pipeline/execution.rs

//! Contains `Pipeline::run()`, which executes the steps and, on failure, unwinds
//! the started steps through their compensation handlers.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::error::KeelError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, info_span, instrument, Instrument, Level};

/// How a phase of a step ended.
enum PhaseOutcome<Err> {
  Continue,
  Stop,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<KeelError> + Send + Sync + 'static,
{
  /// Executes the pipeline against the shared context `ctx_data`.
  ///
  /// - `Ok(Completed)` when every step ran.
  /// - `Ok(Stopped)` when a handler returned `PipelineControl::Stop`. Nothing is undone.
  /// - `Err(e)` when a handler failed or a non-optional step has no handlers. Before
  ///   returning, the compensation of every started step runs in reverse order,
  ///   including the failing step itself. Compensation failures are logged and
  ///   counted; the original error is what the caller receives.
  #[instrument(
        name = "Pipeline::run",
        skip_all,
        fields(
            pipeline_context_data_type = %std::any::type_name::<TData>(),
            num_steps = self.steps.len(),
        ),
        err(Display)
    )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");
    // Indices of steps whose handlers began executing.
    let mut started: Vec<usize> = Vec::new();

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = info_span!(
        "pipeline_step_execution",
        step_name = step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          step_span.in_scope(|| event!(Level::INFO, "Step skipped due to 'skip_if' condition."));
          continue;
        }
      }

      let has_handlers = [&self.before, &self.on, &self.after]
        .iter()
        .any(|phase| phase.get(step_name).is_some_and(|v| !v.is_empty()));

      if !has_handlers {
        if step_def.optional {
          step_span.in_scope(|| event!(Level::DEBUG, "Optional step has no handlers, skipping."));
          continue;
        }
        step_span.in_scope(|| event!(Level::ERROR, "Non-optional step has no handlers."));
        let err = Err::from(KeelError::HandlerMissing {
          step_name: step_def.name.clone(),
        });
        self.compensate(&started, &ctx_data).await;
        return Err(err);
      }

      started.push(step_idx);

      for (phase_name, phase) in [("before", &self.before), ("on", &self.on), ("after", &self.after)] {
        let Some(handlers) = phase.get(step_name) else {
          continue;
        };
        match Self::run_phase(phase_name, handlers, &ctx_data)
          .instrument(step_span.clone())
          .await
        {
          PhaseOutcome::Continue => {}
          PhaseOutcome::Stop => {
            step_span.in_scope(|| event!(Level::INFO, phase = phase_name, "Pipeline stopped by a handler."));
            return Ok(PipelineResult::Stopped);
          }
          PhaseOutcome::Failed(e) => {
            step_span.in_scope(|| event!(Level::ERROR, phase = phase_name, error = %e, "Handler failed."));
            self.compensate(&started, &ctx_data).await;
            return Err(e);
          }
        }
      }
      step_span.in_scope(|| event!(Level::DEBUG, "Step processing finished successfully."));
    }

    event!(Level::DEBUG, "Pipeline execution completed successfully.");
    Ok(PipelineResult::Completed)
  }

  async fn run_phase(
    phase_name: &'static str,
    handlers: &[Handler<TData, Err>],
    ctx_data: &ContextData<TData>,
  ) -> PhaseOutcome<Err> {
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let handler_span = info_span!("step_handler", phase = phase_name, handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => return PhaseOutcome::Stop,
        Err(e) => return PhaseOutcome::Failed(e),
      }
    }
    PhaseOutcome::Continue
  }

  /// Runs the compensation of each started step, most recent first.
  /// Returns how many compensations failed.
  async fn compensate(&self, started: &[usize], ctx_data: &ContextData<TData>) -> usize {
    let mut failures = 0;
    for &step_idx in started.iter().rev() {
      let step_name = self.steps[step_idx].name.as_str();
      let Some(undo) = self.compensations.get(step_name) else {
        continue;
      };
      let span = info_span!("step_compensation", step_name = step_name, step_index = step_idx);
      match undo(ctx_data.clone()).instrument(span.clone()).await {
        Ok(_) => span.in_scope(|| event!(Level::INFO, "Step compensated.")),
        Err(e) => {
          failures += 1;
          span.in_scope(|| event!(Level::ERROR, error = %e, "Compensation failed; effects of this step may persist."));
        }
      }
    }
    if failures > 0 {
      event!(Level::ERROR, failures, "Pipeline rollback finished with failed compensations.");
    }
    failures
  }
}
