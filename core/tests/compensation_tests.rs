// tests/compensation_tests.rs
mod common;

use common::*;
use keel::{ContextData, KeelError, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;

fn three_step_pipeline() -> Pipeline<TestContext, TestError> {
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("reserve", false, None),
    ("record", false, None),
    ("finish", false, None),
  ]);
  pipeline.on_root("reserve", create_simple_handler("reserve", "R"));
  pipeline.compensate_root("reserve", create_compensation("reserve"));
  pipeline.on_root("record", create_simple_handler("record", "C"));
  pipeline.compensate_root("record", create_compensation("record"));
  pipeline
}

#[tokio::test]
#[serial]
async fn test_failure_compensates_started_steps_in_reverse_order() {
  setup_tracing();
  let mut pipeline = three_step_pipeline();
  pipeline.on_root("finish", create_failing_handler("finish", "disk full"));
  pipeline.compensate_root("finish", create_compensation("finish"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("disk full".to_string()));
  let guard = ctx.read();
  // The failing step is compensated too: it may have applied part of its work.
  assert_eq!(guard.compensated, vec!["finish", "record", "reserve"]);
  assert_eq!(guard.counter, 0);
}

#[tokio::test]
#[serial]
async fn test_success_runs_no_compensation() {
  setup_tracing();
  let mut pipeline = three_step_pipeline();
  pipeline.on_root("finish", create_simple_handler("finish", "F"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert!(ctx.read().compensated.is_empty());
  assert_eq!(ctx.read().counter, 3);
}

#[tokio::test]
#[serial]
async fn test_stop_keeps_work_and_skips_compensation() {
  setup_tracing();
  let mut pipeline = three_step_pipeline();
  pipeline.on_root("finish", create_simple_handler("finish", "F"));

  let ctx = ContextData::new(TestContext {
    should_stop_at: Some("record".to_string()),
    ..Default::default()
  });
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert!(ctx.read().compensated.is_empty());
  assert_eq!(ctx.read().counter, 2);
}

#[tokio::test]
#[serial]
async fn test_steps_after_failure_are_not_compensated() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("reserve", false, None),
    ("boom", false, None),
    ("later", false, None),
  ]);
  pipeline.on_root("reserve", create_simple_handler("reserve", "R"));
  pipeline.compensate_root("reserve", create_compensation("reserve"));
  pipeline.on_root("boom", create_failing_handler("boom", "nope"));
  pipeline.on_root("later", create_simple_handler("later", "L"));
  pipeline.compensate_root("later", create_compensation("later"));

  let ctx = ContextData::new(TestContext::default());
  assert!(pipeline.run(ctx.clone()).await.is_err());
  assert_eq!(ctx.read().compensated, vec!["reserve"]);
}

#[tokio::test]
#[serial]
async fn test_failed_compensation_does_not_hide_original_error() {
  setup_tracing();
  let mut pipeline = three_step_pipeline();
  pipeline.compensate_root("record", |_ctx: ContextData<TestContext>| {
    Box::pin(async move { Err::<PipelineControl, _>(TestError::Compensation("ledger offline".to_string())) })
  });
  pipeline.on_root("finish", create_failing_handler("finish", "original"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("original".to_string()));
  // Earlier steps are still compensated after one undo fails.
  assert_eq!(ctx.read().compensated, vec!["reserve"]);
  assert!(pipeline.has_compensation("record"));
}

#[tokio::test]
#[serial]
async fn test_missing_handler_rolls_back_earlier_steps() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("reserve", false, None), ("unwired", false, None)]);
  pipeline.on_root("reserve", create_simple_handler("reserve", "R"));
  pipeline.compensate_root("reserve", create_compensation("reserve"));

  let ctx = ContextData::new(TestContext::default());
  let err = pipeline.run(ctx.clone()).await.unwrap_err();
  assert!(matches!(err, TestError::Keel(ref s) if s.contains("HandlerMissing")));
  assert_eq!(ctx.read().compensated, vec!["reserve"]);
}

#[tokio::test]
#[serial]
async fn test_before_hook_failure_compensates_its_step() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, KeelError>::new(&[("guarded", false, None)]);
  pipeline.before_root("guarded", |_ctx| {
    Box::pin(async move { Err::<PipelineControl, _>(KeelError::Internal("precondition".to_string())) })
  });
  pipeline.on_root("guarded", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().counter += 1;
      Ok::<_, KeelError>(PipelineControl::Continue)
    })
  });
  pipeline.compensate_root("guarded", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().compensated.push("guarded".to_string());
      Ok::<_, KeelError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(TestContext::default());
  assert!(pipeline.run(ctx.clone()).await.is_err());
  assert_eq!(ctx.read().counter, 0);
  assert_eq!(ctx.read().compensated, vec!["guarded"]);
}
