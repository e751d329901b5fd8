// tests/registry_tests.rs
mod common;

use common::*;
use keel::{ContextData, Keel, KeelError, Pipeline, PipelineControl, PipelineResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextAlpha {
  val: String,
}
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextBeta {
  num: i32,
}

#[tokio::test]
async fn test_registry_run_correct_pipeline() {
  setup_tracing();
  let keel_registry = Keel::<TestError>::new();

  let mut p_alpha = Pipeline::<RegistryContextAlpha, TestError>::new(&[("alpha_task", false, None)]);
  p_alpha.on_root("alpha_task", |ctx: ContextData<RegistryContextAlpha>| {
    Box::pin(async move {
      ctx.write().val = "alpha_processed".to_string();
      Ok::<PipelineControl, KeelError>(PipelineControl::Continue)
    })
  });
  keel_registry.register_pipeline(p_alpha);

  let mut p_beta = Pipeline::<RegistryContextBeta, TestError>::new(&[("beta_task", false, None)]);
  p_beta.on_root("beta_task", |ctx: ContextData<RegistryContextBeta>| {
    Box::pin(async move {
      ctx.write().num = 100;
      Ok::<PipelineControl, KeelError>(PipelineControl::Continue)
    })
  });
  keel_registry.register_pipeline(p_beta);

  assert!(keel_registry.is_registered::<RegistryContextAlpha>());
  assert!(keel_registry.is_registered::<RegistryContextBeta>());

  let ctx_alpha = ContextData::new(RegistryContextAlpha::default());
  assert_eq!(keel_registry.run(ctx_alpha.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_alpha.read().val, "alpha_processed");

  let ctx_beta = ContextData::new(RegistryContextBeta::default());
  assert_eq!(keel_registry.run(ctx_beta.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_beta.read().num, 100);
}

#[tokio::test]
async fn test_registry_pipeline_not_found() {
  setup_tracing();
  let keel_registry = Keel::<TestError>::new();
  let result = keel_registry.run(ContextData::new(RegistryContextAlpha::default())).await;
  match result.unwrap_err() {
    TestError::Keel(msg) => {
      assert!(msg.contains("ConfigurationError"));
      assert!(msg.contains("RegistryContextAlpha"));
    }
    other => panic!("Expected TestError::Keel, got {:?}", other),
  }
}

#[tokio::test]
async fn test_registry_propagates_pipeline_error_and_rolls_back() {
  setup_tracing();
  let keel_registry = Keel::<TestError>::new();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("reserve", false, None), ("fail", false, None)]);
  pipeline.on_root("reserve", create_simple_handler("reserve", "R"));
  pipeline.compensate_root("reserve", create_compensation("reserve"));
  pipeline.on_root("fail", create_failing_handler("fail", "registry failure"));
  keel_registry.register_pipeline(pipeline);

  let ctx = ContextData::new(TestContext::default());
  let err = keel_registry.run(ctx.clone()).await.unwrap_err();
  assert_eq!(err, TestError::Handler("registry failure".to_string()));
  assert_eq!(ctx.read().compensated, vec!["reserve"]);
}
