//! Executor-level tests: whole plans driven through `PlanExecutor`
