// crates/nodeflow-nodes/tests/handlers_test.rs

use nodeflow_core::{
    ExecutionStatus, NodeContext, NodeError, NodeHandler, NodeSpec, NodeStatus, Route, Value,
    Variables, WorkflowGraph,
};
use nodeflow_nodes::{
    register_all, ConditionNode, DelayNode, LoopNode, SetVariableNode, SwitchNode, TriggerNode,
};
use nodeflow_runtime::{FlowRuntime, NodeRegistry};
use std::collections::HashMap;
use std::time::{Duration, Instant};

fn variables(entries: &[(&str, Value)]) -> Variables {
    Variables::new(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

#[tokio::test]
async fn trigger_emits_payload_or_variables() {
    let ctx = NodeContext::new("t", "trigger").with_config("payload", "go");
    let output = TriggerNode.execute(ctx).await.unwrap();
    assert_eq!(output.value, Value::from("go"));

    let ctx = NodeContext::new("t", "trigger")
        .with_variables(variables(&[("user", Value::from("ada"))]));
    let output = TriggerNode.execute(ctx).await.unwrap();
    assert_eq!(output.value.get("user"), Some(&Value::from("ada")));
    assert_eq!(output.route, Route::All);
}

#[tokio::test]
async fn condition_routes_on_variable() {
    let vars = variables(&[("amount", Value::from(150.0))]);
    let ctx = NodeContext::new("c", "condition")
        .with_config("variable", "amount")
        .with_config("operator", "greater_than")
        .with_config("value", 100.0)
        .with_variables(vars.clone());
    let output = ConditionNode.execute(ctx).await.unwrap();
    assert_eq!(output.route, Route::Handle("true".to_string()));

    vars.set("amount", 50.0).await;
    let ctx = NodeContext::new("c", "condition")
        .with_config("variable", "amount")
        .with_config("operator", ">")
        .with_config("value", 100.0)
        .with_variables(vars);
    let output = ConditionNode.execute(ctx).await.unwrap();
    assert_eq!(output.route, Route::Handle("false".to_string()));
}

#[tokio::test]
async fn condition_reads_input_field() {
    let input = Value::object([("status", Value::from("ok"))]);
    let ctx = NodeContext::new("c", "condition")
        .with_config("input", "status")
        .with_config("operator", "equals")
        .with_config("value", "ok")
        .with_input(input.clone());
    let output = ConditionNode.execute(ctx).await.unwrap();
    assert_eq!(output.route, Route::Handle("true".to_string()));
    assert_eq!(output.value, input);
}

#[tokio::test]
async fn switch_matches_case_then_default_then_no_path() {
    let cases = Value::object([("small", Value::from(1.0)), ("large", Value::from(10.0))]);

    let ctx = NodeContext::new("s", "switch")
        .with_config("cases", cases.clone())
        .with_input(10.0);
    let output = SwitchNode.execute(ctx).await.unwrap();
    assert_eq!(output.route, Route::Handle("large".to_string()));

    let ctx = NodeContext::new("s", "switch")
        .with_config("cases", cases.clone())
        .with_input(5.0);
    let output = SwitchNode.execute(ctx).await.unwrap();
    assert_eq!(output.route, Route::Handle("default".to_string()));

    let ctx = NodeContext::new("s", "switch")
        .with_config("cases", cases)
        .with_config("fallthrough", false)
        .with_input(5.0);
    let output = SwitchNode.execute(ctx).await.unwrap();
    assert_eq!(output.route, Route::NoPath);
}

#[tokio::test]
async fn switch_requires_cases() {
    let ctx = NodeContext::new("s", "switch").with_input(1.0);
    assert!(SwitchNode.execute(ctx).await.is_err());
}

#[tokio::test]
async fn set_variable_uses_config_or_first_input() {
    let vars = Variables::default();
    let ctx = NodeContext::new("v", "variable.set")
        .with_config("key", "greeting")
        .with_config("value", "hello")
        .with_variables(vars.clone());
    SetVariableNode.execute(ctx).await.unwrap();
    assert_eq!(vars.get("greeting").await, Some(Value::from("hello")));

    let ctx = NodeContext::new("v", "variable.set")
        .with_config("key", "total")
        .with_input(42.0)
        .with_variables(vars.clone());
    SetVariableNode.execute(ctx).await.unwrap();
    assert_eq!(vars.get("total").await, Some(Value::from(42.0)));

    let ctx = NodeContext::new("v", "variable.set").with_config("key", "empty");
    assert!(matches!(
        SetVariableNode.execute(ctx).await,
        Err(NodeError::MissingInput(_))
    ));
}

#[tokio::test]
async fn delay_stops_when_cancelled() {
    let ctx = NodeContext::new("d", "time.delay").with_config("delay_ms", 10_000.0);
    let token = ctx.cancellation.clone();
    let started = Instant::now();

    let task = tokio::spawn(async move { DelayNode.execute(ctx).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(NodeError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn delay_passes_inputs_through() {
    let ctx = NodeContext::new("d", "time.delay")
        .with_config("delay_ms", 1.0)
        .with_input("payload");
    let output = DelayNode.execute(ctx).await.unwrap();
    assert_eq!(output.value, Value::from("payload"));
}

#[tokio::test]
async fn loop_iteration_mode_returns_ordered_records() {
    let vars = Variables::default();
    let ctx = NodeContext::new("l", "loop")
        .with_config("count", 3.0)
        .with_config("item_variable", "i")
        .with_variables(vars.clone());
    let output = LoopNode.execute(ctx).await.unwrap();

    let records = output.value.as_array().unwrap();
    assert_eq!(records.len(), 3);
    for (expected, record) in records.iter().enumerate() {
        assert_eq!(record.get("index"), Some(&Value::from(expected)));
    }
    assert_eq!(vars.get("i").await, Some(Value::from(2.0)));
}

#[tokio::test]
async fn loop_collection_mode_walks_variable() {
    let items = Value::Array(vec![Value::from("a"), Value::from("b")]);
    let ctx = NodeContext::new("l", "loop")
        .with_config("mode", "collection")
        .with_config("variable", "letters")
        .with_variables(variables(&[("letters", items)]));
    let output = LoopNode.execute(ctx).await.unwrap();

    let records = output.value.as_array().unwrap();
    assert_eq!(records[0].get("item"), Some(&Value::from("a")));
    assert_eq!(records[1].get("item"), Some(&Value::from("b")));
    assert_eq!(records[1].get("index"), Some(&Value::from(1.0)));
}

#[tokio::test]
async fn loop_rejects_non_array_collection_and_excess_count() {
    let ctx = NodeContext::new("l", "loop")
        .with_config("mode", "collection")
        .with_input("not a list");
    assert!(matches!(
        LoopNode.execute(ctx).await,
        Err(NodeError::InvalidInputType { .. })
    ));

    let ctx = NodeContext::new("l", "loop")
        .with_config("count", 20.0)
        .with_config("max_iterations", 10.0);
    assert!(matches!(
        LoopNode.execute(ctx).await,
        Err(NodeError::Configuration(_))
    ));
}

#[tokio::test]
async fn registers_every_builtin() {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    assert_eq!(
        registry.list_node_types(),
        vec![
            "condition",
            "debug.log",
            "loop",
            "parallel",
            "switch",
            "time.delay",
            "trigger",
            "variable.set",
        ]
    );
    assert_eq!(registry.metadata("time.delay").unwrap().category, "time");
}

#[tokio::test]
async fn conditional_workflow_with_builtins() {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    let runtime = FlowRuntime::new(registry);

    let mut wf = WorkflowGraph::new("approval");
    wf.add_node(NodeSpec::new("start", "trigger"));
    wf.add_node(
        NodeSpec::new("check", "condition")
            .with_config("variable", "amount")
            .with_config("operator", ">=")
            .with_config("value", 1000.0),
    );
    wf.add_node(
        NodeSpec::new("manual", "variable.set")
            .with_config("key", "route")
            .with_config("value", "manual"),
    );
    wf.add_node(
        NodeSpec::new("auto", "variable.set")
            .with_config("key", "route")
            .with_config("value", "auto"),
    );
    wf.add_node(NodeSpec::new("fanout", "parallel"));
    wf.add_node(NodeSpec::new("log", "debug.log"));
    wf.add_node(NodeSpec::new("wait", "time.delay").with_config("delay_ms", 5.0));
    wf.connect("start", "check");
    wf.connect_handle("check", "true", "manual");
    wf.connect_handle("check", "false", "auto");
    wf.connect("auto", "fanout");
    wf.connect("fanout", "log");
    wf.connect("fanout", "wait");

    let initial = HashMap::from([("amount".to_string(), Value::from(250.0))]);
    let snapshot = runtime.run(wf, initial).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    assert_eq!(snapshot.variables.get("route"), Some(&Value::from("auto")));
    assert_eq!(snapshot.node_status("manual"), Some(NodeStatus::Skipped));
    assert_eq!(snapshot.node_status("log"), Some(NodeStatus::Completed));
    assert_eq!(snapshot.node_output("wait"), Some(&Value::from("auto")));
}
