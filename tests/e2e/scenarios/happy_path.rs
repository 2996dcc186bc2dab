use crate::harness::{Assertion, CaseSpec, FlowBlueprint, RunContext, Scenario, PASS_RESPONSE};
use anyhow::{bail, ensure};
use flowtest_core::{Deployment, RunVerdict, Submission, ALWAYS_TRUE_EXPRESSION};
use serde_json::{json, Value};

fn text_case(name: &str) -> CaseSpec {
    CaseSpec::new(name)
        .input(&format!("{}_input.txt", name), "hello")
        .expected_output(&format!("{}_output.txt", name), "HELLO")
        .input_attribute("source", "sensor-1")
        .expected_attribute("status", "ok")
}

#[test]
fn test_single_passing_case() {
    Scenario::new("single_passing_case")
        .with_flow("validate", FlowBlueprint::new(3))
        .with_case("validate", text_case("validate_tc1"))
        .assert_verdict(RunVerdict::Success)
        .assert_passed("validate", "validate_tc1")
        .assert_completed("validate")
        .assert_deployment("validate", Deployment::Full)
        .assert_endpoint_calls(1)
        .assert_canvas_clean()
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_sandbox_lifecycle_order() {
    Scenario::new("sandbox_lifecycle_order")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", text_case("validate_tc1"))
        .assert_calls_in_order(&[
            "resolve_flow validate",
            "create_process_group validate-test-pg",
            "create_controller_service testing map",
            "enable_service testing map",
            "deploy_flow validate",
            "start from-outside",
            "start to-outside",
            "create_processor request_injector",
            "start_group validate",
            "stop_group validate",
            "disable_service testing map",
            "delete_process_group validate-test-pg",
            "list_parameter_contexts *",
        ])
        .run()
        .unwrap();
}

#[test]
fn test_harness_chain_wiring() {
    Scenario::new("harness_chain_wiring")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", text_case("validate_tc1"))
        .assert_calls_in_order(&[
            "create_connection request_injector->attribute_mapper",
            "create_connection attribute_mapper->content_injector",
            "create_connection content_injector->from-outside",
            "create_connection to-outside->content_extractor",
            "create_connection content_extractor->comparator",
            "create_connection comparator->response_builder",
            "create_connection response_builder->response_emitter",
        ])
        .assert_call_count("create_connection", 7)
        .assert_call_count("delete_connection", 7)
        .assert_no_call("create_connection from-outside->to-outside")
        .run()
        .unwrap();
}

#[test]
fn test_nodes_started_before_deployed_group() {
    Scenario::new("nodes_started_before_deployed_group")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", text_case("validate_tc1"))
        .assert_calls_in_order(&[
            "start request_injector",
            "start response_emitter",
            "start_group validate",
            "stop request_injector",
            "stop response_emitter",
            "stop_group validate",
        ])
        .run()
        .unwrap();
}

#[test]
fn test_assertion_expressions_reach_the_harness() {
    Scenario::new("assertion_expressions_reach_the_harness")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case(
            "validate",
            text_case("validate_tc1").expected_attribute("kafka topic", "out"),
        )
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            let builder = ctx.platform.properties_history("response_builder");
            let body = builder
                .first()
                .and_then(|p| p.get("Replacement Value"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            ensure!(
                body.contains("${status:equals('ok'):and(${'kafka topic':equals('out')})}"),
                "unexpected response body: {}",
                body
            );

            let emitter = ctx.platform.properties_history("response_emitter");
            let first = emitter.first().cloned().unwrap_or_default();
            ensure!(first.get("status") == Some(&json!("${status}")), "{:?}", first);
            ensure!(first.get("kafka topic") == Some(&json!("${'kafka topic'}")), "{:?}", first);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_input_attributes_carry_expected_content() {
    Scenario::new("input_attributes_carry_expected_content")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", text_case("validate_tc1"))
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            let mapper = ctx.platform.properties_history("attribute_mapper");
            let first = mapper.first().cloned().unwrap_or_default();
            ensure!(first.get("source") == Some(&json!("sensor-1")), "{:?}", first);
            ensure!(first.get("test.expected") == Some(&json!("HELLO")), "{:?}", first);

            let injector = ctx.platform.properties_history("content_injector");
            let value = injector
                .first()
                .and_then(|p| p.get("Replacement Value"))
                .cloned();
            ensure!(value == Some(json!("hello")), "{:?}", value);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_text_case_submits_get() {
    Scenario::new("text_case_submits_get")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", text_case("validate_tc1"))
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            match ctx.endpoint.submissions().as_slice() {
                [Submission::Get] => Ok(()),
                other => bail!("unexpected submissions: {:?}", other),
            }
        })))
        .run()
        .unwrap();
}

#[test]
fn test_several_flows_each_get_a_sandbox() {
    Scenario::new("several_flows_each_get_a_sandbox")
        .with_flow("enrich", FlowBlueprint::new(2))
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("enrich", text_case("enrich_tc1"))
        .with_case("validate", text_case("validate_tc1"))
        .with_case("validate", text_case("validate_tc2"))
        .assert_verdict(RunVerdict::Success)
        .assert_calls_in_order(&[
            "create_process_group enrich-test-pg",
            "delete_process_group enrich-test-pg",
            "create_process_group validate-test-pg",
            "delete_process_group validate-test-pg",
        ])
        .assert_endpoint_calls(3)
        .assert_report_contains("validate", "Tests PASSED: 2")
        .assert_report_contains("enrich", "Total Tests: 1")
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_empty_expected_attributes_pass() {
    Scenario::new("empty_expected_attributes_pass")
        .with_flow("echo", FlowBlueprint::new(1))
        .with_case(
            "echo",
            CaseSpec::new("echo_tc1")
                .input("in.txt", "hello")
                .expected_output("out.txt", "hello"),
        )
        .endpoint_responds(PASS_RESPONSE)
        .assert_passed("echo", "echo_tc1")
        .assert_verdict(RunVerdict::Success)
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            let builder = ctx.platform.properties_history("response_builder");
            let body = builder
                .first()
                .and_then(|p| p.get("Replacement Value"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            ensure!(body.contains(ALWAYS_TRUE_EXPRESSION), "{}", body);
            Ok(())
        })))
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            let emitter = ctx.platform.properties_history("response_emitter");
            let Some(properties) = emitter.first() else {
                bail!("response_emitter was never configured");
            };
            let references: Vec<_> = properties
                .iter()
                .filter(|(_, v)| v.as_str().is_some_and(|s| s.starts_with("${")))
                .collect();
            ensure!(references.is_empty(), "{:?}", references);
            Ok(())
        })))
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            let mapper = ctx.platform.properties_history("attribute_mapper");
            let expected = mapper.first().and_then(|p| p.get("test.expected")).cloned();
            ensure!(expected == Some(json!("hello")), "{:?}", expected);
            Ok(())
        })))
        .run()
        .unwrap();
}
