use crate::harness::{Assertion, CaseSpec, FlowBlueprint, RunContext, Scenario};
use anyhow::{bail, ensure};
use flowtest_core::Submission;
use serde_json::json;

fn case(name: &str, value: &str) -> CaseSpec {
    CaseSpec::new(name)
        .input("in.txt", "hello")
        .expected_output("out.txt", "HELLO")
        .input_attribute("tenant", value)
}

#[test]
fn test_harness_nodes_reused_across_cases() {
    Scenario::new("harness_nodes_reused_across_cases")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1", "acme"))
        .with_case("validate", case("validate_tc2", "globex"))
        .assert_call_count("create_processor request_injector", 1)
        .assert_call_count("update_processor request_injector", 1)
        .assert_call_count("update_processor response_emitter", 1)
        .assert_call_count("create_connection", 14)
        .assert_call_count("delete_connection", 14)
        .assert_passed("validate", "validate_tc2")
        .run()
        .unwrap();
}

#[test]
fn test_attribute_mapper_recreated_each_case() {
    Scenario::new("attribute_mapper_recreated_each_case")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1", "acme"))
        .with_case("validate", case("validate_tc2", "globex"))
        .assert_call_count("create_processor attribute_mapper", 2)
        .assert_call_count("delete_processor attribute_mapper", 1)
        .assert_no_call("update_processor attribute_mapper")
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            let history = ctx.platform.properties_history("attribute_mapper");
            let tenants: Vec<_> = history.iter().map(|p| p.get("tenant").cloned()).collect();
            ensure!(
                tenants == vec![Some(json!("acme")), Some(json!("globex"))],
                "{:?}",
                tenants
            );
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_case_without_input_skips_content_injector() {
    Scenario::new("case_without_input_skips_content_injector")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", CaseSpec::new("validate_tc1").expected_attribute("ok", "yes"))
        .assert_no_call("create_processor content_injector")
        .assert_calls_in_order(&["create_connection attribute_mapper->from-outside"])
        .assert_call_count("create_connection", 6)
        .assert_passed("validate", "validate_tc1")
        .run()
        .unwrap();
}

#[test]
fn test_skip_replace_text_skips_content_injector() {
    Scenario::new("skip_replace_text_skips_content_injector")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case(
            "validate",
            case("validate_tc1", "acme").settings(json!({"skip_replace_text_in": true})),
        )
        .assert_no_call("create_processor content_injector")
        .assert_calls_in_order(&["create_connection attribute_mapper->from-outside"])
        .run()
        .unwrap();
}

#[test]
fn test_binary_case_uploads_input() {
    Scenario::new("binary_case_uploads_input")
        .with_flow("ingest", FlowBlueprint::new(1))
        .with_case(
            "ingest",
            CaseSpec::new("ingest_tc1")
                .input("payload.bin", "PK\u{3}\u{4}")
                .settings(json!({"load_file_type": "BINARY"})),
        )
        .assert_passed("ingest", "ingest_tc1")
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            match ctx.endpoint.submissions().as_slice() {
                [Submission::Upload { file_name, content }] => {
                    ensure!(file_name == "payload.bin", "{}", file_name);
                    ensure!(content.as_slice() == b"PK\x03\x04", "{:?}", content);
                    Ok(())
                }
                other => bail!("unexpected submissions: {:?}", other),
            }
        })))
        .assert(Assertion::Custom(Box::new(|ctx: &RunContext| {
            // Binary input is uploaded, never injected as text
            let injector = ctx.platform.properties_history("content_injector");
            let value = injector.first().and_then(|p| p.get("Replacement Value")).cloned();
            ensure!(value == Some(json!("")), "{:?}", value);
            Ok(())
        })))
        .run()
        .unwrap();
}
