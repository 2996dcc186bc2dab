use crate::harness::{CaseSpec, FlowBlueprint, Scenario, FAIL_RESPONSE, PASS_RESPONSE};
use flowtest_core::RunVerdict;
use serde_json::json;

fn case(name: &str) -> CaseSpec {
    CaseSpec::new(name)
        .input("in.txt", "hello")
        .expected_output("out.txt", "HELLO")
        .expected_attribute("status", "ok")
}

#[test]
fn test_mismatch_fails_case_and_run() {
    Scenario::new("mismatch_fails_case_and_run")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .endpoint_responds(FAIL_RESPONSE)
        .assert_failed("validate", "validate_tc1")
        .assert_verdict(RunVerdict::Failure)
        .assert_completed("validate")
        .assert_report_contains("validate", "Tests FAILED: 1 [\"validate_tc1\"]")
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_one_failure_does_not_stop_later_cases() {
    Scenario::new("one_failure_does_not_stop_later_cases")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .with_case("validate", case("validate_tc2"))
        .with_case("validate", case("validate_tc3"))
        .endpoint_responds(PASS_RESPONSE)
        .endpoint_responds(FAIL_RESPONSE)
        .assert_passed("validate", "validate_tc1")
        .assert_failed("validate", "validate_tc2")
        .assert_passed("validate", "validate_tc3")
        .assert_endpoint_calls(3)
        .assert_report_contains("validate", "Tests PASSED: 2")
        .assert_verdict(RunVerdict::Failure)
        .run()
        .unwrap();
}

#[test]
fn test_attribute_mismatch_alone_fails() {
    Scenario::new("attribute_mismatch_alone_fails")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .endpoint_responds(r#"{"flow_attributes_match": "false", "flow_content_match": "match"}"#)
        .assert_failed("validate", "validate_tc1")
        .run()
        .unwrap();
}

#[test]
fn test_failed_pre_command_skips_submission() {
    Scenario::new("failed_pre_command_skips_submission")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1").before("./seed-database.sh"))
        .command_fails("./seed-database.sh")
        .assert_failed("validate", "validate_tc1")
        .assert_case_error("validate", "validate_tc1", "./seed-database.sh")
        .assert_endpoint_calls(0)
        .assert_commands(&["./seed-database.sh"])
        .assert_call_count("delete_connection", 7)
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_pre_and_post_commands_wrap_submission() {
    Scenario::new("pre_and_post_commands_wrap_submission")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case(
            "validate",
            case("validate_tc1").settings(json!({
                "subprocess": {"before": "make seed", "after": "make clean"}
            })),
        )
        .assert_passed("validate", "validate_tc1")
        .assert_commands(&["make seed", "make clean"])
        .run()
        .unwrap();
}

#[test]
fn test_failed_post_command_fails_case() {
    Scenario::new("failed_post_command_fails_case")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case(
            "validate",
            case("validate_tc1").settings(json!({"subprocess": {"after": "make clean"}})),
        )
        .command_fails("make clean")
        .assert_failed("validate", "validate_tc1")
        .assert_endpoint_calls(1)
        .assert_case_error("validate", "validate_tc1", "exit code Some(1)")
        .run()
        .unwrap();
}

#[test]
fn test_malformed_response_fails_case() {
    Scenario::new("malformed_response_fails_case")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .endpoint_responds("<html>502 Bad Gateway</html>")
        .assert_failed("validate", "validate_tc1")
        .assert_case_error("validate", "validate_tc1", "malformed test endpoint response")
        .run()
        .unwrap();
}

#[test]
fn test_missing_content_field_fails_case() {
    Scenario::new("missing_content_field_fails_case")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .endpoint_responds(r#"{"flow_attributes_match": "true"}"#)
        .assert_failed("validate", "validate_tc1")
        .assert_case_error("validate", "validate_tc1", "flow_content_match")
        .run()
        .unwrap();
}

#[test]
fn test_skipped_content_check_tolerates_missing_field() {
    Scenario::new("skipped_content_check_tolerates_missing_field")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case(
            "validate",
            case("validate_tc1").settings(json!({"skip_check_out_content": "true"})),
        )
        .endpoint_responds(r#"{"flow_attributes_match": "true"}"#)
        .assert_passed("validate", "validate_tc1")
        .run()
        .unwrap();
}

#[test]
fn test_unreachable_endpoint_fails_case_only() {
    Scenario::new("unreachable_endpoint_fails_case_only")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .with_case("validate", case("validate_tc2"))
        .endpoint_fails("connection refused")
        .assert_failed("validate", "validate_tc1")
        .assert_case_error("validate", "validate_tc1", "connection refused")
        .assert_passed("validate", "validate_tc2")
        .assert_completed("validate")
        .run()
        .unwrap();
}

#[test]
fn test_harness_teardown_failure_fails_case() {
    Scenario::new("harness_teardown_failure_fails_case")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .platform_fails_on("stop", "comparator")
        .assert_failed("validate", "validate_tc1")
        .assert_case_error("validate", "validate_tc1", "harness teardown")
        .assert_case_error("validate", "validate_tc1", "injected failure on comparator")
        // Later steps still ran
        .assert_call_count("stop response_emitter", 1)
        .assert_call_count("delete_connection", 7)
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_build_failure_is_torn_down() {
    Scenario::new("build_failure_is_torn_down")
        .with_flow("validate", FlowBlueprint::new(1))
        .with_case("validate", case("validate_tc1"))
        .platform_fails_on("create_connection", "comparator->response_builder")
        .assert_failed("validate", "validate_tc1")
        .assert_case_error("validate", "validate_tc1", "create_connection")
        .assert_endpoint_calls(0)
        .assert_call_count("delete_connection", 5)
        .assert_no_call("start_group validate")
        .assert_canvas_clean()
        .run()
        .unwrap();
}
