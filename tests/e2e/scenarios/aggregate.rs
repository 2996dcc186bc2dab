use crate::harness::{CaseSpec, FlowBlueprint, Scenario};
use flowtest_core::{Deployment, RunVerdict};

fn platform_flow() -> FlowBlueprint {
    FlowBlueprint::new(4)
        .with_service("platform-pool", &[])
        .with_child("Routing", FlowBlueprint::group().with_service("routing-cache", &[]))
        .with_child("Archive", FlowBlueprint::group())
}

fn case(name: &str) -> CaseSpec {
    CaseSpec::new(name)
        .input("in.txt", "order-1")
        .expected_attribute("route", "eu")
}

#[test]
fn test_aggregate_flow_tests_child_copy() {
    Scenario::new("aggregate_flow_tests_child_copy")
        .with_flow("integration-platform", platform_flow())
        .with_aggregate("integration-platform", "Routing")
        .with_case("integration-platform", case("integration-platform_tc1"))
        .assert_deployment(
            "integration-platform",
            Deployment::Substituted {
                child: "Routing".to_string(),
            },
        )
        .assert_calls_in_order(&[
            "deploy_flow integration-platform",
            "find_process_group Routing",
            "create_template routing",
            "instantiate_template",
            "delete_template",
            "delete_process_group integration-platform",
            "enable_service routing-cache",
            "start_group Routing",
        ])
        .assert_no_call("enable_service platform-pool")
        .assert_passed("integration-platform", "integration-platform_tc1")
        .assert_report_contains("integration-platform", "Deployment: child group 'Routing'")
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_other_flows_deploy_in_full() {
    Scenario::new("other_flows_deploy_in_full")
        .with_flow("integration-platform", platform_flow())
        .with_flow("validate", FlowBlueprint::new(1))
        .with_aggregate("integration-platform", "Routing")
        .with_case("validate", CaseSpec::new("validate_tc1"))
        .assert_deployment("validate", Deployment::Full)
        .assert_no_call("create_template")
        .run()
        .unwrap();
}

#[test]
fn test_missing_child_degrades_to_full_deployment() {
    Scenario::new("missing_child_degrades_to_full_deployment")
        .with_flow("integration-platform", platform_flow())
        .with_aggregate("integration-platform", "Billing")
        .with_case("integration-platform", case("integration-platform_tc1"))
        .assert_degraded("integration-platform")
        .assert_report_contains(
            "integration-platform",
            "Deployment: DEGRADED (process group not found: Billing)",
        )
        .assert_no_call("create_template")
        .assert_call_count("enable_service platform-pool", 1)
        .assert_call_count("enable_service routing-cache", 1)
        .assert_passed("integration-platform", "integration-platform_tc1")
        .assert_verdict(RunVerdict::Success)
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_failed_instantiation_degrades_and_cleans_template() {
    Scenario::new("failed_instantiation_degrades_and_cleans_template")
        .with_flow("integration-platform", platform_flow())
        .with_aggregate("integration-platform", "Routing")
        .with_case("integration-platform", case("integration-platform_tc1"))
        .platform_fails("instantiate_template")
        .assert_degraded("integration-platform")
        .assert_call_count("delete_template", 1)
        .assert_no_call("delete_process_group integration-platform")
        .assert_calls_in_order(&["start_group integration-platform"])
        .assert_completed("integration-platform")
        .assert_canvas_clean()
        .run()
        .unwrap();
}

#[test]
fn test_failed_template_cleanup_discards_child_copy() {
    Scenario::new("failed_template_cleanup_discards_child_copy")
        .with_flow("integration-platform", platform_flow())
        .with_aggregate("integration-platform", "Routing")
        .with_case("integration-platform", case("integration-platform_tc1"))
        .platform_fails("delete_template")
        .assert_degraded("integration-platform")
        .assert_calls_in_order(&[
            "instantiate_template",
            "delete_template",
            "delete_process_group Routing",
            "enable_service platform-pool",
        ])
        .assert_no_call("delete_process_group integration-platform")
        .assert_call_count("enable_service routing-cache", 1)
        .assert_passed("integration-platform", "integration-platform_tc1")
        .run()
        .unwrap();
}
