//! End-to-end module tests
//!
//! Each test runs a registered module through the real Resource Manager
//! client against a wiremock server and checks both the module result and
//! the requests the service received.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rustible_azure::modules::{ModuleError, ModuleRegistry, ModuleStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry() -> ModuleRegistry {
    ModuleRegistry::with_builtins()
}

mod write_module_tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[tokio::test]
    async fn test_create_storage_account_defaults_location_from_group() {
        let server = MockServer::start().await;
        let account = storage_account_path("rg", "sa1");

        Mock::given(method("GET"))
            .and(path(account.clone()))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(arm_error("ResourceNotFound", "nope")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(resource_group_path("rg")))
            .and(query_param("api-version", "2021-04-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "rg",
                "location": "westeurope"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(account.clone()))
            .and(query_param("api-version", "2023-01-01"))
            .and(body_partial_json(json!({
                "location": "westeurope",
                "kind": "StorageV2",
                "sku": {"name": "Standard_LRS"}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(storage_account("rg", "sa1", "Standard_LRS")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_storageaccount",
                &params(json!({
                    "name": "sa1",
                    "resource_group": "rg",
                    "account_type": "Standard_LRS"
                })),
                &context(&server),
            )
            .await
            .unwrap();

        assert!(output.changed);
        assert_eq!(output.status, ModuleStatus::Changed);
        assert_eq!(output.data["action"], json!("create"));
        assert_eq!(output.data["id"], json!(account));
        assert_eq!(output.data["resource"]["sku"]["name"], json!("Standard_LRS"));
    }

    #[tokio::test]
    async fn test_matching_resource_is_left_alone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(storage_account_path("rg", "sa1")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(storage_account("rg", "sa1", "STANDARD_LRS")),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_storageaccount",
                &params(json!({
                    "name": "sa1",
                    "resource_group": "rg",
                    "account_type": "Standard_LRS",
                    "location": "West Europe",
                    "https_only": true,
                    "tags": {"env": "test"}
                })),
                &context(&server),
            )
            .await
            .unwrap();

        assert!(!output.changed);
        assert_eq!(output.data["action"], json!("no_action"));
        assert!(output.data.get("differences").is_none());
    }

    #[tokio::test]
    async fn test_changed_sku_is_patched() {
        let server = MockServer::start().await;
        let account = storage_account_path("rg", "sa1");

        Mock::given(method("GET"))
            .and(path(account.clone()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(storage_account("rg", "sa1", "Standard_LRS")),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(account.clone()))
            .and(body_partial_json(json!({"sku": {"name": "Standard_GRS"}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(storage_account("rg", "sa1", "Standard_GRS")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_storageaccount",
                &params(json!({
                    "name": "sa1",
                    "resource_group": "rg",
                    "account_type": "Standard_GRS"
                })),
                &context(&server),
            )
            .await
            .unwrap();

        assert!(output.changed);
        assert_eq!(output.data["action"], json!("update"));
        assert_eq!(output.data["differences"], json!(["/sku/name"]));
        assert_eq!(output.data["resource"]["sku"]["name"], json!("Standard_GRS"));
    }

    #[tokio::test]
    async fn test_check_mode_never_mutates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(resource_group_path("rg-new")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let context = context(&server).with_check_mode(true).with_diff_mode(true);
        let output = registry()
            .execute(
                "azure_rm_resourcegroup",
                &params(json!({"name": "rg-new", "location": "eastus"})),
                &context,
            )
            .await
            .unwrap();

        assert!(output.changed);
        assert!(output.msg.starts_with("Would create"));
        let diff = output.diff.expect("diff mode renders a diff");
        assert_eq!(diff.before, "{}\n");
        assert!(diff.after.contains("\"eastus\""));
    }

    #[tokio::test]
    async fn test_delete_resource_group_waits_for_completion() {
        let server = MockServer::start().await;
        let group = resource_group_path("rg-old");
        let location = format!("{}/operationresults/delete-rg", server.uri());

        Mock::given(method("GET"))
            .and(path(group.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": group,
                "name": "rg-old",
                "location": "eastus"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(group.clone()))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationresults/delete-rg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_resourcegroup",
                &params(json!({"name": "rg-old", "state": "absent"})),
                &context(&server),
            )
            .await
            .unwrap();

        assert!(output.changed);
        assert_eq!(output.data["action"], json!("delete"));
    }

    #[tokio::test]
    async fn test_absent_resource_needs_no_delete() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_resourcegroup",
                &params(json!({"name": "rg-gone", "state": "absent"})),
                &context(&server),
            )
            .await
            .unwrap();

        assert!(!output.changed);
        assert_eq!(output.data["action"], json!("no_action"));
    }

    #[tokio::test]
    async fn test_unreadable_state_aborts_without_create() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(arm_error("InternalServerError", "oops")),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = registry()
            .execute(
                "azure_rm_resourcegroup",
                &params(json!({"name": "rg1", "location": "eastus"})),
                &context(&server),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::ObservedState(_)));
    }

    #[tokio::test]
    async fn test_unknown_argument_is_rejected_before_any_call() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = registry()
            .execute(
                "azure_rm_resourcegroup",
                &params(json!({"name": "rg1", "colour": "blue"})),
                &context(&server),
            )
            .await
            .unwrap_err();
        match err {
            ModuleError::UnsupportedParameter { names, .. } => assert_eq!(names, "colour"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}

mod info_module_tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[tokio::test]
    async fn test_list_storage_accounts_in_group() {
        let server = MockServer::start().await;
        let collection = storage_accounts_path("rg");
        let next = format!("{}{}?api-version=2023-01-01&$skiptoken=2", server.uri(), collection);

        Mock::given(method("GET"))
            .and(path(collection.clone()))
            .and(query_param("$skiptoken", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [storage_account("rg", "sa3", "Standard_ZRS")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(collection.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    storage_account("rg", "sa1", "Standard_LRS"),
                    storage_account("rg", "sa2", "Standard_GRS")
                ],
                "nextLink": next
            })))
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_storageaccount_info",
                &params(json!({"resource_group": "rg"})),
                &context(&server),
            )
            .await
            .unwrap();

        assert!(!output.changed);
        let names: Vec<&str> = output.data["storageaccounts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["sa1", "sa2", "sa3"]);
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(storage_account_path("rg", "sa1")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(storage_account("rg", "sa1", "Standard_LRS")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_storageaccount_info",
                &params(json!({"resource_group": "rg", "name": "sa1"})),
                &context(&server),
            )
            .await
            .unwrap();

        assert_eq!(output.data["storageaccounts"][0]["name"], json!("sa1"));
    }

    #[tokio::test]
    async fn test_missing_resource_yields_empty_list() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_storageaccount_info",
                &params(json!({"resource_group": "rg", "name": "ghost"})),
                &context(&server),
            )
            .await
            .unwrap();

        assert_eq!(output.data["storageaccounts"], json!([]));
        assert!(output.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_degrades_with_warning() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(arm_error("AuthorizationFailed", "denied")),
            )
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_resourcegroup_info",
                &params(json!({})),
                &context(&server),
            )
            .await
            .unwrap();

        assert_eq!(output.status, ModuleStatus::Ok);
        assert_eq!(output.data["resourcegroups"], json!([]));
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("AuthorizationFailed"));
    }

    #[tokio::test]
    async fn test_filter_and_tags_for_resource_groups() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{}/resourcegroups", SUBSCRIPTION)))
            .and(query_param("$filter", "tagName eq 'env'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"name": "rg-prod", "location": "eastus", "tags": {"env": "prod"}},
                    {"name": "rg-dev", "location": "eastus", "tags": {"env": "dev"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = registry()
            .execute(
                "azure_rm_resourcegroup_info",
                &params(json!({"filter": "tagName eq 'env'", "tags": ["env:dev"]})),
                &context(&server),
            )
            .await
            .unwrap();

        assert_eq!(
            output.data["resourcegroups"],
            json!([{"name": "rg-dev", "location": "eastus", "tags": {"env": "dev"}}])
        );
    }
}
