//! Built-in resource definitions.

use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::error;

use super::definition::{
    DefinitionError, DispatchRule, LocationPolicy, ResourceDefinition, UpdateMethod,
};
use super::schema::{ArgSpec, ArgType, FieldPolicy};

static CATALOG: Lazy<Vec<Arc<ResourceDefinition>>> = Lazy::new(|| {
    [
        resource_group(),
        storage_account(),
        virtual_network(),
        sql_server(),
        sql_database(),
        dns_zone(),
    ]
    .into_iter()
    .filter_map(|definition| match definition {
        Ok(definition) => Some(Arc::new(definition)),
        Err(e) => {
            error!("Skipping invalid resource definition: {}", e);
            None
        }
    })
    .collect()
});

/// All built-in definitions.
pub fn builtins() -> &'static [Arc<ResourceDefinition>] {
    &CATALOG
}

/// Definition behind a write or info module name.
pub fn find(module_name: &str) -> Option<Arc<ResourceDefinition>> {
    let base = module_name.strip_suffix("_info").unwrap_or(module_name);
    CATALOG.iter().find(|d| d.module_name == base).cloned()
}

const SUBSCRIPTION: &str = "/subscriptions/{subscription_id}";
const GROUP: &str = "/subscriptions/{subscription_id}/resourceGroups/{resource_group}";

fn resource_group() -> Result<ResourceDefinition, DefinitionError> {
    let item = "/subscriptions/{subscription_id}/resourcegroups/{name}";
    ResourceDefinition::builder("azure_rm_resourcegroup", "Microsoft.Resources/resourceGroups", "2021-04-01", item)
        .describe("Manage Azure resource groups")
        .info_key("resourcegroups")
        .arg(
            ArgSpec::new("managed_by", ArgType::Str)
                .body("/managedBy")
                .policy(FieldPolicy::create_only())
                .describe("Id of the resource that manages this resource group."),
        )
        .rule(DispatchRule::get(item))
        .rule(DispatchRule::list(&format!("{}/resourcegroups", SUBSCRIPTION)).filterable())
        .build()
}

fn storage_account() -> Result<ResourceDefinition, DefinitionError> {
    let collection = "/providers/Microsoft.Storage/storageAccounts";
    let item = format!("{}{}/{{name}}", GROUP, collection);
    ResourceDefinition::builder("azure_rm_storageaccount", "Microsoft.Storage/storageAccounts", "2023-01-01", &item)
        .describe("Manage Azure storage accounts")
        .info_key("storageaccounts")
        .location(LocationPolicy::ResourceGroup)
        .update_method(UpdateMethod::Patch)
        .arg(
            ArgSpec::new(
                "account_type",
                ArgType::choice([
                    "Premium_LRS",
                    "Premium_ZRS",
                    "Standard_GRS",
                    "Standard_GZRS",
                    "Standard_LRS",
                    "Standard_RAGRS",
                    "Standard_RAGZRS",
                    "Standard_ZRS",
                ]),
            )
            .alias("type")
            .body("/sku/name")
            .policy(FieldPolicy::case_insensitive())
            .describe("Type of storage account. Required when creating."),
        )
        .arg(
            ArgSpec::new(
                "kind",
                ArgType::choice(["Storage", "StorageV2", "BlobStorage", "FileStorage", "BlockBlobStorage"]),
            )
            .default_value("StorageV2")
            .body("/kind")
            .policy(FieldPolicy::create_only())
            .describe("The kind of storage."),
        )
        .arg(
            ArgSpec::new("access_tier", ArgType::choice(["Hot", "Cool"]))
                .property()
                .describe("Access tier for blob storage accounts."),
        )
        .arg(
            ArgSpec::new("https_only", ArgType::Bool)
                .body("/properties/supportsHttpsTrafficOnly")
                .describe("Allow only HTTPS traffic."),
        )
        .arg(
            ArgSpec::new("minimum_tls_version", ArgType::choice(["TLS1_0", "TLS1_1", "TLS1_2"]))
                .property()
                .describe("Minimum TLS version for requests."),
        )
        .arg(
            ArgSpec::new("allow_blob_public_access", ArgType::Bool)
                .property()
                .describe("Allow anonymous access to blobs."),
        )
        .arg(
            ArgSpec::new("is_hns_enabled", ArgType::Bool)
                .property()
                .policy(FieldPolicy::create_only())
                .describe("Enable the hierarchical namespace."),
        )
        .rule(DispatchRule::get(&item))
        .rule(DispatchRule::list(&format!("{}{}", GROUP, collection)))
        .rule(DispatchRule::list(&format!("{}{}", SUBSCRIPTION, collection)))
        .build()
}

fn virtual_network() -> Result<ResourceDefinition, DefinitionError> {
    let collection = "/providers/Microsoft.Network/virtualNetworks";
    let item = format!("{}{}/{{name}}", GROUP, collection);
    ResourceDefinition::builder("azure_rm_virtualnetwork", "Microsoft.Network/virtualNetworks", "2023-05-01", &item)
        .describe("Manage Azure virtual networks")
        .info_key("virtualnetworks")
        .location(LocationPolicy::ResourceGroup)
        .arg(
            ArgSpec::new("address_prefixes_cidr", ArgType::list_of(ArgType::Str))
                .alias("address_prefixes")
                .body("/properties/addressSpace/addressPrefixes")
                .describe("Address spaces in CIDR notation."),
        )
        .arg(
            ArgSpec::new("dns_servers", ArgType::list_of(ArgType::Str))
                .body("/properties/dhcpOptions/dnsServers")
                .describe("Custom DNS servers."),
        )
        .arg(
            ArgSpec::new(
                "subnets",
                ArgType::list_of(ArgType::Group(vec![
                    ArgSpec::new("name", ArgType::Str).required(),
                    ArgSpec::new("address_prefix", ArgType::Str)
                        .required()
                        .body("properties/*"),
                ])),
            )
            .property()
            .describe("Subnets declared inline with the network."),
        )
        .rule(DispatchRule::get(&item))
        .rule(DispatchRule::list(&format!("{}{}", GROUP, collection)))
        .rule(DispatchRule::list(&format!("{}{}", SUBSCRIPTION, collection)))
        .build()
}

fn sql_server() -> Result<ResourceDefinition, DefinitionError> {
    let collection = "/providers/Microsoft.Sql/servers";
    let item = format!("{}{}/{{name}}", GROUP, collection);
    ResourceDefinition::builder("azure_rm_sqlserver", "Microsoft.Sql/servers", "2021-11-01", &item)
        .describe("Manage Azure SQL logical servers")
        .info_key("servers")
        .location(LocationPolicy::ResourceGroup)
        .arg(
            ArgSpec::new("admin_username", ArgType::Str)
                .body("/properties/administratorLogin")
                .policy(FieldPolicy::create_only())
                .describe("Administrator login name. Cannot be changed after creation."),
        )
        .arg(
            ArgSpec::new("admin_password", ArgType::Str)
                .body("/properties/administratorLoginPassword")
                .no_log()
                .policy(FieldPolicy::ignore())
                .describe("Administrator login password."),
        )
        .arg(
            ArgSpec::new("version", ArgType::Str)
                .default_value("12.0")
                .property()
                .policy(FieldPolicy::create_only())
                .describe("Server version."),
        )
        .arg(
            ArgSpec::new("minimal_tls_version", ArgType::choice(["1.0", "1.1", "1.2"]))
                .property()
                .describe("Minimal TLS version for connections."),
        )
        .arg(
            ArgSpec::new("public_network_access", ArgType::choice(["Enabled", "Disabled"]))
                .property()
                .describe("Whether the server accepts connections from public networks."),
        )
        .rule(DispatchRule::get(&item))
        .rule(DispatchRule::list(&format!("{}{}", GROUP, collection)))
        .rule(DispatchRule::list(&format!("{}{}", SUBSCRIPTION, collection)))
        .build()
}

fn sql_database() -> Result<ResourceDefinition, DefinitionError> {
    let collection = format!("{}/providers/Microsoft.Sql/servers/{{server_name}}/databases", GROUP);
    let item = format!("{}/{{name}}", collection);
    ResourceDefinition::builder("azure_rm_sqldatabase", "Microsoft.Sql/servers/databases", "2021-11-01", &item)
        .describe("Manage Azure SQL databases")
        .info_key("databases")
        .location(LocationPolicy::ResourceGroup)
        .arg(
            ArgSpec::new(
                "sku",
                ArgType::Group(vec![
                    ArgSpec::new("name", ArgType::Str)
                        .required()
                        .policy(FieldPolicy::case_insensitive()),
                    ArgSpec::new("tier", ArgType::Str).policy(FieldPolicy::case_insensitive()),
                    ArgSpec::new("capacity", ArgType::Int),
                ]),
            )
            .body("/sku")
            .describe("Database SKU."),
        )
        .arg(
            ArgSpec::new("collation", ArgType::Str)
                .property()
                .policy(FieldPolicy::create_only())
                .describe("Database collation."),
        )
        .arg(
            ArgSpec::new("max_size_bytes", ArgType::Int)
                .property()
                .describe("Maximum database size in bytes."),
        )
        .arg(
            ArgSpec::new("zone_redundant", ArgType::Bool)
                .property()
                .describe("Spread replicas across availability zones."),
        )
        .arg(
            ArgSpec::new("read_scale", ArgType::choice(["Enabled", "Disabled"]))
                .property()
                .policy(FieldPolicy::update_only())
                .describe("Route read-only connections to a secondary replica. Applied once the database exists."),
        )
        .arg(
            ArgSpec::new(
                "create_mode",
                ArgType::choice(["Default", "Copy", "Secondary", "PointInTimeRestore", "Restore"]),
            )
            .property()
            .policy(FieldPolicy::ignore())
            .describe("How the database is created."),
        )
        .arg(
            ArgSpec::new("source_database_id", ArgType::Str)
                .property()
                .policy(FieldPolicy::ignore())
                .describe("Source database id for copy and restore."),
        )
        .rule(DispatchRule::get(&item))
        .rule(DispatchRule::list(&collection))
        .build()
}

fn dns_zone() -> Result<ResourceDefinition, DefinitionError> {
    let collection = "/providers/Microsoft.Network/dnsZones";
    let item = format!("{}{}/{{name}}", GROUP, collection);
    ResourceDefinition::builder("azure_rm_dnszone", "Microsoft.Network/dnsZones", "2018-05-01", &item)
        .describe("Manage Azure DNS zones")
        .info_key("dnszones")
        .location(LocationPolicy::Fixed("global"))
        .update_method(UpdateMethod::Patch)
        .arg(
            ArgSpec::new("type", ArgType::choice(["Public", "Private"]))
                .body("/properties/zoneType")
                .policy(FieldPolicy::create_only())
                .describe("Zone visibility."),
        )
        .rule(DispatchRule::get(&item))
        .rule(DispatchRule::list(&format!("{}{}", GROUP, collection)))
        .rule(DispatchRule::list(&format!("{}{}", SUBSCRIPTION, collection)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_definition_builds() {
        for definition in [
            resource_group(),
            storage_account(),
            virtual_network(),
            sql_server(),
            sql_database(),
            dns_zone(),
        ] {
            assert!(definition.is_ok(), "{:?}", definition.err());
        }
        assert_eq!(builtins().len(), 6);
    }

    #[test]
    fn test_find_by_write_or_info_name() {
        assert_eq!(
            find("azure_rm_storageaccount").unwrap().api_version,
            "2023-01-01"
        );
        assert_eq!(find("azure_rm_sqldatabase_info").unwrap().info_key, "databases");
        assert!(find("azure_rm_webapp").is_none());
    }

    #[test]
    fn test_database_has_parent_argument() {
        let definition = find("azure_rm_sqldatabase").unwrap();
        assert!(definition.schema.get("server_name").unwrap().required);
        assert!(definition.info_schema.get("server_name").is_some());
    }

    #[test]
    fn test_dns_zone_location_defaults_to_global() {
        let definition = find("azure_rm_dnszone").unwrap();
        assert_eq!(
            definition.schema.get("location").unwrap().default,
            Some(serde_json::json!("global"))
        );
    }

    #[test]
    fn test_admin_password_is_secret() {
        let definition = find("azure_rm_sqlserver").unwrap();
        assert!(definition
            .policies
            .is_secret("/properties/administratorLoginPassword"));
    }
}
