//! Property-based tests using proptest
//!
//! Attribute sets for every payload variant survive the trip to the wire and
//! back: build the payload, serialize it, decode it as the API would return
//! it, and write it back into a fresh attribute set.

use proptest::prelude::*;
use remote_resource_provider::adapter::{EntityMapping, ResourceMapping};
use remote_resource_provider::attributes::{AttributeSet, ToAttributes};
use remote_resource_provider::resources::cloud_configuration::{
    CloudConfiguration, CloudConfigurationPayload, CloudConfigurationResource, CloudProvider,
};
use remote_resource_provider::resources::credentials::{
    CredentialKind, CredentialsPayload, CredentialsResource,
};
use remote_resource_provider::testing::Materialize;
use serde_json::{json, Value};

/// Generate AWS cost export attributes; `prefix` is omitted when empty.
fn arb_aws() -> impl Strategy<Value = Value> {
    (
        "[a-z][a-z0-9-]{0,30}",                                  // name
        "[0-9]{12}",                                             // account id
        "[a-z][a-z0-9.-]{2,40}",                                 // bucket
        prop::collection::vec("[a-z]{2}-[a-z]{4,9}-[1-3]", 1..5), // regions
        prop_oneof![Just(String::new()), "[a-z0-9/]{1,16}"],
    )
        .prop_map(|(name, account_id, bucket_name, regions, prefix)| {
            let mut attrs = json!({
                "name": name,
                "account_id": account_id,
                "bucket_name": bucket_name,
                "regions": regions,
            });
            if !prefix.is_empty() {
                attrs["prefix"] = json!(prefix);
            }
            attrs
        })
}

fn arb_azure() -> impl Strategy<Value = Value> {
    (
        "[a-z][a-z0-9-]{0,30}",
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        "[0-9a-f]{32}",
    )
        .prop_map(|(name, tenant_id, client_id, workspace_id)| {
            json!({
                "name": name,
                "tenant_id": tenant_id,
                "client_id": client_id,
                "log_analytics_workspace_id": workspace_id,
            })
        })
}

fn arb_gcp() -> impl Strategy<Value = Value> {
    ("[a-z][a-z0-9-]{0,30}", "[a-z][a-z0-9-]{5,29}", "\\PC{1,200}").prop_map(
        |(name, project_id, file_content)| {
            json!({
                "name": name,
                "gcp_project_id": project_id,
                "credential_configuration_file_content": file_content,
            })
        },
    )
}

fn arb_assumed_role() -> impl Strategy<Value = Value> {
    (
        "[a-z][a-z0-9-]{0,30}",
        "arn:aws:iam::[0-9]{12}:role/[A-Za-z0-9+=,.@_-]{1,40}",
        900i64..43_200,
    )
        .prop_map(|(name, arn, duration)| json!({"name": name, "arn": arn, "duration": duration}))
}

fn arb_service_account() -> impl Strategy<Value = Value> {
    (
        "[a-z][a-z0-9-]{0,30}",
        prop::option::of("[a-z][a-z0-9-]{5,29}"),
        "\\PC{1,200}",
    )
        .prop_map(|(name, project_id, key)| {
            let mut attrs = json!({"name": name, "service_account_key": key});
            if let Some(project_id) = project_id {
                attrs["project_id"] = json!(project_id);
            }
            attrs
        })
}

fn arb_access_keys() -> impl Strategy<Value = Value> {
    ("[a-z][a-z0-9-]{0,30}", "AKIA[A-Z0-9]{16}", "[A-Za-z0-9/+]{40}").prop_map(
        |(name, access_key_id, secret_access_key)| {
            json!({
                "name": name,
                "access_key_id": access_key_id,
                "secret_access_key": secret_access_key,
            })
        },
    )
}

fn arb_service_principal() -> impl Strategy<Value = Value> {
    let uuid = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";
    ("[a-z][a-z0-9-]{0,30}", uuid, "\\PC{1,64}", uuid, uuid).prop_map(
        |(name, client_id, client_secret, subscription_id, tenant_id)| {
            json!({
                "name": name,
                "client_id": client_id,
                "client_secret": client_secret,
                "subscription_id": subscription_id,
                "tenant_id": tenant_id,
            })
        },
    )
}

fn cloud_round_trip(provider: CloudProvider, input: &Value) -> Value {
    let mapping = CloudConfigurationResource::new(provider);
    let attrs = AttributeSet::from_value(input.clone()).unwrap();

    let payload = mapping.to_payload(&attrs).unwrap();
    let wire = serde_json::to_string(&payload).unwrap();
    let decoded: CloudConfigurationPayload = serde_json::from_str(&wire).unwrap();
    let entity = CloudConfiguration::materialize("cc-1", &decoded, None);

    let mut state = AttributeSet::new();
    mapping.write_entity(&entity, &mut state).unwrap();
    state.remove("health");
    state.into_value()
}

fn credentials_round_trip(kind: CredentialKind, input: &Value) -> Value {
    let mapping = CredentialsResource::new(kind);
    let attrs = AttributeSet::from_value(input.clone()).unwrap();

    let payload = mapping.to_payload(&attrs).unwrap();
    let wire = serde_json::to_value(&payload).unwrap();
    assert_eq!(wire["type"], kind.as_str());
    let decoded: CredentialsPayload = serde_json::from_value(wire).unwrap();
    assert_eq!(decoded.value.kind(), kind);

    let mut state = AttributeSet::new().with("name", decoded.name.clone());
    decoded.value.to_attributes(&mut state);
    state.into_value()
}

proptest! {
    #[test]
    fn test_aws_configuration_round_trip(input in arb_aws()) {
        prop_assert_eq!(cloud_round_trip(CloudProvider::Aws, &input), input);
    }

    #[test]
    fn test_azure_configuration_round_trip(input in arb_azure()) {
        prop_assert_eq!(cloud_round_trip(CloudProvider::Azure, &input), input);
    }

    #[test]
    fn test_gcp_configuration_round_trip(input in arb_gcp()) {
        prop_assert_eq!(cloud_round_trip(CloudProvider::Gcp, &input), input);
    }

    #[test]
    fn test_assumed_role_round_trip(input in arb_assumed_role()) {
        prop_assert_eq!(credentials_round_trip(CredentialKind::AwsAssumedRole, &input), input);
    }

    #[test]
    fn test_service_account_round_trip(input in arb_service_account()) {
        prop_assert_eq!(credentials_round_trip(CredentialKind::GcpServiceAccount, &input), input);
    }

    #[test]
    fn test_access_keys_round_trip(input in arb_access_keys()) {
        prop_assert_eq!(credentials_round_trip(CredentialKind::AwsAccessKeys, &input), input);
    }

    #[test]
    fn test_service_principal_round_trip(input in arb_service_principal()) {
        prop_assert_eq!(
            credentials_round_trip(CredentialKind::AzureServicePrincipal, &input),
            input
        );
    }

    #[test]
    fn test_provider_tag_is_uppercase_on_the_wire(input in arb_azure()) {
        let attrs = AttributeSet::from_value(input).unwrap();
        let payload = CloudConfigurationResource::new(CloudProvider::Azure)
            .to_payload(&attrs)
            .unwrap();
        let wire = serde_json::to_value(&payload).unwrap();
        prop_assert_eq!(&wire["provider"], "AZURE");
        prop_assert!(wire["configuration"]["logAnalyticsWorkspaceId"].is_string());
    }

    #[test]
    fn test_unknown_credential_type_is_unhandled(raw in "[A-Z]{3,12}_[A-Z]{3,12}X") {
        let err = CredentialKind::parse(&raw).unwrap_err();
        prop_assert!(err.to_string().contains(&raw));
    }
}

#[test]
fn test_assumed_role_duration_defaults_on_the_wire() {
    let attrs = AttributeSet::new()
        .with("name", "ci")
        .with("arn", "arn:aws:iam::123456789012:role/ci");
    let payload = CredentialsResource::new(CredentialKind::AwsAssumedRole)
        .to_payload(&attrs)
        .unwrap();
    let wire = serde_json::to_value(&payload).unwrap();
    assert_eq!(wire["value"]["duration"], 3600);
    assert_eq!(wire["value"]["roleArn"], "arn:aws:iam::123456789012:role/ci");
}
