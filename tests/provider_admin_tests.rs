//! Provider administration against a migrated SQLite database.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use auth_registry::admin::{ProviderAdmin, ToggleOutcome};
use auth_registry::error::AdminError;
use auth_registry::models::auth_provider_row;
use auth_registry::persistence::SeaOrmStore;
use auth_registry::providers::{
    Advisory, AuthenticationProvider, AuthenticationProviderRegistry, ProviderFactory,
    ProviderFactoryRegistry, ProviderInfo, SetupError,
};
use serde_json::json;
use test_utils::setup_test_db_arc;

#[derive(Debug)]
struct StaticProvider {
    info: ProviderInfo,
}

impl AuthenticationProvider for StaticProvider {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

struct FactoryA;

impl ProviderFactory for FactoryA {
    fn alias(&self) -> &str {
        "factoryA"
    }

    fn info(&self) -> &str {
        "Static provider used by the administration tests"
    }

    fn build(
        &self,
        row: &auth_provider_row::Model,
    ) -> Result<Arc<dyn AuthenticationProvider>, SetupError> {
        Ok(Arc::new(StaticProvider {
            info: ProviderInfo::from_row(row),
        }))
    }
}

async fn admin() -> anyhow::Result<ProviderAdmin> {
    let db = setup_test_db_arc().await?;
    let mut factories = ProviderFactoryRegistry::with_defaults();
    factories.register(Arc::new(FactoryA));
    let registry = Arc::new(AuthenticationProviderRegistry::new(Arc::new(factories)));
    Ok(ProviderAdmin::new(Arc::new(SeaOrmStore::new(db)), registry))
}

#[tokio::test]
async fn enable_then_disable_round_trip() -> anyhow::Result<()> {
    let admin = admin().await?;

    admin
        .add_provider(auth_provider_row::Model::new("p1", "factoryA", false))
        .await?;
    assert!(!admin.registry().is_registered("p1"));

    let enabled = admin.set_enabled("p1", "true").await?;
    assert!(matches!(enabled, ToggleOutcome::Enabled(ref o) if !o.replaced));
    assert!(admin.registry().is_registered("p1"));
    assert!(admin.show_provider("p1").await?.enabled);

    match admin.set_enabled("p1", "false").await? {
        ToggleOutcome::Disabled(outcome) => {
            assert!(outcome.was_active);
            assert_eq!(outcome.advisory, Some(Advisory::NoActiveProviders));
        }
        other => panic!("Expected Disabled, got {:?}", other),
    }
    assert!(!admin.registry().is_registered("p1"));

    // Row survives disable
    assert!(!admin.show_provider("p1").await?.enabled);
    Ok(())
}

#[tokio::test]
async fn adding_an_enabled_row_activates_it() -> anyhow::Result<()> {
    let admin = admin().await?;

    let row = auth_provider_row::Model::new("campus", "shib", true)
        .with_title("Campus login")
        .with_config(json!({ "entity_id": "https://idp.example.edu/shibboleth" }));
    admin.add_provider(row).await?;

    let live = admin.registry().get("campus").expect("provider is active");
    assert_eq!(live.info().title, "Campus login");
    Ok(())
}

#[tokio::test]
async fn re_adding_a_row_replaces_it() -> anyhow::Result<()> {
    let admin = admin().await?;

    admin
        .add_provider(auth_provider_row::Model::new("p1", "factoryA", true))
        .await?;
    admin
        .add_provider(auth_provider_row::Model::new("p1", "factoryA", true).with_title("Renamed"))
        .await?;

    let rows = admin.list_providers().await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Renamed");
    assert_eq!(admin.registry().list_active_ids().len(), 1);
    assert_eq!(admin.registry().get("p1").unwrap().info().title, "Renamed");
    Ok(())
}

#[tokio::test]
async fn replacing_an_active_row_with_a_disabled_one_deactivates_it() -> anyhow::Result<()> {
    let admin = admin().await?;

    let first = admin
        .add_provider(auth_provider_row::Model::new("campus", "shib", true))
        .await?;
    assert!(matches!(first.activation, ToggleOutcome::Enabled(_)));
    assert!(admin.registry().is_registered("campus"));

    let second = admin
        .add_provider(auth_provider_row::Model::new("campus", "shib", false))
        .await?;
    assert!(!second.provider.enabled);
    match second.activation {
        ToggleOutcome::Disabled(outcome) => {
            assert!(outcome.was_active);
            assert_eq!(outcome.advisory, Some(Advisory::NoActiveProviders));
        }
        other => panic!("Expected Disabled, got {:?}", other),
    }
    assert!(!admin.registry().is_registered("campus"));
    assert!(!admin.show_provider("campus").await?.enabled);
    Ok(())
}

#[tokio::test]
async fn setup_failure_keeps_row_but_not_provider() -> anyhow::Result<()> {
    let admin = admin().await?;

    let row = auth_provider_row::Model::new("broken", "shib", true)
        .with_config(json!({ "entity_id": 17 }));
    let err = admin.add_provider(row).await.unwrap_err();

    assert!(matches!(err, AdminError::Setup { ref provider_id, .. } if provider_id == "broken"));
    assert!(!admin.registry().is_registered("broken"));
    assert!(admin.show_provider("broken").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn set_enabled_rejects_non_boolean_body() -> anyhow::Result<()> {
    let admin = admin().await?;
    admin
        .add_provider(auth_provider_row::Model::new("p1", "factoryA", false))
        .await?;

    let err = admin.set_enabled("p1", "maybe").await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidInput { .. }));
    assert!(err.to_string().contains("maybe"));
    assert!(!admin.show_provider("p1").await?.enabled);
    Ok(())
}

#[tokio::test]
async fn set_enabled_on_unknown_provider_is_not_found() -> anyhow::Result<()> {
    let admin = admin().await?;
    let err = admin.set_enabled("nope", "yes").await.unwrap_err();
    assert!(matches!(err, AdminError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn delete_removes_row_and_live_instance() -> anyhow::Result<()> {
    let admin = admin().await?;
    admin
        .add_provider(auth_provider_row::Model::new("p1", "factoryA", true))
        .await?;
    admin
        .add_provider(auth_provider_row::Model::new("p2", "factoryA", true))
        .await?;

    let outcome = admin.delete_provider("p1").await?;
    assert!(outcome.was_active);
    assert_eq!(outcome.advisory, None);
    assert!(!admin.registry().is_registered("p1"));
    assert!(matches!(
        admin.show_provider("p1").await,
        Err(AdminError::NotFound { .. })
    ));

    let last = admin.delete_provider("p2").await?;
    assert_eq!(last.advisory, Some(Advisory::NoActiveProviders));

    // Deleting again is harmless
    let again = admin.delete_provider("p2").await?;
    assert!(!again.was_active);
    Ok(())
}

#[tokio::test]
async fn activate_enabled_skips_rows_that_cannot_be_built() -> anyhow::Result<()> {
    let admin = admin().await?;
    for row in [
        auth_provider_row::Model::new("a", "factoryA", true),
        auth_provider_row::Model::new("b", "factoryA", false),
        auth_provider_row::Model::new("c", "retired", false),
    ] {
        admin.add_provider(row).await?;
    }
    let mut unknown = admin.show_provider("c").await?;
    unknown.enabled = true;
    // Stored even though activation fails
    assert!(matches!(
        admin.add_provider(unknown).await,
        Err(AdminError::FactoryNotFound { .. })
    ));

    admin.registry().deregister("a");
    let report = admin.activate_enabled().await?;

    assert_eq!(report.activated, vec!["a".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "c");
    assert!(report.failed[0].1.contains("retired"));
    assert!(!admin.registry().is_registered("b"));
    Ok(())
}

#[tokio::test]
async fn factories_are_listed_by_alias() -> anyhow::Result<()> {
    let admin = admin().await?;
    let aliases: Vec<_> = admin
        .list_factories()
        .into_iter()
        .map(|info| info.alias)
        .collect();
    assert_eq!(aliases, vec!["builtin", "factoryA", "shib"]);
    Ok(())
}

#[tokio::test]
async fn active_providers_report_local_update_capabilities() -> anyhow::Result<()> {
    let admin = admin().await?;
    for row in [
        auth_provider_row::Model::new("builtin", "builtin", true).with_title("Username/Email"),
        auth_provider_row::Model::new("p1", "factoryA", true),
        auth_provider_row::Model::new("p2", "factoryA", false),
    ] {
        admin.add_provider(row).await?;
    }

    let active = admin.list_active();
    let ids: Vec<_> = active.iter().map(|p| p.info.id.as_str()).collect();
    assert_eq!(ids, vec!["builtin", "p1"]);
    assert!(active[0].password_update_allowed);
    assert!(active[0].user_info_update_allowed);
    assert!(!active[1].password_update_allowed);

    let json = serde_json::to_value(&active[0])?;
    assert_eq!(json["title"], "Username/Email");
    Ok(())
}
