//! Cloud Controller creator
//!
//! [`ResourceCreator`] over the write side of the adapter. Payloads are built
//! from the substituted attributes of each entity; stacks, users and domains
//! are resolved by name in the target installation.

use super::plan::ResourceKind;
use super::restore::{ResolvedEntity, ResourceCreator};
use crate::cc::{CcWriteApi, WriteMethod};
use crate::error::{BackupError, Result};
use crate::resource::{fetcher, json};
use serde_json::{Map, Value};
use std::collections::HashMap;

const QUOTA_FIELDS: &[&str] = &[
    "name",
    "non_basic_services_allowed",
    "total_services",
    "total_service_keys",
    "total_routes",
    "total_reserved_route_ports",
    "total_private_domains",
    "memory_limit",
    "instance_memory_limit",
    "app_instance_limit",
    "app_task_limit",
];

const APP_FIELDS: &[&str] = &[
    "name",
    "diego",
    "memory",
    "instances",
    "disk_quota",
    "command",
    "buildpack",
    "health_check_type",
    "health_check_timeout",
    "health_check_http_endpoint",
    "enable_ssh",
    "docker_image",
    "environment_json",
];

pub struct CcCreator<'a, A: CcWriteApi> {
    api: &'a A,
    /// username -> guid in the target, loaded on first role step
    users: Option<HashMap<String, String>>,
}

impl<'a, A: CcWriteApi> CcCreator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api, users: None }
    }

    async fn post(&self, entity: &ResolvedEntity, path: &str, body: Value, check: &str) -> Result<String> {
        let response = self.api.invoke_write(WriteMethod::Post, path, Some(&body)).await?;
        let value = check_result(&describe(entity), &response, Some((check, entity_check_value(entity, &body, check))))?;
        new_guid(&describe(entity), &value)
    }

    async fn put(&self, entity: &ResolvedEntity, path: &str) -> Result<()> {
        let response = self.api.invoke_write(WriteMethod::Put, path, None).await?;
        check_result(&describe(entity), &response, None)?;
        Ok(())
    }

    /// Guid of the resource named `name` in `/v2/<collection>`
    async fn find_by_name(&self, collection: &str, name: &str) -> Result<Option<String>> {
        let path = format!("/v2/{collection}?q=name:{}", urlencoding::encode(name));
        let found = fetcher::fetch_all(self.api, &path).await?;
        Ok(found
            .resources
            .iter()
            .find(|r| json::opt_str(&r.entity, "name") == Some(name))
            .and_then(|r| json::opt_str(&r.metadata, "guid"))
            .map(str::to_string))
    }

    /// Delete a same-named resource so the snapshot's definition wins
    async fn replace_existing(&self, collection: &str, name: &str) -> Result<()> {
        if let Some(guid) = self.find_by_name(collection, name).await? {
            tracing::info!("Deleting old {} {}", collection, name);
            self.api
                .invoke_write(WriteMethod::Delete, &format!("/v2/{collection}/{guid}"), None)
                .await?;
        }
        Ok(())
    }

    async fn user_guid(&mut self, username: &str) -> Result<Option<String>> {
        if self.users.is_none() {
            let listed = fetcher::fetch_all(self.api, "/v2/users").await?;
            let users = listed
                .resources
                .iter()
                .filter_map(|r| {
                    let name = json::opt_str(&r.entity, "username")?;
                    let guid = json::opt_str(&r.metadata, "guid")?;
                    Some((name.to_string(), guid.to_string()))
                })
                .collect();
            self.users = Some(users);
        }
        Ok(self
            .users
            .as_ref()
            .and_then(|users| users.get(username))
            .cloned())
    }

    async fn assign_role(&mut self, entity: &ResolvedEntity, associations: &[&str]) -> Result<()> {
        let owner_guid = owner(entity)?;
        let username = entity
            .attributes
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or(&entity.name)
            .to_string();
        let Some(user) = self.user_guid(&username).await? else {
            return Err(BackupError::mismatch(describe(entity), format!("could not find user {username}")));
        };
        for association in associations {
            self.put(entity, &format!("/v2/users/{user}/{association}/{owner_guid}")).await?;
        }
        Ok(())
    }

    async fn create_app(&self, entity: &ResolvedEntity) -> Result<String> {
        let mut body = pick(&entity.attributes, APP_FIELDS);
        body.insert("space_guid".to_string(), Value::String(owner(entity)?.to_string()));
        if let Some(ports) = entity.attributes.get("ports").filter(|p| p.as_array().is_some_and(|a| !a.is_empty())) {
            body.insert("ports".to_string(), ports.clone());
        }

        // docker apps carry no stack
        if !body.contains_key("docker_image") {
            let stack_name = entity.hints.get("stack_name").and_then(Value::as_str);
            if let Some(stack_name) = stack_name {
                let Some(stack) = self.find_by_name("stacks", stack_name).await? else {
                    return Err(BackupError::mismatch(describe(entity), format!("stack {stack_name} not found")));
                };
                body.insert("stack_guid".to_string(), Value::String(stack));
            }
        }

        self.post(entity, "/v2/apps", Value::Object(body), "name").await
    }

    async fn create_route(&self, entity: &ResolvedEntity) -> Result<String> {
        let app = owner(entity)?;
        let route = match &entity.existing_guid {
            Some(route) => route.clone(),
            None => {
                let mut body = pick(&entity.attributes, &["host", "path", "port", "space_guid"]);
                body.insert("domain_guid".to_string(), Value::String(self.route_domain(entity).await?));
                self.post(entity, "/v2/routes", Value::Object(body), "host").await?
            }
        };
        tracing::info!("Binding route {} to app {}", entity.name, app);
        self.put(entity, &format!("/v2/apps/{app}/routes/{route}")).await?;
        Ok(route)
    }

    async fn route_domain(&self, entity: &ResolvedEntity) -> Result<String> {
        let name = entity.hints.get("domain_name").and_then(Value::as_str);
        let shared = entity
            .hints
            .get("domain_shared")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let found = match name {
            Some(name) if shared => self.find_by_name("shared_domains", name).await?,
            Some(name) => self.find_by_name("private_domains", name).await?,
            None => None,
        };
        found
            .or_else(|| entity.attributes.get("domain_guid").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| {
                BackupError::mismatch(describe(entity), format!("could not find domain {}", name.unwrap_or("-")))
            })
    }

    async fn set_flag(&self, entity: &ResolvedEntity) -> Result<()> {
        let enabled = entity.attributes.get("enabled").cloned().unwrap_or(Value::Bool(false));
        let body = serde_json::json!({ "enabled": enabled });
        let path = format!("/v2/config/feature_flags/{}", urlencoding::encode(&entity.name));
        let response = self.api.invoke_write(WriteMethod::Put, &path, Some(&body)).await?;
        let value = check_result(&describe(entity), &response, None)?;
        match value.get("name").and_then(Value::as_str) {
            Some(name) if name == entity.name => Ok(()),
            Some(name) => Err(BackupError::mismatch(
                describe(entity),
                format!("name {name} does not match requested name {}", entity.name),
            )),
            None => Err(BackupError::mismatch(describe(entity), "unknown answer received")),
        }
    }
}

impl<A: CcWriteApi> ResourceCreator for CcCreator<'_, A> {
    async fn create(&mut self, entity: &ResolvedEntity) -> Result<Option<String>> {
        if entity.kind != ResourceKind::Route {
            if let Some(existing) = &entity.existing_guid {
                tracing::debug!("{} already restored as {}", describe(entity), existing);
                return Ok(Some(existing.clone()));
            }
        }

        let attrs = &entity.attributes;
        let guid = match entity.kind {
            ResourceKind::SharedDomain => {
                let body = pick(attrs, &["name", "router_group_guid", "internal"]);
                self.post(entity, "/v2/shared_domains", Value::Object(body), "name").await?
            }
            ResourceKind::FeatureFlag => {
                self.set_flag(entity).await?;
                return Ok(None);
            }
            ResourceKind::OrgQuota => {
                self.replace_existing("quota_definitions", &entity.name).await?;
                let body = pick(attrs, QUOTA_FIELDS);
                self.post(entity, "/v2/quota_definitions", Value::Object(body), "name").await?
            }
            ResourceKind::Organization => {
                let body = pick(attrs, &["name", "status", "quota_definition_guid"]);
                self.post(entity, "/v2/organizations", Value::Object(body), "name").await?
            }
            ResourceKind::OrgRole(role) => {
                self.assign_role(entity, &["organizations", role.association()]).await?;
                return Ok(None);
            }
            ResourceKind::PrivateDomain => {
                let mut body = pick(attrs, &["name"]);
                body.insert("owning_organization_guid".to_string(), Value::String(owner(entity)?.to_string()));
                self.post(entity, "/v2/private_domains", Value::Object(body), "name").await?
            }
            ResourceKind::SpaceQuota => {
                self.replace_existing("space_quota_definitions", &entity.name).await?;
                let mut body = pick(attrs, QUOTA_FIELDS);
                body.insert("organization_guid".to_string(), Value::String(owner(entity)?.to_string()));
                self.post(entity, "/v2/space_quota_definitions", Value::Object(body), "name").await?
            }
            ResourceKind::Space => {
                let mut body = pick(attrs, &["name", "allow_ssh", "space_quota_definition_guid"]);
                body.insert("organization_guid".to_string(), Value::String(owner(entity)?.to_string()));
                self.post(entity, "/v2/spaces", Value::Object(body), "name").await?
            }
            ResourceKind::SpaceRole(role) => {
                self.assign_role(entity, &[role.association()]).await?;
                return Ok(None);
            }
            ResourceKind::App => self.create_app(entity).await?,
            ResourceKind::Route => self.create_route(entity).await?,
            ResourceKind::SecurityGroup => {
                self.replace_existing("security_groups", &entity.name).await?;
                let mut body = pick(attrs, &["name", "rules", "running_default", "staging_default"]);
                let spaces = entity.hints.get("space_guids").cloned().unwrap_or(Value::Array(Vec::new()));
                body.insert("space_guids".to_string(), spaces);
                self.post(entity, "/v2/security_groups", Value::Object(body), "name").await?
            }
        };
        Ok(Some(guid))
    }
}

/// Validate a write response
///
/// An empty body, a body carrying `error_code`, or an entity whose `field`
/// differs from the expected value is a [`BackupError::ReplayMismatch`].
pub fn check_result(resource: &str, body: &str, expect: Option<(&str, &str)>) -> Result<Value> {
    if body.trim().is_empty() {
        return Err(BackupError::mismatch(resource, "got null response"));
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| BackupError::mismatch(resource, format!("unreadable response: {e}")))?;

    if let Some(code) = value.get("error_code") {
        let description = value.get("description").and_then(Value::as_str).unwrap_or_default();
        return Err(BackupError::mismatch(resource, format!("got {}-{}", display(code), description)));
    }

    if let Some((field, expected)) = expect {
        let Some(entity) = value.get("entity") else {
            return Err(BackupError::mismatch(resource, "unknown answer received"));
        };
        let actual = entity.get(field).and_then(Value::as_str);
        if actual != Some(expected) {
            return Err(BackupError::mismatch(
                resource,
                format!("field {field} is {} but {expected} was requested", actual.unwrap_or("missing")),
            ));
        }
    }

    Ok(value)
}

fn new_guid(resource: &str, value: &Value) -> Result<String> {
    value
        .get("metadata")
        .and_then(|m| m.get("guid"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackupError::mismatch(resource, "response carries no guid"))
}

/// Copy the listed non-null attributes
fn pick(attributes: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| {
            attributes
                .get(*field)
                .filter(|v| !v.is_null())
                .map(|v| (field.to_string(), v.clone()))
        })
        .collect()
}

fn owner(entity: &ResolvedEntity) -> Result<&str> {
    entity
        .owner_guid
        .as_deref()
        .ok_or_else(|| BackupError::mismatch(describe(entity), "owner was not restored"))
}

fn describe(entity: &ResolvedEntity) -> String {
    format!("{} {}", entity.kind, entity.name)
}

fn entity_check_value<'b>(entity: &'b ResolvedEntity, body: &'b Value, field: &str) -> &'b str {
    body.get(field).and_then(Value::as_str).unwrap_or(&entity.name)
}

fn display(value: &Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::plan::OrgRole;
    use crate::cc::mock::MockCcApi;
    use serde_json::json;

    fn entity(kind: ResourceKind, name: &str, attributes: Value) -> ResolvedEntity {
        ResolvedEntity {
            kind,
            old_guid: Some(format!("old-{name}")),
            name: name.to_string(),
            owner_guid: None,
            existing_guid: None,
            attributes: attributes.as_object().cloned().unwrap_or_default(),
            hints: Map::new(),
        }
    }

    fn created(guid: &str, field: &str, value: &str) -> Value {
        json!({"metadata": {"guid": guid, "url": format!("/v2/x/{guid}")}, "entity": {field: value}})
    }

    fn listing(items: Value) -> Value {
        let count = items.as_array().map_or(0, Vec::len);
        json!({"total_results": count, "total_pages": 1, "next_url": null, "resources": items})
    }

    #[test]
    fn test_check_result_rejects_error_code() {
        let err = check_result(
            "space dev",
            r#"{"error_code": "CF-SpaceNameTaken", "description": "name taken"}"#,
            Some(("name", "dev")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("CF-SpaceNameTaken-name taken"));
    }

    #[test]
    fn test_check_result_rejects_name_mismatch_and_empty_body() {
        let body = created("g1", "name", "other").to_string();
        assert!(matches!(
            check_result("space dev", &body, Some(("name", "dev"))),
            Err(BackupError::ReplayMismatch { .. })
        ));
        assert!(check_result("space dev", "  ", None).is_err());
        assert!(check_result("space dev", "{}", None).is_ok());
    }

    #[tokio::test]
    async fn test_space_is_posted_under_new_org() {
        let api = MockCcApi::new().with_write(WriteMethod::Post, "/v2/spaces", &created("new-s1", "name", "dev"));
        let mut creator = CcCreator::new(&api);
        let mut space = entity(
            ResourceKind::Space,
            "dev",
            json!({"name": "dev", "organization_guid": "stale", "allow_ssh": true, "space_quota_definition_guid": null}),
        );
        space.owner_guid = Some("new-o1".to_string());

        let guid = creator.create(&space).await.unwrap();

        assert_eq!(guid.as_deref(), Some("new-s1"));
        let writes = api.writes();
        assert_eq!(
            writes[0].body,
            Some(json!({"name": "dev", "allow_ssh": true, "organization_guid": "new-o1"}))
        );
    }

    #[tokio::test]
    async fn test_org_role_adds_membership_then_role() {
        let api = MockCcApi::new().with_get_json(
            "/v2/users",
            &listing(json!([{"metadata": {"guid": "u9", "url": "/v2/users/u9"}, "entity": {"username": "alice"}}])),
        );
        let mut creator = CcCreator::new(&api);
        let mut role = entity(ResourceKind::OrgRole(OrgRole::Manager), "alice", json!({"username": "alice"}));
        role.owner_guid = Some("o9".to_string());

        assert_eq!(creator.create(&role).await.unwrap(), None);
        assert_eq!(creator.create(&role).await.unwrap(), None);

        let paths: Vec<_> = api.writes().into_iter().map(|w| w.path).collect();
        assert_eq!(
            paths[..2],
            ["/v2/users/u9/organizations/o9", "/v2/users/u9/managed_organizations/o9"]
        );
        assert_eq!(api.calls("/v2/users"), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_a_mismatch() {
        let api = MockCcApi::new().with_get_json("/v2/users", &listing(json!([])));
        let mut creator = CcCreator::new(&api);
        let mut role = entity(ResourceKind::OrgRole(OrgRole::Auditor), "bob", json!({"username": "bob"}));
        role.owner_guid = Some("o9".to_string());

        let err = creator.create(&role).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(api.writes().is_empty());
    }

    #[tokio::test]
    async fn test_app_resolves_stack_by_name() {
        let api = MockCcApi::new()
            .with_get_json(
                "/v2/stacks?q=name:cflinuxfs4",
                &listing(json!([{"metadata": {"guid": "st9", "url": "/v2/stacks/st9"}, "entity": {"name": "cflinuxfs4"}}])),
            )
            .with_write(WriteMethod::Post, "/v2/apps", &created("new-a1", "name", "web"));
        let mut creator = CcCreator::new(&api);
        let mut app = entity(
            ResourceKind::App,
            "web",
            json!({"name": "web", "memory": 256, "state": "STARTED", "docker_image": null, "ports": []}),
        );
        app.owner_guid = Some("new-s1".to_string());
        app.hints.insert("stack_name".to_string(), json!("cflinuxfs4"));

        assert_eq!(creator.create(&app).await.unwrap().as_deref(), Some("new-a1"));
        let body = api.writes()[0].body.clone().unwrap();
        assert_eq!(body["stack_guid"], "st9");
        assert_eq!(body["space_guid"], "new-s1");
        assert!(body.get("state").is_none());
        assert!(body.get("ports").is_none());
    }

    #[tokio::test]
    async fn test_route_is_created_and_bound() {
        let api = MockCcApi::new()
            .with_get_json(
                "/v2/shared_domains?q=name:apps.example.com",
                &listing(json!([{"metadata": {"guid": "d9", "url": "/v2/shared_domains/d9"}, "entity": {"name": "apps.example.com"}}])),
            )
            .with_write(WriteMethod::Post, "/v2/routes", &created("new-r1", "host", "web"));
        let mut creator = CcCreator::new(&api);
        let mut route = entity(ResourceKind::Route, "web", json!({"host": "web", "path": "", "space_guid": "new-s1"}));
        route.owner_guid = Some("new-a1".to_string());
        route.hints.insert("domain_name".to_string(), json!("apps.example.com"));
        route.hints.insert("domain_shared".to_string(), json!(true));

        assert_eq!(creator.create(&route).await.unwrap().as_deref(), Some("new-r1"));
        let writes = api.writes();
        assert_eq!(writes[0].body.as_ref().unwrap()["domain_guid"], "d9");
        assert_eq!(writes[1].method, WriteMethod::Put);
        assert_eq!(writes[1].path, "/v2/apps/new-a1/routes/new-r1");
    }

    #[tokio::test]
    async fn test_security_group_replaces_existing() {
        let api = MockCcApi::new()
            .with_get_json(
                "/v2/security_groups?q=name:public",
                &listing(json!([{"metadata": {"guid": "sg9", "url": "/v2/security_groups/sg9"}, "entity": {"name": "public"}}])),
            )
            .with_write(WriteMethod::Post, "/v2/security_groups", &created("new-sg1", "name", "public"));
        let mut creator = CcCreator::new(&api);
        let mut group = entity(ResourceKind::SecurityGroup, "public", json!({"name": "public", "rules": []}));
        group.hints.insert("space_guids".to_string(), json!(["new-s1"]));

        creator.create(&group).await.unwrap();

        let writes = api.writes();
        assert_eq!(writes[0].method, WriteMethod::Delete);
        assert_eq!(writes[0].path, "/v2/security_groups/sg9");
        assert_eq!(writes[1].body.as_ref().unwrap()["space_guids"], json!(["new-s1"]));
    }

    #[tokio::test]
    async fn test_feature_flag_checks_returned_name() {
        let api = MockCcApi::new().with_write(
            WriteMethod::Put,
            "/v2/config/feature_flags/diego_docker",
            &json!({"name": "diego_docker", "enabled": true}),
        );
        let mut creator = CcCreator::new(&api);
        let flag = ResolvedEntity {
            old_guid: None,
            ..entity(ResourceKind::FeatureFlag, "diego_docker", json!({"enabled": true}))
        };

        assert_eq!(creator.create(&flag).await.unwrap(), None);
        assert_eq!(api.writes()[0].body, Some(json!({"enabled": true})));
    }
}
