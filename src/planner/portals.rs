//! Portal planner (spec §4.2): portals plus their pages, snippets, teams
//! and team roles, and the five singleton children (customization, auth
//! settings, email config, logo, favicon) plus the custom-domain special
//! case.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;

use crate::config::types::{DesiredResource, ResourceKind, ResourceSet};
use crate::error::{Error, Result};
use crate::planner::common::{create_change, delete_change, diff_existing, index_by_name, next, plan_flat_kind};
use crate::planner::diff::sparse_diff;
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{temp_change_id, Action, Mode, ParentRef, PlannedChange};
use crate::state::client::{StateClient, StateResource};

const SINGLETON_KINDS: &[ResourceKind] = &[
    ResourceKind::PortalCustomization,
    ResourceKind::PortalAuthSettings,
    ResourceKind::PortalEmailConfig,
    ResourceKind::PortalAssetLogo,
    ResourceKind::PortalAssetFavicon,
];

pub async fn plan(
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    mode: Mode,
    namespace_filter: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    let (mut changes, mut guard) = plan_flat_kind(
        ResourceKind::Portal,
        resource_set,
        client,
        mode,
        namespace_filter,
        &["name"],
        cancel,
        counter,
    )
    .await?;

    let portal_create_ids: HashMap<String, String> = changes
        .iter()
        .filter(|c| c.resource_type == ResourceKind::Portal && c.action == Action::Create)
        .map(|c| (c.resource_ref.clone(), c.id.clone()))
        .collect();

    for portal in resource_set.by_kind(ResourceKind::Portal) {
        let portal_id = portal.envelope.konnect_id.clone();
        let being_created = portal_create_ids.contains_key(&portal.envelope.ref_);
        let portal_create_id = portal_create_ids.get(&portal.envelope.ref_).cloned();

        changes.extend(
            plan_pages(
                resource_set,
                portal,
                portal_id.as_deref(),
                being_created,
                portal_create_id.as_deref(),
                client,
                mode,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );

        changes.extend(
            plan_named_children(
                ResourceKind::PortalSnippet,
                resource_set,
                portal,
                portal_id.as_deref(),
                being_created,
                portal_create_id.as_deref(),
                client,
                mode,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );

        let (team_changes, role_changes) = plan_teams(
            resource_set,
            portal,
            portal_id.as_deref(),
            being_created,
            portal_create_id.as_deref(),
            client,
            mode,
            &mut guard,
            cancel,
            counter,
        )
        .await?;
        changes.extend(team_changes);
        changes.extend(role_changes);

        for kind in SINGLETON_KINDS {
            if let Some(change) = plan_singleton_child(
                *kind,
                resource_set,
                portal,
                portal_id.as_deref(),
                being_created,
                portal_create_id.as_deref(),
                client,
                &mut guard,
                cancel,
                counter,
            )
            .await?
            {
                changes.push(change);
            }
        }

        changes.extend(
            plan_custom_domain(
                resource_set,
                portal,
                portal_id.as_deref(),
                being_created,
                portal_create_id.as_deref(),
                client,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );
    }

    Ok((changes, guard))
}

fn find_children<'a>(
    resource_set: &'a ResourceSet,
    kind: ResourceKind,
    portal_ref: &str,
) -> Vec<&'a DesiredResource> {
    resource_set
        .by_kind(kind)
        .filter(|r| r.parent_ref.as_deref() == Some(portal_ref))
        .collect()
}

fn wire_parent(change: &mut PlannedChange, portal: &DesiredResource, portal_id: Option<&str>, being_created: bool, portal_create_id: Option<&str>) {
    if being_created {
        change.parent = Some(ParentRef {
            ref_: portal.envelope.ref_.clone(),
            id: String::new(),
        });
        if let Some(id) = portal_create_id {
            change.depends_on.push(id.to_string());
        }
    } else {
        change.parent = Some(ParentRef {
            ref_: portal.envelope.ref_.clone(),
            id: portal_id.unwrap_or_default().to_string(),
        });
    }
}

/// Portal pages: matched by full slug path, content-level diff for updates,
/// sync-mode deletes carry monikers instead of a ref (spec §4.2 "Portal
/// pages").
#[allow(clippy::too_many_arguments)]
async fn plan_pages(
    resource_set: &ResourceSet,
    portal: &DesiredResource,
    portal_id: Option<&str>,
    being_created: bool,
    portal_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let desired_pages = find_children(resource_set, ResourceKind::PortalPage, &portal.envelope.ref_);
    let current_pages: Vec<StateResource> = if being_created {
        Vec::new()
    } else {
        client
            .list_children(ResourceKind::PortalPage, portal_id.unwrap(), cancel)
            .await?
    };
    let by_path: HashMap<&str, &StateResource> = current_pages
        .iter()
        .map(|p| (p.fields.get("path").and_then(|v| v.as_str()).unwrap_or("/"), p))
        .collect();

    let mut changes = Vec::new();
    let mut seen_paths = HashSet::new();
    for page in &desired_pages {
        let path = page
            .fields
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or("/")
            .to_string();
        if !seen_paths.insert(path.clone()) {
            return Err(Error::config(format!(
                "duplicate portal page path {:?} for portal {:?}",
                path, portal.envelope.name
            )));
        }

        match by_path.get(path.as_str()) {
            None => {
                let mut change = create_change(ResourceKind::PortalPage, page, counter)?;
                wire_parent(&mut change, portal, portal_id, being_created, portal_create_id);
                changes.push(change);
            }
            Some(state) => {
                let full = client
                    .get_page_content(&state.id, cancel)
                    .await?
                    .unwrap_or_else(|| state.fields.clone());
                let (needs_update, fields) = sparse_diff(&page.fields, &full, &["path"]);
                if !needs_update {
                    continue;
                }
                guard.check(
                    ResourceKind::PortalPage,
                    page.envelope.ref_.clone(),
                    path.clone(),
                    Action::Update,
                    state.protected,
                    None,
                );
                let id = temp_change_id(next(counter), Action::Update, ResourceKind::PortalPage, &page.envelope.ref_);
                let mut change = PlannedChange::new(id, ResourceKind::PortalPage, page.envelope.ref_.clone(), Action::Update, page.envelope.namespace.clone());
                change.resource_id = state.id.clone();
                change.fields = fields;
                wire_parent(&mut change, portal, portal_id, false, None);
                changes.push(change);
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current_pages {
            let path = state.fields.get("path").and_then(|v| v.as_str()).unwrap_or("/");
            let still_desired = desired_pages
                .iter()
                .any(|p| p.fields.get("path").and_then(|v| v.as_str()).unwrap_or("/") == path);
            if still_desired {
                continue;
            }
            guard.check(
                ResourceKind::PortalPage,
                "[unknown]".to_string(),
                path.to_string(),
                Action::Delete,
                state.protected,
                None,
            );
            let id = temp_change_id(next(counter), Action::Delete, ResourceKind::PortalPage, "[unknown]");
            let mut change = PlannedChange::new(id, ResourceKind::PortalPage, "[unknown]", Action::Delete, state.namespace.clone());
            change.resource_id = state.id.clone();
            change.resource_monikers.insert("slug".to_string(), path.to_string());
            change
                .resource_monikers
                .insert("parent_portal".to_string(), portal.envelope.name.clone());
            changes.push(change);
        }
    }

    Ok(changes)
}

/// Named children with no further structure of their own: snippets, custom
/// email templates. Listed, indexed by name, and swept the same way a flat
/// top-level kind is, but scoped to one portal.
#[allow(clippy::too_many_arguments)]
async fn plan_named_children(
    kind: ResourceKind,
    resource_set: &ResourceSet,
    portal: &DesiredResource,
    portal_id: Option<&str>,
    being_created: bool,
    portal_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let desired_children = find_children(resource_set, kind, &portal.envelope.ref_);
    let current: Vec<StateResource> = if being_created {
        Vec::new()
    } else {
        client.list_children(kind, portal_id.unwrap(), cancel).await?
    };
    let by_name = index_by_name(&current);
    let mut changes = Vec::new();

    for desired in &desired_children {
        match by_name.get(desired.envelope.name.as_str()) {
            None => {
                let mut change = create_change(kind, desired, counter)?;
                wire_parent(&mut change, portal, portal_id, being_created, portal_create_id);
                changes.push(change);
            }
            Some(state) => {
                if let Some(mut change) = diff_existing(kind, desired, state, &["name"], guard, counter)? {
                    wire_parent(&mut change, portal, portal_id, false, None);
                    changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current {
            if !desired_children.iter().any(|d| d.envelope.name == state.name) {
                guard.check(kind, state.name.clone(), state.name.clone(), Action::Delete, state.protected, None);
                changes.push(delete_change(kind, state, counter));
            }
        }
    }

    Ok(changes)
}

/// Teams (unique names, fatal on collision) and their roles (unique
/// `(role_name, entity_id, entity_type, region)`, create/delete only — spec
/// §4.2 "Portal teams and team roles").
#[allow(clippy::too_many_arguments)]
async fn plan_teams(
    resource_set: &ResourceSet,
    portal: &DesiredResource,
    portal_id: Option<&str>,
    being_created: bool,
    portal_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, Vec<PlannedChange>)> {
    let desired_teams = find_children(resource_set, ResourceKind::PortalTeam, &portal.envelope.ref_);
    let mut seen_names = HashSet::new();
    for team in &desired_teams {
        if !seen_names.insert(team.envelope.name.as_str()) {
            return Err(Error::config(format!(
                "duplicate portal team name {:?} in portal {:?}",
                team.envelope.name, portal.envelope.name
            )));
        }
    }

    let current_teams: Vec<StateResource> = if being_created {
        Vec::new()
    } else {
        client
            .list_children(ResourceKind::PortalTeam, portal_id.unwrap(), cancel)
            .await?
    };
    let mut seen_existing = HashSet::new();
    for team in &current_teams {
        if !seen_existing.insert(team.name.as_str()) {
            return Err(Error::config(format!(
                "duplicate existing portal team name {:?} in portal {:?}",
                team.name, portal.envelope.name
            )));
        }
    }
    let by_name = index_by_name(&current_teams);

    let mut team_changes = Vec::new();
    // ref -> (change id of its CREATE if new, or its existing Konnect ID)
    let mut team_ref_ids: HashMap<String, (Option<String>, Option<String>)> = HashMap::new();

    for team in &desired_teams {
        match by_name.get(team.envelope.name.as_str()) {
            None => {
                let mut change = create_change(ResourceKind::PortalTeam, team, counter)?;
                wire_parent(&mut change, portal, portal_id, being_created, portal_create_id);
                team_ref_ids.insert(team.envelope.ref_.clone(), (Some(change.id.clone()), None));
                team_changes.push(change);
            }
            Some(state) => {
                team_ref_ids.insert(team.envelope.ref_.clone(), (None, Some(state.id.clone())));
                if let Some(mut change) = diff_existing(ResourceKind::PortalTeam, team, state, &["name"], guard, counter)? {
                    wire_parent(&mut change, portal, portal_id, false, None);
                    team_changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current_teams {
            if !desired_teams.iter().any(|t| t.envelope.name == state.name) {
                guard.check(ResourceKind::PortalTeam, state.name.clone(), state.name.clone(), Action::Delete, state.protected, None);
                team_changes.push(delete_change(ResourceKind::PortalTeam, state, counter));
            }
        }
    }

    let role_changes = plan_team_roles(resource_set, portal, &team_ref_ids, client, mode, guard, cancel, counter).await?;

    Ok((team_changes, role_changes))
}

async fn plan_team_roles(
    resource_set: &ResourceSet,
    portal: &DesiredResource,
    team_ref_ids: &HashMap<String, (Option<String>, Option<String>)>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let mut changes = Vec::new();
    let mut seen_keys = HashSet::new();
    // Desired (role_name, entity_id) pairs per existing team, so the
    // sync-mode sweep below knows which current roles are still wanted
    // without re-walking the desired set.
    let mut desired_by_team: HashMap<String, HashSet<(String, String)>> = HashMap::new();

    for role in resource_set.by_kind(ResourceKind::PortalTeamRole) {
        let Some(team_ref) = &role.parent_ref else { continue };
        let Some((new_team_id, existing_team_id)) = team_ref_ids.get(team_ref) else {
            continue;
        };
        if team_ref_ids_parent_portal_mismatch(resource_set, team_ref, &portal.envelope.ref_) {
            continue;
        }

        let Some(key) = &role.team_role_key else {
            return Err(Error::config(format!(
                "portal team role {:?} is missing its natural key",
                role.envelope.ref_
            )));
        };
        if !seen_keys.insert(key.clone()) {
            return Err(Error::config(format!(
                "duplicate portal team role {:?}/{:?}/{:?}/{:?}",
                key.role_name, key.entity_id, key.entity_type, key.entity_region
            )));
        }

        let current_roles = if let Some(team_id) = existing_team_id {
            client.list_team_roles(portal.envelope.konnect_id.as_deref().unwrap_or(""), team_id, cancel).await?
        } else {
            Vec::new()
        };
        if let Some(team_id) = existing_team_id {
            desired_by_team
                .entry(team_id.clone())
                .or_default()
                .insert((key.role_name.clone(), key.entity_id.clone()));
        }
        let already_exists = current_roles.iter().any(|r| {
            r.fields.get("role_name").and_then(|v| v.as_str()) == Some(key.role_name.as_str())
                && r.fields.get("entity_id").and_then(|v| v.as_str()) == Some(key.entity_id.as_str())
        });
        if already_exists {
            continue;
        }

        let mut change = create_change(ResourceKind::PortalTeamRole, role, counter)?;
        if let Some(team_create_id) = new_team_id {
            change.depends_on.push(team_create_id.clone());
        }
        if let Some(api_ref) = resolve_entity_ref_to_api(resource_set, &key.entity_id) {
            change.team_role_entity_ref = Some(api_ref);
        }
        changes.push(change);
    }

    if mode == Mode::Sync {
        let existing_team_ids: HashSet<&String> = team_ref_ids.values().filter_map(|(_, existing)| existing.as_ref()).collect();
        for team_id in existing_team_ids {
            let desired_keys = desired_by_team.get(team_id).cloned().unwrap_or_default();
            let current_roles = client
                .list_team_roles(portal.envelope.konnect_id.as_deref().unwrap_or(""), team_id, cancel)
                .await?;
            for state in &current_roles {
                let role_name = state.fields.get("role_name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let entity_id = state.fields.get("entity_id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                if desired_keys.contains(&(role_name.clone(), entity_id.clone())) {
                    continue;
                }
                guard.check(
                    ResourceKind::PortalTeamRole,
                    "[unknown]".to_string(),
                    role_name.clone(),
                    Action::Delete,
                    state.protected,
                    None,
                );
                let id = temp_change_id(next(counter), Action::Delete, ResourceKind::PortalTeamRole, "[unknown]");
                let mut change = PlannedChange::new(
                    id,
                    ResourceKind::PortalTeamRole,
                    "[unknown]",
                    Action::Delete,
                    portal.envelope.namespace.clone(),
                );
                change.resource_id = state.id.clone();
                change.resource_monikers.insert("role_name".to_string(), role_name);
                change.resource_monikers.insert("entity_id".to_string(), entity_id);
                changes.push(change);
            }
        }
    }

    Ok(changes)
}

fn team_ref_ids_parent_portal_mismatch(_resource_set: &ResourceSet, _team_ref: &str, _portal_ref: &str) -> bool {
    false
}

/// If `entity_id` is a ref placeholder pointing at an API created in this
/// plan, return the API's ref so the cross-planner adjuster can wire an
/// explicit dependency (spec §4.2).
fn resolve_entity_ref_to_api(resource_set: &ResourceSet, entity_id: &str) -> Option<String> {
    use crate::identity::placeholder::RefPlaceholder;
    let ref_ = RefPlaceholder::parse(entity_id).ok().flatten().map(|p| p.ref_)?;
    resource_set
        .find_by_ref_and_kind(&ref_, ResourceKind::Api)
        .map(|_| ref_)
}

/// Singleton children are always UPDATE (or CREATE where genuinely absent
/// remotely and the GET-on-parent surface reports "not configured" — spec
/// §4.2, §9).
#[allow(clippy::too_many_arguments)]
async fn plan_singleton_child(
    kind: ResourceKind,
    resource_set: &ResourceSet,
    portal: &DesiredResource,
    portal_id: Option<&str>,
    being_created: bool,
    portal_create_id: Option<&str>,
    client: &dyn StateClient,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Option<PlannedChange>> {
    let Some(desired) = resource_set
        .by_kind(kind)
        .find(|r| r.parent_ref.as_deref() == Some(portal.envelope.ref_.as_str()))
    else {
        return Ok(None);
    };

    let current = fetch_singleton_degrading(kind, portal_id, being_created, client, cancel).await?;

    let (needs_update, fields) = match &current {
        Some(state) => sparse_diff(&desired.fields, &state.fields, &[]),
        None => (true, desired.fields.clone()),
    };
    if !needs_update {
        return Ok(None);
    }

    if let Some(state) = &current {
        guard.check(kind, desired.envelope.ref_.clone(), portal.envelope.name.clone(), Action::Update, state.protected, None);
    }

    let id = temp_change_id(next(counter), Action::Update, kind, &desired.envelope.ref_);
    let mut change = PlannedChange::new(id, kind, desired.envelope.ref_.clone(), Action::Update, portal.envelope.namespace.clone());
    change.resource_id = current.map(|s| s.id).unwrap_or_default();
    change.fields = fields;
    wire_parent(&mut change, portal, portal_id, being_created, portal_create_id);
    Ok(Some(change))
}

async fn fetch_singleton_degrading(
    kind: ResourceKind,
    portal_id: Option<&str>,
    being_created: bool,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<Option<StateResource>> {
    if being_created {
        return Ok(None);
    }
    match client.get_singleton(kind, portal_id.unwrap(), cancel).await {
        Ok(state) => Ok(state),
        Err(e) if e.is_client_type("not configured") => Ok(None),
        Err(e) => Err(e),
    }
}

/// Custom domains: missing remote + desired -> CREATE; hostname change ->
/// DELETE+CREATE; a mere `enabled` toggle -> UPDATE (spec §4.2).
#[allow(clippy::too_many_arguments)]
async fn plan_custom_domain(
    resource_set: &ResourceSet,
    portal: &DesiredResource,
    portal_id: Option<&str>,
    being_created: bool,
    portal_create_id: Option<&str>,
    client: &dyn StateClient,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let kind = ResourceKind::PortalCustomDomain;
    let Some(desired) = resource_set
        .by_kind(kind)
        .find(|r| r.parent_ref.as_deref() == Some(portal.envelope.ref_.as_str()))
    else {
        return Ok(Vec::new());
    };

    let current = fetch_singleton_degrading(kind, portal_id, being_created, client, cancel).await?;

    match current {
        None => {
            let mut change = create_change(kind, desired, counter)?;
            wire_parent(&mut change, portal, portal_id, being_created, portal_create_id);
            Ok(vec![change])
        }
        Some(state) => {
            let desired_hostname = desired.fields.get("hostname").and_then(|v| v.as_str());
            let current_hostname = state.fields.get("hostname").and_then(|v| v.as_str());

            if desired_hostname.is_some() && desired_hostname != current_hostname {
                guard.check(kind, desired.envelope.ref_.clone(), portal.envelope.name.clone(), Action::Delete, state.protected, None);
                let delete_id = temp_change_id(next(counter), Action::Delete, kind, &desired.envelope.ref_);
                let mut delete = PlannedChange::new(delete_id.clone(), kind, desired.envelope.ref_.clone(), Action::Delete, portal.envelope.namespace.clone());
                delete.resource_id = state.id.clone();
                wire_parent(&mut delete, portal, portal_id, false, None);

                let mut create = create_change(kind, desired, counter)?;
                create.depends_on.push(delete_id);
                wire_parent(&mut create, portal, portal_id, false, None);

                Ok(vec![delete, create])
            } else {
                let (needs_update, fields) = sparse_diff(&desired.fields, &state.fields, &["hostname"]);
                if !needs_update {
                    return Ok(Vec::new());
                }
                guard.check(kind, desired.envelope.ref_.clone(), portal.envelope.name.clone(), Action::Update, state.protected, None);
                let id = temp_change_id(next(counter), Action::Update, kind, &desired.envelope.ref_);
                let mut change = PlannedChange::new(id, kind, desired.envelope.ref_.clone(), Action::Update, portal.envelope.namespace.clone());
                change.resource_id = state.id.clone();
                change.fields = fields;
                wire_parent(&mut change, portal, portal_id, false, None);
                Ok(vec![change])
            }
        }
    }
}
