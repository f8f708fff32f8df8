use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::{UpdateRoleRequest, UserRole, UserRoleList},
    entity::{
        user_permissions::{ActiveModel as PermActive, Column as PermCol, Entity as UserPermissions},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{
        AdminModule, AuthUser, ROLE_ADMIN, ROLE_CUSTOMER, ROLE_STAFF, ROLES, ensure_module,
    },
    response::{ApiResponse, Meta},
    routes::params::{SearchQuery, like_pattern},
    services::contains_ci,
    state::AppState,
};

/// Dashboard users with their module grants. Without `q` only admins and
/// staff are listed; with `q` any user can be found and promoted.
pub async fn list_roles(
    state: &AppState,
    user: &AuthUser,
    query: SearchQuery,
) -> AppResult<ApiResponse<UserRoleList>> {
    ensure_module(state, user, AdminModule::Roles).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let condition = match like_pattern(query.q.as_deref()) {
        Some(pattern) => Condition::any()
            .add(contains_ci((Users, UserCol::Name), &pattern))
            .add(contains_ci((Users, UserCol::Email), &pattern)),
        None => Condition::all().add(UserCol::Role.is_in([ROLE_ADMIN, ROLE_STAFF])),
    };

    let finder = Users::find().filter(condition).order_by_asc(UserCol::Name);
    let total = finder.clone().count(&state.orm).await? as i64;
    let users = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let mut grants: HashMap<Uuid, Vec<String>> = HashMap::new();
    if !ids.is_empty() {
        for perm in UserPermissions::find()
            .filter(PermCol::UserId.is_in(ids))
            .order_by_asc(PermCol::ModuleName)
            .all(&state.orm)
            .await?
        {
            grants.entry(perm.user_id).or_default().push(perm.module_name);
        }
    }

    let items = users
        .into_iter()
        .map(|u| UserRole {
            permissions: grants.remove(&u.id).unwrap_or_default(),
            user: u.into(),
        })
        .collect();

    Ok(ApiResponse::success(
        "Roles",
        UserRoleList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Sets a user's role and replaces their module grants.
pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<UserRole>> {
    ensure_module(state, user, AdminModule::Roles).await?;

    let role = payload.role.trim().to_lowercase();
    if !ROLES.contains(&role.as_str()) {
        return Err(AppError::BadRequest(format!("Unknown role '{role}'")));
    }
    if id == user.user_id && role != user.role {
        return Err(AppError::BadRequest("You cannot change your own role".into()));
    }
    let modules = parse_modules(&payload.permissions)?;
    if role == ROLE_CUSTOMER && !modules.is_empty() {
        return Err(AppError::BadRequest(
            "Customers cannot hold dashboard permissions".into(),
        ));
    }
    if role == ROLE_ADMIN && user.role != ROLE_ADMIN {
        return Err(AppError::Forbidden);
    }

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let txn = state.orm.begin().await?;
    let mut active: UserActive = existing.into();
    active.role = Set(role.clone());
    let updated = active.update(&txn).await?;
    replace_permissions(&txn, id, &modules).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "role_update",
        "users",
        serde_json::json!({ "user_id": id, "role": role, "permissions": modules }),
    )
    .await;

    Ok(ApiResponse::success(
        "Role updated",
        UserRole {
            user: updated.into(),
            permissions: modules.into_iter().collect(),
        },
        Some(Meta::empty()),
    ))
}

async fn replace_permissions<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    modules: &BTreeSet<String>,
) -> AppResult<()> {
    UserPermissions::delete_many()
        .filter(PermCol::UserId.eq(user_id))
        .exec(db)
        .await?;
    for module in modules {
        PermActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            module_name: Set(module.clone()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Validated, de-duplicated module names in a stable order.
fn parse_modules(raw: &[String]) -> AppResult<BTreeSet<String>> {
    raw.iter()
        .map(|name| {
            name.trim()
                .to_lowercase()
                .parse::<AdminModule>()
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_modules;

    #[test]
    fn modules_are_validated_and_deduplicated() {
        let parsed = parse_modules(&["Orders".into(), "orders".into(), "coupons".into()]).unwrap();
        assert_eq!(parsed.into_iter().collect::<Vec<_>>(), vec!["coupons", "orders"]);
        assert!(parse_modules(&["kitchen".into()]).is_err());
    }
}
