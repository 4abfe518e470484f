use shared::{domain::UserId, protocol::CreateUserRequest};

use crate::{
    found_or_missing, guarded, normalize_email, present, response::found, settle_insert,
    ApiContext, Handled, USER,
};

pub async fn get_all_users(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get all users", async {
        let users = ctx.storage.find_all_users().await?;
        found(USER.collection, &users)
    })
    .await
}

pub async fn get_user_by_id(ctx: &ApiContext, actor: Option<UserId>, user_id: UserId) -> Handled {
    guarded(ctx, actor, "Get user by id", async {
        let user = ctx.storage.find_user_by_id(user_id).await?;
        found_or_missing(ctx, actor, &USER, user)
    })
    .await
}

pub async fn create_new_user(
    ctx: &ApiContext,
    actor: Option<UserId>,
    req: CreateUserRequest,
) -> Handled {
    guarded(ctx, actor, "Create user", async move {
        let (Some(email), Some(username)) = (present(req.email), present(req.username)) else {
            return Ok(ctx.missing_field(actor, &USER));
        };
        let email = normalize_email(&email);
        let role = req.role.unwrap_or_default();

        if let Some(existing) = ctx.storage.find_user_by_email(&email).await? {
            return ctx.conflict(actor, &USER, &existing);
        }

        let outcome = ctx.storage.create_user(&email, &username, role).await?;
        settle_insert(
            ctx,
            actor,
            &USER,
            outcome,
            ctx.storage.find_user_by_email(&email),
        )
        .await
    })
    .await
}
