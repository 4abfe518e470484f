use shared::{
    domain::{CourseId, UserId},
    protocol::CreateCourseRequest,
};

use crate::{
    found_or_missing, guarded, present, response::found, settle_insert, ApiContext, Handled,
    COURSE,
};

pub async fn get_all_courses(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get all courses", async {
        let courses = ctx.storage.find_all_courses().await?;
        found(COURSE.collection, &courses)
    })
    .await
}

pub async fn get_course_by_id(
    ctx: &ApiContext,
    actor: Option<UserId>,
    course_id: CourseId,
) -> Handled {
    guarded(ctx, actor, "Get course by id", async {
        let course = ctx.storage.find_course_by_id(course_id).await?;
        found_or_missing(ctx, actor, &COURSE, course)
    })
    .await
}

pub async fn create_new_course(
    ctx: &ApiContext,
    actor: Option<UserId>,
    req: CreateCourseRequest,
) -> Handled {
    guarded(ctx, actor, "Create course", async move {
        let Some(title) = present(req.title) else {
            return Ok(ctx.missing_field(actor, &COURSE));
        };
        let description = present(req.description);

        if let Some(existing) = ctx.storage.find_course_by_title(&title).await? {
            return ctx.conflict(actor, &COURSE, &existing);
        }

        let outcome = ctx
            .storage
            .create_course(&title, description.as_deref())
            .await?;
        settle_insert(
            ctx,
            actor,
            &COURSE,
            outcome,
            ctx.storage.find_course_by_title(&title),
        )
        .await
    })
    .await
}
