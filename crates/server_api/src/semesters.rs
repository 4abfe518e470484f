use shared::{
    domain::{CourseId, SemesterId, UserId},
    protocol::CreateSemesterRequest,
};

use crate::{
    found_or_missing, guarded, present, response::found, settle_insert, ApiContext, Handled,
    COURSE, SEMESTER,
};

pub async fn get_all_semesters(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get all semesters", async {
        let semesters = ctx.storage.find_all_semesters().await?;
        found(SEMESTER.collection, &semesters)
    })
    .await
}

pub async fn get_current_semester(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get current semester", async {
        let semester = ctx.storage.find_current_semester().await?;
        found_or_missing(ctx, actor, &SEMESTER, semester)
    })
    .await
}

pub async fn get_semester_by_id(
    ctx: &ApiContext,
    actor: Option<UserId>,
    semester_id: SemesterId,
) -> Handled {
    guarded(ctx, actor, "Get semester by id", async {
        let semester = ctx.storage.find_semester_by_id(semester_id).await?;
        found_or_missing(ctx, actor, &SEMESTER, semester)
    })
    .await
}

/// All semesters of one course; 404 names the course when it does not exist.
pub async fn get_yearly_semesters(
    ctx: &ApiContext,
    actor: Option<UserId>,
    course_id: CourseId,
) -> Handled {
    guarded(ctx, actor, "Get semesters for course", async {
        if ctx.storage.find_course_by_id(course_id).await?.is_none() {
            return Ok(ctx.not_found(actor, &COURSE));
        }
        let semesters = ctx.storage.find_semesters_by_course(course_id).await?;
        found(SEMESTER.collection, &semesters)
    })
    .await
}

pub async fn create_new_semester(
    ctx: &ApiContext,
    actor: Option<UserId>,
    req: CreateSemesterRequest,
) -> Handled {
    guarded(ctx, actor, "Create semester", async move {
        let course_id = req.course_id.filter(|id| id.0 != 0);
        let (Some(title), Some(course_id)) = (present(req.title), course_id) else {
            return Ok(ctx.missing_field(actor, &SEMESTER));
        };

        if let Some(existing) = ctx.storage.find_semester_by_data(&title, course_id).await? {
            return ctx.conflict(actor, &SEMESTER, &existing);
        }

        let outcome = ctx.storage.create_semester(&title, course_id).await?;
        settle_insert(
            ctx,
            actor,
            &SEMESTER,
            outcome,
            ctx.storage.find_semester_by_data(&title, course_id),
        )
        .await
    })
    .await
}
