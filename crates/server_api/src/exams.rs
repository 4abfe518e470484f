use shared::{
    domain::{ExamId, SemesterId, UserId},
    protocol::CreateExamRequest,
};

use crate::{
    found_or_missing, guarded, present, response::found, settle_insert, ApiContext, Handled, EXAM,
    SEMESTER,
};

pub async fn get_all_exams(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get all exams", async {
        let exams = ctx.storage.find_all_exams().await?;
        found(EXAM.collection, &exams)
    })
    .await
}

pub async fn get_exam_by_id(ctx: &ApiContext, actor: Option<UserId>, exam_id: ExamId) -> Handled {
    guarded(ctx, actor, "Get exam by id", async {
        let exam = ctx.storage.find_exam_by_id(exam_id).await?;
        found_or_missing(ctx, actor, &EXAM, exam)
    })
    .await
}

pub async fn get_exams_by_semester(
    ctx: &ApiContext,
    actor: Option<UserId>,
    semester_id: SemesterId,
) -> Handled {
    guarded(ctx, actor, "Get exams for semester", async {
        if ctx.storage.find_semester_by_id(semester_id).await?.is_none() {
            return Ok(ctx.not_found(actor, &SEMESTER));
        }
        let exams = ctx.storage.find_exams_by_semester(semester_id).await?;
        found(EXAM.collection, &exams)
    })
    .await
}

pub async fn create_new_exam(
    ctx: &ApiContext,
    actor: Option<UserId>,
    req: CreateExamRequest,
) -> Handled {
    guarded(ctx, actor, "Create exam", async move {
        let semester_id = req.semester_id.filter(|id| id.0 != 0);
        let (Some(title), Some(semester_id)) = (present(req.title), semester_id) else {
            return Ok(ctx.missing_field(actor, &EXAM));
        };
        if req.duration_minutes.is_some_and(|minutes| minutes <= 0) {
            return Ok(ctx.bad_request(actor, &EXAM));
        }

        if let Some(existing) = ctx.storage.find_exam_by_data(&title, semester_id).await? {
            return ctx.conflict(actor, &EXAM, &existing);
        }

        let outcome = ctx
            .storage
            .create_exam(&title, semester_id, req.duration_minutes)
            .await?;
        settle_insert(
            ctx,
            actor,
            &EXAM,
            outcome,
            ctx.storage.find_exam_by_data(&title, semester_id),
        )
        .await
    })
    .await
}
