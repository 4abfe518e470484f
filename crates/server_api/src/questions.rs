use shared::{
    domain::{ExamId, QuestionId, UserId},
    protocol::CreateQuestionRequest,
};
use storage::NewQuestion;

use crate::{
    found_or_missing, guarded, present, response::found, settle_insert, ApiContext, Handled, EXAM,
    QUESTION,
};

pub async fn get_all_questions(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get all questions", async {
        let questions = ctx.storage.find_all_questions().await?;
        found(QUESTION.collection, &questions)
    })
    .await
}

pub async fn get_question_by_id(
    ctx: &ApiContext,
    actor: Option<UserId>,
    question_id: QuestionId,
) -> Handled {
    guarded(ctx, actor, "Get question by id", async {
        let question = ctx.storage.find_question_by_id(question_id).await?;
        found_or_missing(ctx, actor, &QUESTION, question)
    })
    .await
}

pub async fn get_questions_by_exam(
    ctx: &ApiContext,
    actor: Option<UserId>,
    exam_id: ExamId,
) -> Handled {
    guarded(ctx, actor, "Get questions for exam", async {
        if ctx.storage.find_exam_by_id(exam_id).await?.is_none() {
            return Ok(ctx.not_found(actor, &EXAM));
        }
        let questions = ctx.storage.find_questions_by_exam(exam_id).await?;
        found(QUESTION.collection, &questions)
    })
    .await
}

/// `correctAnswer` defaults to the first answer and must index into `answers`.
pub async fn create_new_question(
    ctx: &ApiContext,
    actor: Option<UserId>,
    req: CreateQuestionRequest,
) -> Handled {
    guarded(ctx, actor, "Create question", async move {
        let exam_id = req.exam_id.filter(|id| id.0 != 0);
        let answers = req.answers.filter(|answers| !answers.is_empty());
        let (Some(exam_id), Some(content), Some(answers)) =
            (exam_id, present(req.content), answers)
        else {
            return Ok(ctx.missing_field(actor, &QUESTION));
        };

        let correct_answer = req.correct_answer.unwrap_or(0);
        if correct_answer as usize >= answers.len() {
            return Ok(ctx.bad_request(actor, &QUESTION));
        }

        if let Some(existing) = ctx.storage.find_question_by_data(exam_id, &content).await? {
            return ctx.conflict(actor, &QUESTION, &existing);
        }

        let outcome = ctx
            .storage
            .create_question(NewQuestion {
                exam_id,
                content: &content,
                answers: &answers,
                correct_answer,
            })
            .await?;
        settle_insert(
            ctx,
            actor,
            &QUESTION,
            outcome,
            ctx.storage.find_question_by_data(exam_id, &content),
        )
        .await
    })
    .await
}
