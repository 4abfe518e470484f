use shared::{
    domain::{BugReportId, UserId},
    protocol::CreateBugReportRequest,
};
use storage::InsertOutcome;

use crate::{
    found_or_missing, guarded, present, response::found, ApiContext, Handled, BUG_REPORT,
};

pub async fn get_all_bug_reports(ctx: &ApiContext, actor: Option<UserId>) -> Handled {
    guarded(ctx, actor, "Get all bug reports", async {
        let reports = ctx.storage.find_all_bug_reports().await?;
        found(BUG_REPORT.collection, &reports)
    })
    .await
}

pub async fn get_bug_report_by_id(
    ctx: &ApiContext,
    actor: Option<UserId>,
    report_id: BugReportId,
) -> Handled {
    guarded(ctx, actor, "Get bug report by id", async {
        let report = ctx.storage.find_bug_report_by_id(report_id).await?;
        found_or_missing(ctx, actor, &BUG_REPORT, report)
    })
    .await
}

/// Reports are never deduplicated. Without an explicit `userId` the reporter
/// is the request actor, provided that user exists.
pub async fn create_new_bug_report(
    ctx: &ApiContext,
    actor: Option<UserId>,
    req: CreateBugReportRequest,
) -> Handled {
    guarded(ctx, actor, "Create bug report", async move {
        let (Some(title), Some(description)) = (present(req.title), present(req.description))
        else {
            return Ok(ctx.missing_field(actor, &BUG_REPORT));
        };
        let reporter = match (req.user_id, actor) {
            (Some(user_id), _) => Some(user_id),
            (None, Some(actor_id)) => ctx
                .storage
                .find_user_by_id(actor_id)
                .await?
                .map(|user| user.id),
            (None, None) => None,
        };

        match ctx
            .storage
            .create_bug_report(reporter, &title, &description)
            .await?
        {
            InsertOutcome::Created(report) => found(BUG_REPORT.key, &report),
            InsertOutcome::Duplicate | InsertOutcome::Rejected => {
                Ok(ctx.bad_request(actor, &BUG_REPORT))
            }
        }
    })
    .await
}
