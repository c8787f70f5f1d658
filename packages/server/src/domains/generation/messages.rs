//! Chat notification texts (Telegram Markdown).

use chrono::{DateTime, FixedOffset};

use super::actions::{RehydrationReport, SubmissionReport, SweepSummary};
use super::models::{GenerationJob, JobId, ReadinessStats, RecordId};
use crate::common::{escape_markdown, truncate_chars};

pub fn generation_started(job: &GenerationJob) -> String {
    format!(
        "🎬 Started: `{}`\n📄 Prompt: {}\n📋 Record: {}\n⏳ Waiting for webhook callback (3-5 min)",
        job.job_id,
        escape_markdown(&truncate_chars(&job.prompt, 50)),
        job.record_id,
    )
}

pub fn generation_completed(
    job: &GenerationJob,
    asset_url: &str,
    caption: &str,
    schedule_for: DateTime<FixedOffset>,
) -> String {
    format!(
        "✅ *Video Generation Complete!*\n\n🆔 `{}`\n📋 Record: {}\n📎 [Video URL]({})\n\n📝 Caption:\n{}\n\n📅 Scheduled for: {}\n📄 Page: {}",
        job.job_id,
        job.record_id,
        asset_url,
        escape_markdown(caption),
        schedule_for.format("%b %d at %I:%M %p"),
        escape_markdown(job.target_label()),
    )
}

/// The record is already completed; only the follow-up work failed.
pub fn completion_degraded(job: &GenerationJob, asset_url: &str, error: &str) -> String {
    format!(
        "⚠️ *Video saved but notification pipeline failed*\n\n🆔 `{}`\n📋 Record: {}\n📎 URL: `{}`\nError: {}",
        job.job_id,
        job.record_id,
        asset_url.replace('`', "%60"),
        escape_markdown(error),
    )
}

pub fn generation_failed(job: &GenerationJob, error_message: &str, error_code: Option<&str>) -> String {
    let mut text = format!(
        "❌ *Video Generation Failed*\n\n🆔 `{}`\n📋 Record: {}\nError: {}",
        job.job_id,
        job.record_id,
        escape_markdown(error_message),
    );
    if let Some(code) = error_code.filter(|c| !c.is_empty()) {
        text.push_str(&format!("\nCode: {}", escape_markdown(code)));
    }
    text
}

pub fn generation_timed_out(job: &GenerationJob, elapsed_minutes: i64) -> String {
    format!(
        "⏰ *Video Generation Timed Out*\n\n🆔 `{}`\n📋 Record: {}\nStill running after {} minutes, marked as Error.",
        job.job_id, job.record_id, elapsed_minutes,
    )
}

pub fn structural_failure(record_id: RecordId) -> String {
    format!(
        "❌ *Unrecoverable Generation*\n\n📋 Record: {}\nMarked Processing but no generation id was saved before the restart. Marked as Error; set it back to Draft to retry.",
        record_id,
    )
}

pub fn submission_failed(record_id: RecordId, job_id: Option<&JobId>, error: &str) -> String {
    let mut text = format!("❌ Error on record {}: {}", record_id, escape_markdown(error));
    if let Some(job_id) = job_id {
        text.push_str(&format!("\n🆔 `{}`", job_id));
    }
    text
}

pub fn submission_plan(count: usize) -> String {
    format!(
        "📋 Found {} record(s) to process\n🚀 Starting video generation...",
        count
    )
}

pub fn submission_finished(report: &SubmissionReport) -> String {
    format!(
        "📦 Submitted {} of {} record(s), {} failed",
        report.submitted.len(),
        report.stats.ready,
        report.failed,
    )
}

pub fn no_ready_records(stats: &ReadinessStats) -> String {
    let mut parts = vec!["📊 *No records ready for generation*\n".to_string()];

    if stats.total == 0 {
        parts.push("❌ No records found in table".to_string());
        return parts.join("\n");
    }

    parts.push(format!("📋 Total records: {}\n", stats.total));
    parts.push("*Reasons for exclusion:*".to_string());

    let reasons = [
        (stats.not_ready, "☐ Ready To Generate unchecked"),
        (stats.not_draft, "⏸️ Status not 'Draft'"),
        (stats.no_prompt, "📝 Missing Prompt"),
        (stats.no_target, "🎯 Missing Target Page"),
    ];
    for (count, label) in reasons {
        if count > 0 {
            parts.push(format!("• {}: {}", label, count));
        }
    }

    parts.push("\n💡 *To generate:*".to_string());
    parts.push("✓ Check 'Ready To Generate'".to_string());
    parts.push("✓ Set Status to 'Draft'".to_string());
    parts.push("✓ Fill in Prompt".to_string());
    parts.push("✓ Select Target Page".to_string());

    parts.join("\n")
}

pub fn rehydration_finished(report: &RehydrationReport) -> String {
    format!(
        "🔄 Restarted: recovered {} in-flight generation(s), {} unrecoverable",
        report.recovered, report.structural_failures,
    )
}

pub fn sweep_summary(summary: &SweepSummary) -> String {
    let mut text = format!(
        "🧹 *Sweep summary*\n\nExamined: {}\n✅ Completed: {}\n❌ Failed: {}\n⏰ Timed out: {}\n⏳ Still running: {}",
        summary.examined, summary.completed, summary.failed, summary.timed_out, summary.still_running,
    );
    if summary.errors > 0 {
        text.push_str(&format!("\n⚠️ Retrying next cycle: {}", summary.errors));
    }
    text
}

pub fn pending_jobs(jobs: &[GenerationJob]) -> String {
    if jobs.is_empty() {
        return "📊 *Bot Status*\n\nPending jobs: 0\nBot is running normally ✅".to_string();
    }

    let mut lines = vec![format!("📊 *Pending Jobs:* {}\n", jobs.len())];
    for job in jobs {
        lines.push(format!(
            "• `{}...` - {} (record {})",
            job.job_id.short(),
            job.state,
            job.record_id
        ));
    }
    lines.join("\n")
}
