use rmcp::model::{GetPromptResult, PromptMessage, PromptMessageRole};

pub fn training_review_prompt(bucket: &str, focus: Option<&str>) -> GetPromptResult {
    let focus_line = focus
        .map(|f| format!("\n\nPay particular attention to: {f}."))
        .unwrap_or_default();
    GetPromptResult::new(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Review my strength training log, grouped by {bucket}.\n\nCover:\n1. Overall volume, session count and training days\n2. Consistency: longest and current streak, rest days, favourite weekdays\n3. Progress: new personal records, most improved exercises, plateaus\n4. Intensity: average RPE and how volume splits across rep ranges\n5. Variety: exercises introduced or dropped over time\n6. Three concrete suggestions for the next block\n\nStart with get_overview, then call get_consistency, get_progress and get_variety with bucket=\"{bucket}\". Use get_personal_records for current bests (recent_days narrows them to the latest block) and get_intensity for RPE and rep ranges. If get_diagnostics reports skipped rows, mention how many and why.{focus_line}"
            ),
        )])
    .with_description(format!("Training review grouped by {bucket}"))
}

pub fn balance_check_prompt(bucket: &str) -> GetPromptResult {
    GetPromptResult::new(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Check whether my training is balanced across muscle groups.\n\nInclude:\n1. Volume share per muscle group and movement category\n2. Push/pull and upper/lower ratios (say so explicitly when a ratio is undefined)\n3. How the distribution shifts per {bucket}\n4. The recommendations returned, ordered by severity\n5. Specific exercises that would fix the largest gap\n\nUse get_balance with bucket=\"{bucket}\" for the numbers and classify_exercise to check how unfamiliar exercises are counted. Exercises listed as mapping misses in get_diagnostics are counted as \"other\"."
            ),
        )])
    .with_description("Muscle-group balance check".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(result: &GetPromptResult) -> String {
        serde_json::to_string(&result.messages).unwrap()
    }

    #[test]
    fn training_review_mentions_bucket_and_focus() {
        let p = training_review_prompt("month", Some("bench press"));
        let body = text(&p);
        assert!(body.contains("grouped by month"));
        assert!(body.contains("bench press"));
        assert!(body.contains("get_intensity"));
        assert_eq!(p.messages.len(), 1);
    }

    #[test]
    fn balance_check_points_at_balance_tool() {
        let body = text(&balance_check_prompt("week"));
        assert!(body.contains("get_balance"));
        assert!(body.contains("undefined"));
    }
}
