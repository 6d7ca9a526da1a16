use tracing::warn;

use crate::client::RunAnalysis;

/// Status the server assigns to an approved screenshot
pub const ACCEPTED_STATUS: &str = "accepted";

/// Returns true only if exactly one diff carries `screenshot_name` and it is accepted
///
/// Zero or several matches (a retried test reusing its name) count as failure.
pub fn extract_result(analysis: &RunAnalysis, screenshot_name: &str) -> bool {
    let matches: Vec<_> = analysis
        .diffs
        .iter()
        .filter(|diff| {
            diff.after
                .as_ref()
                .is_some_and(|after| after.screenshot_name == screenshot_name)
        })
        .collect();

    match matches.as_slice() {
        [diff] => diff.status == ACCEPTED_STATUS,
        _ => {
            warn!(
                "There are {} screenshots named {} in the run analysis, expected exactly 1",
                matches.len(),
                screenshot_name
            );
            false
        }
    }
}
