
use indicatif::{ProgressState, ProgressStyle};

/// Bar layout shared by every long-running loop
const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}); ETA: {eta_precise}; Speed: {per_sec} {msg}";

/// Shared function to pull our progress bar styling; falls back to the indicatif default if the template is rejected
pub fn get_progress_style() -> ProgressStyle {
    let style = match ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Invalid progress template, using default: {e}");
            return ProgressStyle::default_bar();
        }
    };
    style
        .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}%", state.fraction() * 100.0);
        })
        .with_key("per_sec", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.0}/s", state.per_sec());
        })
        .progress_chars("##-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        assert!(ProgressStyle::with_template(PROGRESS_TEMPLATE).is_ok());
        let _style = get_progress_style();
    }
}
