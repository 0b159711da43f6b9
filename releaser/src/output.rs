//! Output formatting for the release CLI.
//!
//! Progress lines go to stderr so stdout stays reserved for machine-readable
//! output (check reports, changelog notes). Formatting helpers live here so
//! the pipeline modules and the binary share one voice.

use std::fmt;
use std::io::Write;

use camino::Utf8Path;
use slipway_common::tag::ReleaseChannel;

/// Write one line to the given sink, ignoring write failures.
///
/// Progress output is best-effort: a closed stderr must not abort a release.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    let _ = writeln!(stderr, "{message}");
}

/// Format a success message after a completed release.
///
/// `published` is `None` when the publish step was skipped.
#[must_use]
pub fn success_message(
    package: &str,
    version: &str,
    channel: ReleaseChannel,
    bundled: usize,
    published: Option<usize>,
) -> String {
    let artifacts = count_noun(bundled, "artifact");
    let publish = match published {
        Some(count) => format!("{count} published"),
        None => "publish skipped".to_owned(),
    };
    format!("Released {package} {version} ({channel}): {artifacts} bundled, {publish}")
}

/// Format a count with a pluralised noun, e.g. `1 artifact` / `3 artifacts`.
#[must_use]
pub fn count_noun(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Return the last `max_lines` lines of `text`, or `None` when it is blank.
#[must_use]
pub fn tail(text: &str, max_lines: usize) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    Some(lines[start..].join("\n"))
}

/// Release information shown for dry-run output.
#[derive(Debug)]
pub struct ReleasePlan<'a> {
    /// Package being released.
    pub package: &'a str,
    /// Version currently recorded in the manifest.
    pub current_version: &'a str,
    /// Version the release would write.
    pub release_version: &'a str,
    /// Channel the release targets.
    pub channel: ReleaseChannel,
    /// Whether the changelog has an entry for the release version.
    pub has_changelog_entry: bool,
    /// Commit the release would be cut from, when known.
    pub git_sha: Option<&'a str>,
    /// Rendered build command line, when configured.
    pub build_command: Option<String>,
    /// Directory the build writes artifacts into.
    pub dist_dir: &'a Utf8Path,
    /// Root of the archive store.
    pub store_root: &'a Utf8Path,
    /// Index URL uploads would go to, or `None` when publishing is skipped.
    pub publish_target: Option<&'a str>,
}

impl ReleasePlan<'_> {
    /// Format the plan for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Package: {}", self.package),
            format!("Current version: {}", self.current_version),
            format!("Release version: {}", self.release_version),
            format!("Channel: {}", self.channel),
            format!(
                "Changelog entry: {}",
                if self.has_changelog_entry { "present" } else { "none" }
            ),
        ];

        if let Some(sha) = self.git_sha {
            lines.push(format!("Commit: {sha}"));
        }

        match &self.build_command {
            Some(command) => lines.push(format!("Build command: {command}")),
            None => lines.push("Build command: (not configured)".to_owned()),
        }
        lines.push(format!("Dist directory: {}", self.dist_dir));
        lines.push(format!("Store root: {}", self.store_root));
        match self.publish_target {
            Some(url) => lines.push(format!("Publish to: {url}")),
            None => lines.push("Publish: skipped".to_owned()),
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    #[rstest]
    #[case::one(1, "1 artifact")]
    #[case::many(3, "3 artifacts")]
    #[case::zero(0, "0 artifacts")]
    fn count_noun_pluralises(#[case] count: usize, #[case] expected: &str) {
        assert_eq!(count_noun(count, "artifact"), expected);
    }

    #[rstest]
    #[case::published(Some(2), "2 published")]
    #[case::skipped(None, "publish skipped")]
    fn success_message_reports_publish_state(
        #[case] published: Option<usize>,
        #[case] fragment: &str,
    ) {
        let message = success_message("acme", "1.4.2", ReleaseChannel::Stable, 2, published);
        assert!(message.contains("acme 1.4.2 (stable)"));
        assert!(message.contains(fragment));
    }

    #[rstest]
    #[case::blank("", None)]
    #[case::whitespace("  \n \n", None)]
    #[case::short("one\ntwo", Some("one\ntwo"))]
    #[case::truncated("a\nb\nc\nd", Some("c\nd"))]
    fn tail_keeps_the_last_lines(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(tail(text, 2).as_deref(), expected);
    }

    #[test]
    fn write_stderr_line_appends_a_newline() {
        let mut sink = Vec::new();
        write_stderr_line(&mut sink, "building");
        assert_eq!(String::from_utf8(sink).expect("utf8"), "building\n");
    }

    fn sample_plan<'a>(dist: &'a Utf8PathBuf, store: &'a Utf8PathBuf) -> ReleasePlan<'a> {
        ReleasePlan {
            package: "acme-models",
            current_version: "1.4.1",
            release_version: "1.4.2",
            channel: ReleaseChannel::Stable,
            has_changelog_entry: true,
            git_sha: Some("1f0e9a8"),
            build_command: Some("python -m build".to_owned()),
            dist_dir: dist,
            store_root: store,
            publish_target: None,
        }
    }

    #[test]
    fn plan_lists_every_decision() {
        let dist = Utf8PathBuf::from("dist");
        let store = Utf8PathBuf::from("/data/slipway/bundles");
        let text = sample_plan(&dist, &store).display_text();
        assert!(text.starts_with("Dry run"));
        assert!(text.contains("Release version: 1.4.2"));
        assert!(text.contains("Channel: stable"));
        assert!(text.contains("Changelog entry: present"));
        assert!(text.contains("Commit: 1f0e9a8"));
        assert!(text.contains("Build command: python -m build"));
        assert!(text.contains("Publish: skipped"));
    }
}
