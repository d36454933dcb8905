//! Terminal detection
//!
//! Status lines and progress are drawn on stderr, so stderr is the stream
//! that decides. CI runners sometimes hand out a pseudo-terminal; any of
//! their marker variables forces plain output.

use std::io::IsTerminal;

/// Environment variables set by common CI runners
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// How status output should be rendered
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Inspect stderr and the environment of this process
    pub fn detect() -> Self {
        Self::from_env(std::io::stderr().is_terminal(), |name| {
            std::env::var_os(name).is_some()
        })
    }

    /// Plain tagged lines, no progress bars
    pub fn non_interactive() -> Self {
        Self { fancy: false }
    }

    /// Whether to draw glyphs and progress bars
    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }

    fn from_env(stderr_is_terminal: bool, is_set: impl Fn(&str) -> bool) -> Self {
        let in_ci = CI_MARKERS.iter().any(|name| is_set(name));
        Self {
            fancy: stderr_is_terminal && !in_ci,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_outside_ci_is_fancy() {
        assert!(UiContext::from_env(true, |_| false).use_fancy_output());
    }

    #[test]
    fn ci_marker_forces_plain() {
        let ctx = UiContext::from_env(true, |name| name == "GITHUB_ACTIONS");
        assert!(!ctx.use_fancy_output());
    }

    #[test]
    fn redirected_stderr_is_plain() {
        assert!(!UiContext::from_env(false, |_| false).use_fancy_output());
        assert!(!UiContext::non_interactive().use_fancy_output());
    }
}
