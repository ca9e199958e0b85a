use std::path::PathBuf;

use sf_classifier::ClassifierConfig;
use sf_driver::{DriverConfig, MockScenario};

/// Everything the runner needs to drive one attempt, independent of the
/// job/store plumbing.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Parent directory under which per-attempt sandboxes are created.
    pub worker_tmpdir_base: PathBuf,
    /// GitHub PAT inlined into clone/push URLs, if set.
    pub github_pat: Option<String>,
    /// Branch cloned before the attempt branch is cut.
    pub base_branch: String,
    /// Agent binary and its fixed arguments.
    pub agent_command: String,
    pub agent_args: Vec<String>,
    /// When set, drives a scripted [`MockScenario`] instead of spawning
    /// `agent_command`. Used in development and integration tests.
    pub mock_scenario: Option<MockScenario>,
    pub driver: DriverConfig,
    pub classifier: ClassifierConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_tmpdir_base: PathBuf::from("/tmp/sf-attempts"),
            github_pat: None,
            base_branch: "main".to_string(),
            agent_command: "claude".to_string(),
            agent_args: Vec::new(),
            mock_scenario: None,
            driver: DriverConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}
