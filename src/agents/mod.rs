pub mod project_scanner;
pub mod pub_execution;
pub mod update_checker;
pub mod update_orchestrator;
pub mod version_control;

pub use project_scanner::ProjectScannerAgent;
pub use pub_execution::{PubExecutionAgent, PubTool};
pub use update_checker::UpdateCheckerAgent;
pub use update_orchestrator::{ResolverInvoker, UpdateOrchestrator, UpdateResult};
pub use version_control::VersionControlAgent;
