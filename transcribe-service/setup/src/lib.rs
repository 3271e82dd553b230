mod app;
mod compute;

pub use app::{batch_policy, build_and_run, registry_config, Application};
pub use compute::resolve_compute_profile;
