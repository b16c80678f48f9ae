use std::path::PathBuf;
use std::process::Command;

/// Environment variables the binary reads; cleared so the host cannot leak in
pub const SOOS_ENV_VARS: [&str; 7] = [
    "SOOS_API_BASE_URI",
    "SOOS_ROOT_CODE_PATH",
    "SOOS_PROJECT_NAME",
    "SOOS_CLIENT_ID",
    "SOOS_API_KEY",
    "SOOS_LOG_LEVEL",
    "SOOS_LOG_JSON",
];

#[allow(dead_code)]
pub fn get_soos_ci_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.join(format!("soos-ci{}", std::env::consts::EXE_SUFFIX))
}

/// A command for the binary with a clean SOOS environment
#[allow(dead_code)]
pub fn soos_ci_command() -> Command {
    let mut command = Command::new(get_soos_ci_binary());
    for var in SOOS_ENV_VARS {
        command.env_remove(var);
    }
    command.env_remove("RUST_LOG");
    command
}
