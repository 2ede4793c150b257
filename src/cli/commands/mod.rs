mod create_admin;
mod init;
mod sweep_inactive;

pub use create_admin::cmd_create_admin;
pub use init::cmd_init;
pub use sweep_inactive::cmd_sweep_inactive;
