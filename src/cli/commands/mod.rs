pub mod add;
pub mod auth;
pub mod change_password;
pub mod check;
pub mod delete;
pub mod get;
pub mod init;
pub mod list;
pub mod status;
pub mod sync;
pub mod watch;
