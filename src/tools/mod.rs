pub mod archive;
pub mod exporter;
pub mod gpg;
pub mod remote_task;
pub mod text;
