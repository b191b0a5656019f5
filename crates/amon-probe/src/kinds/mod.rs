pub mod http;
pub mod icmp;
pub mod log_scan;
pub mod machine_up;
pub mod process;
