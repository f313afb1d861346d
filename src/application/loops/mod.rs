pub mod channel;
pub mod work_loop;
