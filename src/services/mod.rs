pub mod listen_time;
