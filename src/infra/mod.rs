pub mod sweeper;

pub use sweeper::SessionSweeper;
