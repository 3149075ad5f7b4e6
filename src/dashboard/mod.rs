pub mod live_dashboard;

pub use live_dashboard::Dashboard;
