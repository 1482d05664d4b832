pub mod timekeeper;
