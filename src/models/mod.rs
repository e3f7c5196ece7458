pub mod electrode;
