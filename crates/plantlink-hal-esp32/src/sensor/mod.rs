pub mod ambient;
