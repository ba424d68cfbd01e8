pub mod ray;
pub mod vector;
