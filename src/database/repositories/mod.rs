/// Repository traits and their diesel implementations
///
/// Services depend on the traits so the store can be swapped in tests.

pub mod prediction_repository;

pub use prediction_repository::{PredictionRepository, PredictionRepositoryImpl};
