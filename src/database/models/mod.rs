pub mod prediction;

pub use prediction::{NewPrediction, Prediction};
