//! Fitted preprocessing artifacts shared by training and inference

pub mod encoder;
pub mod scaler;

pub use encoder::{CategoricalEncoders, LabelEncoder, UNSEEN_CATEGORY_CODE};
pub use scaler::StandardScaler;
