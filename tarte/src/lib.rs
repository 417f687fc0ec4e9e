pub mod archive;
pub use crate::archive::{LoadError, ModelArchive};

pub mod config;
pub use crate::config::{Config, ConfigError, TomlRead};

pub mod dataset;
pub use crate::dataset::{BatchOptions, DataSet};

pub mod encoder;

pub mod io;

pub mod model;
pub use crate::model::{Classifier, ModelPerformance};

mod tagger;
pub use crate::tagger::{concat_code, Accuracy, Formatter, Prediction, Tag, Tagger};

pub mod tensor;
