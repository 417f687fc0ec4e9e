mod dataset;
pub use dataset::DatasetApp;

mod tag;
pub use tag::TagApp;

mod train;
pub use train::TrainApp;
