mod data_set;

pub use data_set::{DataSet, DataSetKind, Statement};
