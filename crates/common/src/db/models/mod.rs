//! SeaORM entity models
//!
//! Database entities for the OCR task service

mod task;

pub use task::{
    ActiveModel as TaskActiveModel,
    Column as TaskColumn,
    Entity as TaskEntity,
    Model as TaskRow,
};
