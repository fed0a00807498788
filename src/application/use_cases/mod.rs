pub mod invoice;
pub mod organization;
pub mod plan_catalog;
pub mod subscription;
